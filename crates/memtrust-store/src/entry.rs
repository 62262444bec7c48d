use chrono::{DateTime, Utc};
use memtrust_crypto::identity::CertIdentity;
use memtrust_crypto::pinning;
use serde::{Deserialize, Serialize};

/// One user-approved certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCertificate {
    /// Subject DN text. Two certificates sharing a subject share a slot.
    pub alias: String,
    pub issuer: String,
    pub fingerprint: String,
    pub added_at: DateTime<Utc>,
    #[serde(with = "der_base64")]
    pub der: Vec<u8>,
}

impl StoredCertificate {
    pub(crate) fn new(der: Vec<u8>, identity: CertIdentity) -> Self {
        Self {
            alias: identity.subject,
            issuer: identity.issuer,
            fingerprint: pinning::fingerprint_sha256(&der),
            added_at: Utc::now(),
            der,
        }
    }
}

mod der_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(der: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(der))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
