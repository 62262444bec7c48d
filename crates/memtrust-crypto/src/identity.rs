//! Human-readable identity of a certificate.
//!
//! The subject DN text doubles as the override-store alias, so its
//! rendering must stay stable: RFC 4514-style `CN=…, O=…` as produced by
//! `x509-parser`.

use x509_parser::prelude::{FromDer, X509Certificate};

use crate::seal::CryptoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertIdentity {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    /// Unix seconds.
    pub not_after: i64,
}

/// Parse the naming fields out of a DER certificate.
pub fn identify(cert_der: &[u8]) -> Result<CertIdentity, CryptoError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CryptoError::CertificateParse(e.to_string()))?;

    Ok(CertIdentity {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial_as_string(),
        not_after: cert.validity().not_after.timestamp(),
    })
}

/// Subject DN text, or a placeholder for unparseable input.
///
/// Used where a description is wanted but a parse failure must not abort
/// the caller (log lines, prompt text).
pub fn subject_or_placeholder(cert_der: &[u8]) -> String {
    identify(cert_der)
        .map(|id| id.subject)
        .unwrap_or_else(|_| "<unparseable certificate>".to_string())
}
