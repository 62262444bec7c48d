//! On-disk keystore format.
//!
//! A JSON envelope `{ "version": 1, "sealed": { … } }` whose sealed
//! payload is the JSON list of [`StoredCertificate`]s. The passphrase is
//! a fixed constant: it keeps casual readers out, nothing more.

use std::path::Path;

use memtrust_common::persist;
use memtrust_crypto::seal::{self, SealedBlob};
use serde::{Deserialize, Serialize};

use crate::entry::StoredCertificate;
use crate::error::StoreError;

/// Fixed keystore passphrase.
pub const KEYSTORE_PASSPHRASE: &str = "MTM";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    sealed: SealedBlob,
}

/// Read and unseal the keystore. `Ok(None)` means the file is absent.
pub(crate) fn read(path: &Path) -> Result<Option<Vec<StoredCertificate>>, StoreError> {
    let Some(envelope) = persist::read_json_if_exists::<Envelope>(path)? else {
        return Ok(None);
    };
    if envelope.version != FORMAT_VERSION {
        return Err(StoreError::Serialization(format!(
            "unsupported keystore version {}",
            envelope.version
        )));
    }

    let plaintext = seal::open(&envelope.sealed, KEYSTORE_PASSPHRASE)?;
    let entries = serde_json::from_slice(&plaintext)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Some(entries))
}

/// Seal and atomically replace the keystore file.
pub(crate) fn write(path: &Path, entries: &[&StoredCertificate]) -> Result<(), StoreError> {
    let plaintext =
        serde_json::to_vec(entries).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let envelope = Envelope {
        version: FORMAT_VERSION,
        sealed: seal::seal(&plaintext, KEYSTORE_PASSPHRASE)?,
    };
    persist::write_json_atomic(path, &envelope)?;
    Ok(())
}
