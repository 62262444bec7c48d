//! Passphrase sealing for data at rest.
//!
//! Argon2id derives an AES-256 key from the passphrase and a random salt;
//! AES-256-GCM encrypts and authenticates the payload. A wrong passphrase
//! and a tampered blob fail the same way.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Salt length for Argon2id key derivation.
const SALT_LEN: usize = 16;

/// Nonce length for AES-256-GCM.
const NONCE_LEN: usize = 12;

/// Sealed payload as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    pub ciphertext: Vec<u8>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Seal `plaintext` under `passphrase`. Salt and nonce are fresh per call.
pub fn seal(plaintext: &[u8], passphrase: &str) -> Result<SealedBlob, CryptoError> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let mut aes_key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&aes_key);
    aes_key.zeroize();
    let cipher = cipher.map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(&Nonce::from(nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(SealedBlob {
        ciphertext,
        salt,
        nonce: nonce_bytes.to_vec(),
    })
}

/// Open a blob produced by [`seal`].
pub fn open(blob: &SealedBlob, passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    let nonce_arr: [u8; NONCE_LEN] = blob
        .nonce
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Decryption("invalid nonce length".into()))?;

    let mut aes_key = derive_key(passphrase, &blob.salt)?;
    let cipher = Aes256Gcm::new_from_slice(&aes_key);
    aes_key.zeroize();
    let cipher = cipher.map_err(|e| CryptoError::Decryption(e.to_string()))?;

    cipher
        .decrypt(&Nonce::from(nonce_arr), blob.ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption("authentication failed (wrong passphrase or tampered data)".into()))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption: {0}")]
    Encryption(String),
    #[error("decryption: {0}")]
    Decryption(String),
    #[error("key derivation: {0}")]
    KeyDerivation(String),
    #[error("certificate parse: {0}")]
    CertificateParse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let blob = seal(b"keystore entries", "MTM").unwrap();
        assert_ne!(blob.ciphertext, b"keystore entries");
        assert_eq!(open(&blob, "MTM").unwrap(), b"keystore entries");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let blob = seal(b"secret", "correct").unwrap();
        assert!(matches!(open(&blob, "wrong"), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut blob = seal(b"secret", "MTM").unwrap();
        blob.ciphertext[0] ^= 0x01;
        assert!(open(&blob, "MTM").is_err());
    }

    #[test]
    fn truncated_nonce_is_rejected() {
        let mut blob = seal(b"secret", "MTM").unwrap();
        blob.nonce.truncate(4);
        let err = open(&blob, "MTM").unwrap_err();
        assert!(err.to_string().contains("nonce"));
    }

    #[test]
    fn salts_differ_between_seals() {
        let a = seal(b"same", "MTM").unwrap();
        let b = seal(b"same", "MTM").unwrap();
        assert_ne!(a.salt, b.salt);
    }

    #[test]
    fn sealed_blob_survives_json() {
        let blob = seal(b"payload", "MTM").unwrap();
        let json = serde_json::to_string(&blob).unwrap();
        let back: SealedBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(open(&back, "MTM").unwrap(), b"payload");
    }
}
