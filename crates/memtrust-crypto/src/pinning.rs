//! Certificate fingerprints.
//!
//! Stored overrides record the SHA-256 of each certificate's DER so the
//! management UI can show something more precise than the subject name.

use memtrust_common::encoding::{hex_colon, hex_encode};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 fingerprint of a DER certificate, lowercase hex.
pub fn fingerprint_sha256(cert_der: &[u8]) -> String {
    hex_encode(&Sha256::digest(cert_der))
}

/// SHA-256 fingerprint in the colon-separated display form.
pub fn fingerprint_display(cert_der: &[u8]) -> String {
    hex_colon(&Sha256::digest(cert_der))
}

/// Compare two fingerprint strings in constant time.
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_64_hex_chars() {
        let fp = fingerprint_sha256(b"certificate DER");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn display_form_has_32_groups() {
        let fp = fingerprint_display(b"certificate DER");
        assert_eq!(fp.split(':').count(), 32);
    }

    #[test]
    fn matching_and_non_matching() {
        let a = fingerprint_sha256(b"cert A");
        let b = fingerprint_sha256(b"cert B");
        assert!(fingerprints_match(&a, &a));
        assert!(!fingerprints_match(&a, &b));
        assert!(!fingerprints_match("abc", "abcd"));
    }
}
