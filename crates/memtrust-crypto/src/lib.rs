//! Memtrust Crypto: the cryptographic leaf of the workspace.
//!
//! Passphrase sealing for the override keystore, SHA-256 certificate
//! fingerprints, and the subject/issuer names used as store aliases and
//! in prompt messages.

pub mod identity;
pub mod pinning;
pub mod seal;

pub use seal::CryptoError;
