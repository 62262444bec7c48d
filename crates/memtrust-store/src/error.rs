//! Override store error types.

use memtrust_common::error::ErrorCode;
use memtrust_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no stored certificate with alias {0:?}")]
    AliasNotFound(String),

    #[error("invalid certificate in chain: {0}")]
    InvalidCertificate(String),

    #[error("keystore sealing failed: {0}")]
    Crypto(String),

    #[error("keystore serialization failed: {0}")]
    Serialization(String),

    #[error("keystore io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CryptoError> for StoreError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e.to_string())
    }
}

impl From<&StoreError> for ErrorCode {
    fn from(e: &StoreError) -> Self {
        match e {
            StoreError::AliasNotFound(_) => ErrorCode::NotFound,
            StoreError::InvalidCertificate(_) => ErrorCode::InvalidArgument,
            StoreError::Crypto(_) | StoreError::Serialization(_) => ErrorCode::StoreUnavailable,
            StoreError::Io(_) => ErrorCode::IoError,
        }
    }
}
