//! Core error types.

use memtrust_common::error::ErrorCode;
use memtrust_store::StoreError;

/// A chain-validation failure carrying the original rustls cause.
///
/// This is what surfaces to the TLS stack when the user rejects a chain,
/// so callers see the real reason (unknown issuer, expired, …) rather
/// than a generic refusal.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{cause}")]
pub struct ValidationFailure {
    cause: rustls::Error,
}

impl ValidationFailure {
    pub fn new(cause: rustls::Error) -> Self {
        Self { cause }
    }

    pub fn cause(&self) -> &rustls::Error {
        &self.cause
    }

    pub fn into_cause(self) -> rustls::Error {
        self.cause
    }

    /// Text of the innermost error in the cause's source chain.
    pub fn root_cause_text(&self) -> String {
        let mut current: &(dyn std::error::Error + 'static) = &self.cause;
        while let Some(next) = current.source() {
            current = next;
        }
        current.to_string()
    }
}

impl From<rustls::Error> for ValidationFailure {
    fn from(cause: rustls::Error) -> Self {
        Self::new(cause)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("verifier setup failed: {0}")]
    Verifier(String),

    #[error("tls configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<rustls::client::VerifierBuilderError> for TrustError {
    fn from(e: rustls::client::VerifierBuilderError) -> Self {
        Self::Verifier(e.to_string())
    }
}

impl From<&TrustError> for ErrorCode {
    fn from(e: &TrustError) -> Self {
        match e {
            TrustError::Verifier(_) | TrustError::Tls(_) => ErrorCode::Internal,
            TrustError::Store(inner) => ErrorCode::from(inner),
        }
    }
}
