use serde::{Deserialize, Serialize};

/// Machine-readable error codes for `--json` output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    StoreUnavailable,
    IoError,
    CertificateRejected,
    ConnectFailed,
    Internal,
}

impl ErrorCode {
    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument => 2,
            Self::NotFound => 3,
            Self::StoreUnavailable | Self::IoError => 4,
            Self::CertificateRejected => 5,
            Self::ConnectFailed => 6,
            Self::Internal => 1,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::StoreUnavailable => "store_unavailable",
            Self::IoError => "io_error",
            Self::CertificateRejected => "certificate_rejected",
            Self::ConnectFailed => "connect_failed",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}
