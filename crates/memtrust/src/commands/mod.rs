//! CLI command handlers.

pub mod certs;
pub mod fetch;

use std::time::Duration;

use memtrust_common::error::ErrorCode;
use memtrust_core::{DefaultRoots, MemtrustConfig, StoreError, TrustError};

use crate::cli::{Cli, RootsArg};

/// Verifier configuration from global flags.
///
/// The keystore location itself is process-wide and set in `main`.
pub(crate) fn config(cli: &Cli) -> MemtrustConfig {
    MemtrustConfig {
        data_dir: cli.data_dir.clone(),
        keystore: None,
        default_roots: match cli.roots {
            RootsArg::Platform => DefaultRoots::Platform,
            RootsArg::Bundled => DefaultRoots::Bundled,
        },
        decision_timeout: decision_timeout(cli.decision_timeout),
    }
}

/// `Some(0)` and `None` both mean wait forever.
pub(crate) fn decision_timeout(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|&s| s > 0).map(Duration::from_secs)
}

/// Print a serializable value as JSON, handling serialization errors
/// gracefully instead of panicking.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: failed to serialize response: {e}"),
    }
}

pub(crate) fn version(json: bool) {
    if json {
        print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "platform": std::env::consts::OS,
        }));
    } else {
        println!("memtrust {}", env!("CARGO_PKG_VERSION"));
    }
}

/// Classify a command failure for `--json` output and the exit status.
pub(crate) fn error_code(e: &anyhow::Error) -> ErrorCode {
    if let Some(inner) = e.downcast_ref::<StoreError>() {
        return ErrorCode::from(inner);
    }
    if let Some(inner) = e.downcast_ref::<TrustError>() {
        return ErrorCode::from(inner);
    }
    if let Some(inner) = e.downcast_ref::<rustls::Error>() {
        return match inner {
            rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented => {
                ErrorCode::CertificateRejected
            }
            _ => ErrorCode::ConnectFailed,
        };
    }
    if e.downcast_ref::<url::ParseError>().is_some()
        || e.downcast_ref::<UsageError>().is_some()
    {
        return ErrorCode::InvalidArgument;
    }
    if e.downcast_ref::<std::io::Error>().is_some() {
        return ErrorCode::ConnectFailed;
    }
    ErrorCode::Internal
}

/// A command-line argument that parsed but cannot be used.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct UsageError(pub String);
