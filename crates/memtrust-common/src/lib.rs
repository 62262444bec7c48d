//! Memtrust Common: shared plumbing for the memtrust crates.
//!
//! Data-directory resolution, the process-wide keystore location,
//! atomic JSON persistence, and the machine-readable error codes used
//! by the CLI.

pub mod encoding;
pub mod error;
pub mod paths;
pub mod persist;
