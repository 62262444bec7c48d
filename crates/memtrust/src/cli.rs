use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use memtrust_common::paths::{DEFAULT_KEYSTORE_DIR, DEFAULT_KEYSTORE_FILE};
use memtrust_core::TrustDecision;

#[derive(Parser, Debug)]
#[command(
    name = "memtrust",
    version,
    about = "Trust-on-first-use TLS: ask once, remember the answer"
)]
pub struct Cli {
    /// Base data directory (default: platform-specific)
    #[arg(long, env = "MEMTRUST_DATA_DIR", value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keystore directory, relative to the data directory
    #[arg(long, env = "MEMTRUST_KEYSTORE_DIR", default_value = DEFAULT_KEYSTORE_DIR, global = true)]
    pub keystore_dir: String,

    /// Keystore file name
    #[arg(long, env = "MEMTRUST_KEYSTORE_FILE", default_value = DEFAULT_KEYSTORE_FILE, global = true)]
    pub keystore_file: String,

    /// Trust roots for chains that were never overridden
    #[arg(long, env = "MEMTRUST_ROOTS", value_enum, default_value = "platform", global = true)]
    pub roots: RootsArg,

    /// Reject a prompt nobody answered after N seconds (0 = wait forever)
    #[arg(long, env = "MEMTRUST_DECISION_TIMEOUT", value_name = "SECONDS", global = true)]
    pub decision_timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "MEMTRUST_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to file (in addition to stderr)
    #[arg(long, env = "MEMTRUST_LOG_FILE", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch an HTTPS URL, asking before trusting an unknown certificate
    Fetch(FetchArgs),
    /// Manage remembered certificates
    Certs(CertsCommand),
    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// URL to fetch (https only)
    pub url: String,

    /// Answer every trust prompt without asking (abort, once, always)
    #[arg(long, value_name = "DECISION")]
    pub answer: Option<TrustDecision>,
}

#[derive(Args, Debug)]
pub struct CertsCommand {
    #[command(subcommand)]
    pub command: CertsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CertsSubcommand {
    /// List remembered certificates
    List,
    /// Forget a remembered certificate
    Delete {
        /// Alias (subject DN, as shown by `certs list`) or SHA-256 fingerprint
        alias: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootsArg {
    /// Operating system certificate store
    Platform,
    /// Mozilla roots compiled into the binary
    Bundled,
}
