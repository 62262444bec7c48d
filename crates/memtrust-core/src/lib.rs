//! Memtrust Core: trust-on-first-use certificate verification.
//!
//! Chains that the default roots reject are shown to the user, who can
//! reject them, accept them once, or accept them permanently. Permanent
//! decisions go to the override store and are honoured silently from
//! then on. [`MemorizingVerifier`] plugs the whole flow into rustls for
//! both client and server handshakes.

pub mod bridge;
pub mod chain;
pub mod config;
pub mod decision;
pub mod error;
pub mod negotiator;
pub mod registry;
pub mod validator;
pub mod verifier;

#[cfg(test)]
mod test_support;

pub use bridge::{
    ChannelBridge, DecisionReply, LogNotifier, Notifier, PromptBridge, PromptRequest,
    PromptTicket, UnattendedBridge,
};
pub use chain::CertificateChain;
pub use config::{Builder, DefaultRoots, MemtrustConfig};
pub use decision::{DecisionId, DecisionMessage, Resolution, TrustDecision};
pub use error::{TrustError, ValidationFailure};
pub use registry::DecisionRegistry;
pub use validator::Role;
pub use verifier::MemorizingVerifier;

pub use memtrust_store::{OverrideStore, StoreError, StoredCertificate};
