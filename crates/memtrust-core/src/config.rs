//! Verifier configuration and assembly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use memtrust_common::paths::{self, KeystoreLocation};
use memtrust_store::OverrideStore;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use tokio::sync::mpsc;

use crate::bridge::{
    ChannelBridge, LogNotifier, Notifier, PromptBridge, PromptTicket, UnattendedBridge,
};
use crate::error::TrustError;
use crate::negotiator::TrustNegotiator;
use crate::registry::DecisionRegistry;
use crate::validator::{ChainValidator, OverrideTier, WebPkiTier};
use crate::verifier::MemorizingVerifier;

/// Where the default tier's trust anchors come from.
#[derive(Debug, Clone, Default)]
pub enum DefaultRoots {
    /// The operating system's certificate store.
    #[default]
    Platform,
    /// The Mozilla root set compiled into the binary.
    Bundled,
    /// An explicit set, e.g. a private CA.
    Custom(Vec<CertificateDer<'static>>),
}

impl DefaultRoots {
    pub fn load(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        match self {
            DefaultRoots::Platform => {
                let result = rustls_native_certs::load_native_certs();
                for e in &result.errors {
                    tracing::warn!(error = %e, "Problem loading platform certificates");
                }
                let (added, ignored) = roots.add_parsable_certificates(result.certs);
                tracing::debug!(added, ignored, "Platform trust roots loaded");
            }
            DefaultRoots::Bundled => {
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                tracing::debug!(added = roots.len(), "Bundled trust roots loaded");
            }
            DefaultRoots::Custom(certs) => {
                let (added, ignored) = roots.add_parsable_certificates(certs.iter().cloned());
                tracing::debug!(added, ignored, "Custom trust roots loaded");
            }
        }
        roots
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemtrustConfig {
    /// Base directory for the keystore. Platform data dir when unset.
    pub data_dir: Option<PathBuf>,
    /// Keystore dir/file under `data_dir`. Process-wide location when unset.
    pub keystore: Option<KeystoreLocation>,
    pub default_roots: DefaultRoots,
    /// How long a prompt may stay unanswered. `None` waits forever.
    pub decision_timeout: Option<Duration>,
}

impl MemtrustConfig {
    pub fn keystore_path(&self) -> PathBuf {
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(paths::memtrust_data_dir);
        match &self.keystore {
            Some(location) => location.resolve(&data_dir),
            None => paths::keystore_location().resolve(&data_dir),
        }
    }
}

/// Assembles a [`MemorizingVerifier`].
#[derive(Default)]
pub struct Builder {
    config: MemtrustConfig,
    registry: Option<Arc<DecisionRegistry>>,
    bridge: Option<Arc<dyn PromptBridge>>,
    notifier: Option<Arc<dyn Notifier>>,
    store: Option<Arc<OverrideStore>>,
    provider: Option<Arc<CryptoProvider>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: MemtrustConfig) -> Self {
        self.config = config;
        self
    }

    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    pub fn keystore(mut self, dir: impl Into<String>, file: impl Into<String>) -> Self {
        self.config.keystore = Some(KeystoreLocation::new(dir, file));
        self
    }

    pub fn default_roots(mut self, roots: DefaultRoots) -> Self {
        self.config.default_roots = roots;
        self
    }

    pub fn decision_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.decision_timeout = timeout;
        self
    }

    /// Registry that prompts are tracked in. The process-wide registry
    /// when unset.
    pub fn registry(mut self, registry: Arc<DecisionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn bridge(mut self, bridge: Arc<dyn PromptBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Share an already-loaded store instead of opening one from disk.
    pub fn store(mut self, store: Arc<OverrideStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn provider(mut self, provider: Arc<CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build with the configured bridge. Without one, prompts are logged
    /// through the notifier and rejected.
    pub fn build(self) -> Result<MemorizingVerifier, TrustError> {
        let registry = self.registry.clone().unwrap_or_else(DecisionRegistry::global);
        let bridge: Arc<dyn PromptBridge> = match &self.bridge {
            Some(bridge) => Arc::clone(bridge),
            None => {
                tracing::debug!("No prompt bridge configured; untrusted chains will be rejected");
                Arc::new(UnattendedBridge::new(Arc::clone(&registry), self.resolved_notifier()))
            }
        };
        self.assemble(registry, bridge)
    }

    /// Build with a [`ChannelBridge`], returning the receiver a UI task
    /// answers prompts from. Any configured bridge is replaced.
    ///
    /// Prompts beyond `capacity` still waiting for the UI are passed to
    /// the notifier and rejected immediately.
    pub fn build_with_channel(
        self,
        capacity: usize,
    ) -> Result<(MemorizingVerifier, mpsc::Receiver<PromptTicket>), TrustError> {
        let registry = self.registry.clone().unwrap_or_else(DecisionRegistry::global);
        let (bridge, rx) = ChannelBridge::new(Arc::clone(&registry), capacity);
        let bridge = bridge.with_notifier(self.resolved_notifier());
        let verifier = self.assemble(registry, Arc::new(bridge))?;
        Ok((verifier, rx))
    }

    fn resolved_notifier(&self) -> Arc<dyn Notifier> {
        self.notifier
            .clone()
            .unwrap_or_else(|| Arc::new(LogNotifier))
    }

    fn assemble(
        self,
        registry: Arc<DecisionRegistry>,
        bridge: Arc<dyn PromptBridge>,
    ) -> Result<MemorizingVerifier, TrustError> {
        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()));
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(OverrideStore::load(self.config.keystore_path())),
        };

        let default_tier =
            WebPkiTier::new("default", self.config.default_roots.load(), &provider)?;
        let validator = ChainValidator::new(
            OverrideTier::new(Arc::clone(&store), Arc::clone(&provider)),
            default_tier,
        );
        let negotiator =
            TrustNegotiator::new(registry, bridge, store, self.config.decision_timeout);

        tracing::info!(
            keystore = %validator.store().path().display(),
            overrides = validator.store().len(),
            timeout = ?self.config.decision_timeout,
            "Memorizing verifier ready"
        );
        Ok(MemorizingVerifier::new(validator, negotiator, provider))
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("custom_bridge", &self.bridge.is_some())
            .finish_non_exhaustive()
    }
}
