//! Two-tier chain validation.
//!
//! The override tier trusts whatever the user approved earlier; the
//! default tier trusts the platform (or configured) roots. Either tier
//! accepting is enough.
//!
//! An end-entity certificate the user approved byte for byte passes the
//! override tier as is: its validity period, names and CA flag are what
//! the user already saw and accepted. Anything else goes through stock
//! webpki path validation, with the approved certificates as anchors.

use std::sync::{Arc, PoisonError, RwLock};

use memtrust_store::OverrideStore;
use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::{CertificateError, DistinguishedName, RootCertStore};

use crate::chain::CertificateChain;
use crate::error::{TrustError, ValidationFailure};

/// Which side of the handshake presented the chain.
#[derive(Debug, Clone, Copy)]
pub enum Role<'a> {
    /// We are the client; the chain belongs to this server.
    Server(&'a ServerName<'a>),
    /// We are the server; the chain belongs to a client.
    Client,
}

impl Role<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Server(_) => "server",
            Role::Client => "client",
        }
    }
}

/// An X.509 path validator.
pub trait PathValidator: Send + Sync {
    fn validate(
        &self,
        chain: &CertificateChain,
        role: &Role<'_>,
        now: UnixTime,
    ) -> Result<(), ValidationFailure>;

    /// Subjects of the trust anchors this validator accepts.
    fn accepted_issuers(&self) -> Vec<DistinguishedName>;
}

/// webpki validation against one fixed root set.
#[derive(Debug)]
pub struct WebPkiTier {
    name: &'static str,
    server: Arc<WebPkiServerVerifier>,
    client: Arc<dyn ClientCertVerifier>,
    issuers: Vec<DistinguishedName>,
}

impl WebPkiTier {
    /// Build a tier from `roots`. `Ok(None)` when `roots` is empty: such a
    /// tier would reject everything, and webpki refuses to build it.
    pub fn new(
        name: &'static str,
        roots: RootCertStore,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Option<Self>, TrustError> {
        if roots.is_empty() {
            tracing::debug!(tier = name, "No trust anchors; tier rejects every chain");
            return Ok(None);
        }

        let issuers = roots.subjects();
        let roots = Arc::new(roots);
        let server =
            WebPkiServerVerifier::builder_with_provider(Arc::clone(&roots), Arc::clone(provider))
                .build()?;
        let client =
            WebPkiClientVerifier::builder_with_provider(roots, Arc::clone(provider)).build()?;

        tracing::debug!(tier = name, anchors = issuers.len(), "Validation tier built");
        Ok(Some(Self {
            name,
            server,
            client,
            issuers,
        }))
    }

    /// Build a tier from DER certificates, skipping any that are not
    /// usable as trust anchors.
    pub fn from_der<I>(
        name: &'static str,
        certs: I,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Option<Self>, TrustError>
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(certs);
        if ignored > 0 {
            tracing::warn!(tier = name, added, ignored, "Some certificates are not usable as trust anchors");
        }
        Self::new(name, roots, provider)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PathValidator for WebPkiTier {
    fn validate(
        &self,
        chain: &CertificateChain,
        role: &Role<'_>,
        now: UnixTime,
    ) -> Result<(), ValidationFailure> {
        let end_entity = chain
            .end_entity()
            .ok_or(rustls::Error::NoCertificatesPresented)?;
        let result = match role {
            Role::Server(name) => self
                .server
                .verify_server_cert(end_entity, chain.intermediates(), name, &[], now)
                .map(|_| ()),
            Role::Client => self
                .client
                .verify_client_cert(end_entity, chain.intermediates(), now)
                .map(|_| ()),
        };
        result.map_err(ValidationFailure::new)
    }

    fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.issuers.clone()
    }
}

/// Override tier backed by the persisted store.
///
/// A chain whose end entity is itself stored is accepted outright.
/// Otherwise the stored certificates serve as webpki trust anchors; that
/// verifier is rebuilt lazily whenever the store's generation moves, so
/// additions and management deletions take effect on the next handshake.
pub struct OverrideTier {
    store: Arc<OverrideStore>,
    provider: Arc<CryptoProvider>,
    cached: RwLock<(u64, Option<Arc<WebPkiTier>>)>,
}

impl OverrideTier {
    pub fn new(store: Arc<OverrideStore>, provider: Arc<CryptoProvider>) -> Self {
        Self {
            store,
            provider,
            cached: RwLock::new((u64::MAX, None)),
        }
    }

    pub fn store(&self) -> &Arc<OverrideStore> {
        &self.store
    }

    fn current(&self) -> Option<Arc<WebPkiTier>> {
        let generation = self.store.generation();
        {
            let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
            if cached.0 == generation {
                return cached.1.clone();
            }
        }

        let certs = self.store.certificates().into_iter().map(CertificateDer::from);
        let tier = match WebPkiTier::from_der("override", certs, &self.provider) {
            Ok(tier) => tier.map(Arc::new),
            Err(e) => {
                tracing::warn!(error = %e, "Could not build override tier; overrides ignored");
                None
            }
        };

        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        *cached = (generation, tier.clone());
        tier
    }
}

impl PathValidator for OverrideTier {
    fn validate(
        &self,
        chain: &CertificateChain,
        role: &Role<'_>,
        now: UnixTime,
    ) -> Result<(), ValidationFailure> {
        let end_entity = chain
            .end_entity()
            .ok_or(rustls::Error::NoCertificatesPresented)?;
        if self.store.contains_certificate(end_entity) {
            tracing::trace!(role = role.label(), "End entity is a stored override");
            return Ok(());
        }

        match self.current() {
            Some(tier) => tier.validate(chain, role, now),
            None => Err(unknown_issuer()),
        }
    }

    fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.current()
            .map(|tier| tier.accepted_issuers())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for OverrideTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideTier")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Override tier first, default tier second.
#[derive(Debug)]
pub struct ChainValidator {
    overrides: OverrideTier,
    default: Option<WebPkiTier>,
}

impl ChainValidator {
    pub fn new(overrides: OverrideTier, default: Option<WebPkiTier>) -> Self {
        if default.is_none() {
            tracing::warn!("No default trust roots; only user-approved chains will validate");
        }
        Self { overrides, default }
    }

    pub fn store(&self) -> &Arc<OverrideStore> {
        self.overrides.store()
    }

    /// Validate `chain`. On failure the returned cause is the default
    /// tier's; the override tier's reason is only logged.
    pub fn validate(
        &self,
        chain: &CertificateChain,
        role: &Role<'_>,
        now: UnixTime,
    ) -> Result<(), ValidationFailure> {
        match self.overrides.validate(chain, role, now) {
            Ok(()) => {
                tracing::debug!(role = role.label(), "Chain accepted by override tier");
                return Ok(());
            }
            Err(e) => tracing::trace!(role = role.label(), error = %e, "Override tier rejected chain"),
        }

        let result = match &self.default {
            Some(tier) => tier.validate(chain, role, now),
            None => Err(unknown_issuer()),
        };
        match &result {
            Ok(()) => tracing::debug!(role = role.label(), "Chain accepted by default tier"),
            Err(e) => tracing::debug!(role = role.label(), error = %e, "Default tier rejected chain"),
        }
        result
    }

    /// The default tier's issuers. Override anchors are not advertised.
    pub fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.default
            .as_ref()
            .map(|tier| tier.accepted_issuers())
            .unwrap_or_default()
    }
}

fn unknown_issuer() -> ValidationFailure {
    ValidationFailure::new(rustls::Error::InvalidCertificate(
        CertificateError::UnknownIssuer,
    ))
}
