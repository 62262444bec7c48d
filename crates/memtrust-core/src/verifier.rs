//! The memorizing verifier: rustls integration for both handshake sides.

use std::sync::Arc;

use memtrust_store::OverrideStore;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, DistinguishedName, SignatureScheme};

use crate::chain::CertificateChain;
use crate::error::{TrustError, ValidationFailure};
use crate::negotiator::TrustNegotiator;
use crate::registry::DecisionRegistry;
use crate::validator::{ChainValidator, Role};

/// Validates peer chains and, when validation fails, asks the user.
///
/// A chain is trusted if the override store or the default roots accept
/// it. Otherwise exactly one prompt is raised for that handshake and the
/// calling thread blocks until it is answered. Handshake signatures are
/// always checked with the crypto provider regardless of the decision.
pub struct MemorizingVerifier {
    validator: ChainValidator,
    negotiator: TrustNegotiator,
    provider: Arc<CryptoProvider>,
    root_hints: Vec<DistinguishedName>,
}

impl MemorizingVerifier {
    pub fn new(
        validator: ChainValidator,
        negotiator: TrustNegotiator,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        let root_hints = validator.accepted_issuers();
        Self {
            validator,
            negotiator,
            provider,
            root_hints,
        }
    }

    /// Check a chain presented by `server_name`.
    pub fn check_server_trusted(
        &self,
        chain: &CertificateChain,
        server_name: &ServerName<'_>,
        now: UnixTime,
    ) -> Result<(), ValidationFailure> {
        self.check(chain, &Role::Server(server_name), now)
    }

    /// Check a chain presented by a connecting client.
    pub fn check_client_trusted(
        &self,
        chain: &CertificateChain,
        now: UnixTime,
    ) -> Result<(), ValidationFailure> {
        self.check(chain, &Role::Client, now)
    }

    /// Issuers of the default trust roots.
    pub fn accepted_issuers(&self) -> &[DistinguishedName] {
        &self.root_hints
    }

    pub fn store(&self) -> &Arc<OverrideStore> {
        self.validator.store()
    }

    pub fn registry(&self) -> &Arc<DecisionRegistry> {
        self.negotiator.registry()
    }

    pub fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// A client configuration that verifies servers with this verifier.
    pub fn client_config(self: Arc<Self>) -> Result<ClientConfig, TrustError> {
        let config = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(self)
            .with_no_client_auth();
        Ok(config)
    }

    fn check(
        &self,
        chain: &CertificateChain,
        role: &Role<'_>,
        now: UnixTime,
    ) -> Result<(), ValidationFailure> {
        match self.validator.validate(chain, role, now) {
            Ok(()) => Ok(()),
            Err(failure) => self.negotiator.interact(chain, failure).map(|_| ()),
        }
    }
}

impl std::fmt::Debug for MemorizingVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorizingVerifier")
            .field("validator", &self.validator)
            .field("negotiator", &self.negotiator)
            .field("root_hints", &self.root_hints.len())
            .finish_non_exhaustive()
    }
}

impl ServerCertVerifier for MemorizingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain = CertificateChain::from_parts(end_entity, intermediates);
        self.check_server_trusted(&chain, server_name, now)
            .map(|()| ServerCertVerified::assertion())
            .map_err(ValidationFailure::into_cause)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl ClientCertVerifier for MemorizingVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &self.root_hints
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        let chain = CertificateChain::from_parts(end_entity, intermediates);
        self.check_client_trusted(&chain, now)
            .map(|()| ClientCertVerified::assertion())
            .map_err(ValidationFailure::into_cause)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        ServerCertVerifier::verify_tls12_signature(self, message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        ServerCertVerifier::verify_tls13_signature(self, message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ServerCertVerifier::supported_verify_schemes(self)
    }
}
