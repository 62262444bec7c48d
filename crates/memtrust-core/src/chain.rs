use memtrust_crypto::identity;
use rustls::pki_types::CertificateDer;

use crate::error::ValidationFailure;

/// Certificates presented by a peer, leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Vec<CertificateDer<'static>>,
}

impl CertificateChain {
    pub fn new(certs: Vec<CertificateDer<'static>>) -> Self {
        Self { certs }
    }

    /// Capture the rustls view of a handshake's chain.
    pub fn from_parts(end_entity: &CertificateDer<'_>, intermediates: &[CertificateDer<'_>]) -> Self {
        let certs = std::iter::once(end_entity)
            .chain(intermediates)
            .map(|c| c.clone().into_owned())
            .collect();
        Self { certs }
    }

    pub fn end_entity(&self) -> Option<&CertificateDer<'static>> {
        self.certs.first()
    }

    pub fn intermediates(&self) -> &[CertificateDer<'static>] {
        self.certs.get(1..).unwrap_or_default()
    }

    pub fn certs(&self) -> &[CertificateDer<'static>] {
        &self.certs
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Prompt text: the failure's root cause, then `"\n\n<subject> (<issuer>)"`
    /// for each certificate in chain order.
    pub fn prompt_message(&self, failure: &ValidationFailure) -> String {
        let mut message = failure.root_cause_text();
        for cert in &self.certs {
            let (subject, issuer) = match identity::identify(cert) {
                Ok(id) => (id.subject, id.issuer),
                Err(e) => {
                    tracing::debug!(error = %e, "Certificate in chain could not be parsed for display");
                    let placeholder = identity::subject_or_placeholder(cert);
                    (placeholder.clone(), placeholder)
                }
            };
            message.push_str("\n\n");
            message.push_str(&subject);
            message.push_str(" (");
            message.push_str(&issuer);
            message.push(')');
        }
        message
    }
}

impl From<Vec<CertificateDer<'static>>> for CertificateChain {
    fn from(certs: Vec<CertificateDer<'static>>) -> Self {
        Self::new(certs)
    }
}
