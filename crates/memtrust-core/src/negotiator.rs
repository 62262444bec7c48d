//! Asking the user about a chain that failed validation.

use std::sync::Arc;
use std::time::Duration;

use memtrust_store::OverrideStore;

use crate::bridge::{PromptBridge, PromptRequest};
use crate::chain::CertificateChain;
use crate::decision::{PendingDecision, Resolution, TrustDecision};
use crate::error::ValidationFailure;
use crate::registry::DecisionRegistry;

/// Runs one prompt per call and acts on the answer.
pub struct TrustNegotiator {
    registry: Arc<DecisionRegistry>,
    bridge: Arc<dyn PromptBridge>,
    store: Arc<OverrideStore>,
    timeout: Option<Duration>,
}

impl TrustNegotiator {
    pub fn new(
        registry: Arc<DecisionRegistry>,
        bridge: Arc<dyn PromptBridge>,
        store: Arc<OverrideStore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            bridge,
            store,
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<DecisionRegistry> {
        &self.registry
    }

    /// Prompt for `chain` and block until the user answers.
    ///
    /// `Once` and `Always` accept (`Always` also stores the chain). Abort,
    /// interruption and timeout all return `failure` unchanged.
    pub fn interact(
        &self,
        chain: &CertificateChain,
        failure: ValidationFailure,
    ) -> Result<TrustDecision, ValidationFailure> {
        let message = chain.prompt_message(&failure);
        let pending = Arc::new(PendingDecision::new(message.clone()));
        let id = self.registry.register(Arc::clone(&pending));

        tracing::info!(id, certs = chain.len(), cause = %failure, "Asking user to trust certificate chain");
        self.bridge.dispatch(PromptRequest { id, message });

        let resolution = match pending.wait(self.timeout) {
            Some(resolution) => resolution,
            None if self.registry.retire(id) => {
                tracing::warn!(id, timeout = ?self.timeout, "Trust prompt timed out; rejecting");
                Resolution::Decided(TrustDecision::Abort)
            }
            // Answered between the timeout and the retire.
            None => pending.wait(None).unwrap_or(Resolution::Interrupted),
        };

        match resolution {
            Resolution::Decided(TrustDecision::Always) => {
                if let Err(e) = self.store.add_chain(chain.certs()) {
                    tracing::warn!(id, error = %e, "Could not remember chain; accepting this connection only");
                } else {
                    tracing::info!(id, "Chain trusted permanently");
                }
                Ok(TrustDecision::Always)
            }
            Resolution::Decided(TrustDecision::Once) => {
                tracing::info!(id, "Chain trusted for this connection");
                Ok(TrustDecision::Once)
            }
            Resolution::Decided(TrustDecision::Abort) => {
                tracing::info!(id, "Chain rejected by user");
                Err(failure)
            }
            Resolution::Interrupted => {
                tracing::info!(id, "Trust prompt interrupted; rejecting");
                Err(failure)
            }
        }
    }
}

impl std::fmt::Debug for TrustNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustNegotiator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{temp_store, Pki};
    use rustls::CertificateError;
    use std::sync::Mutex;

    /// Answers every prompt immediately with a fixed decision.
    struct Scripted {
        registry: Arc<DecisionRegistry>,
        answer: Option<TrustDecision>,
        seen: Mutex<Vec<PromptRequest>>,
    }

    impl PromptBridge for Scripted {
        fn dispatch(&self, request: PromptRequest) {
            if let Some(answer) = self.answer {
                self.registry.resolve(request.id, answer);
            }
            self.seen.lock().unwrap().push(request);
        }
    }

    fn negotiator(
        prefix: &str,
        answer: Option<TrustDecision>,
        timeout: Option<Duration>,
    ) -> (TrustNegotiator, Arc<Scripted>, Arc<OverrideStore>) {
        let registry = Arc::new(DecisionRegistry::new());
        let bridge = Arc::new(Scripted {
            registry: Arc::clone(&registry),
            answer,
            seen: Mutex::new(Vec::new()),
        });
        let store = temp_store(prefix);
        let negotiator =
            TrustNegotiator::new(registry, bridge.clone(), Arc::clone(&store), timeout);
        (negotiator, bridge, store)
    }

    fn unknown_issuer() -> ValidationFailure {
        rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer).into()
    }

    #[test]
    fn always_stores_chain() {
        let (negotiator, bridge, store) =
            negotiator("negotiate-always", Some(TrustDecision::Always), None);
        let chain = Pki::new("rootA").chain("leafA");

        let decision = negotiator.interact(&chain, unknown_issuer()).unwrap();
        assert_eq!(decision, TrustDecision::Always);
        assert_eq!(store.aliases(), vec!["CN=leafA", "CN=rootA"]);
        assert_eq!(bridge.seen.lock().unwrap().len(), 1);
        assert!(negotiator.registry().is_empty());
    }

    #[test]
    fn once_leaves_store_alone() {
        let (negotiator, _, store) = negotiator("negotiate-once", Some(TrustDecision::Once), None);
        let chain = Pki::new("rootA").chain("leafA");

        assert_eq!(
            negotiator.interact(&chain, unknown_issuer()).unwrap(),
            TrustDecision::Once
        );
        assert!(store.is_empty());
    }

    #[test]
    fn abort_returns_original_failure() {
        let (negotiator, _, store) = negotiator("negotiate-abort", Some(TrustDecision::Abort), None);
        let chain = Pki::new("rootA").chain("leafA");

        let err = negotiator.interact(&chain, unknown_issuer()).unwrap_err();
        assert_eq!(err.cause(), unknown_issuer().cause());
        assert!(store.is_empty());
    }

    #[test]
    fn timeout_rejects_and_clears_entry() {
        let (negotiator, bridge, _) =
            negotiator("negotiate-timeout", None, Some(Duration::from_millis(50)));
        let chain = Pki::new("rootA").chain("leafA");

        let err = negotiator.interact(&chain, unknown_issuer()).unwrap_err();
        assert_eq!(err.cause(), unknown_issuer().cause());
        assert!(negotiator.registry().is_empty());

        // A late answer finds nothing to resolve.
        let id = bridge.seen.lock().unwrap()[0].id;
        assert!(!negotiator.registry().resolve(id, TrustDecision::Always));
    }

    #[test]
    fn prompt_carries_chain_description() {
        let (negotiator, bridge, _) = negotiator("negotiate-message", Some(TrustDecision::Abort), None);
        let chain = Pki::new("rootA").chain("leafA");

        let _ = negotiator.interact(&chain, unknown_issuer());
        let seen = bridge.seen.lock().unwrap();
        assert!(seen[0]
            .message
            .ends_with("\n\nCN=leafA (CN=rootA)\n\nCN=rootA (CN=rootA)"));
    }
}
