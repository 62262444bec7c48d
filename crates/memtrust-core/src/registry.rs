//! Process-wide table of open trust prompts.
//!
//! Empty at process start. Entries are added by [`DecisionRegistry::register`]
//! and removed exactly once, by whichever of resolve / interrupt / retire
//! gets there first. Nothing else clears the table; an unanswered prompt
//! stays open until one of those happens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::decision::{DecisionId, DecisionMessage, PendingDecision, Resolution, TrustDecision};

#[derive(Debug, Default)]
struct Table {
    next_id: DecisionId,
    open: HashMap<DecisionId, Arc<PendingDecision>>,
}

#[derive(Debug, Default)]
pub struct DecisionRegistry {
    table: Mutex<Table>,
}

impl DecisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every verifier in the process unless one is
    /// configured explicitly.
    pub fn global() -> Arc<DecisionRegistry> {
        static GLOBAL: OnceLock<Arc<DecisionRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(DecisionRegistry::new())))
    }

    /// Store `pending` under the next identifier.
    pub fn register(&self, pending: Arc<PendingDecision>) -> DecisionId {
        let mut table = self.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.open.insert(id, pending);
        tracing::debug!(id, open = table.open.len(), "Trust decision registered");
        id
    }

    /// Deliver the user's answer for `id`.
    ///
    /// Unknown or already-settled identifiers are logged and ignored.
    /// Returns whether a waiter was woken.
    pub fn resolve(&self, id: DecisionId, decision: TrustDecision) -> bool {
        let Some(pending) = self.take(id) else {
            tracing::warn!(id, %decision, "Decision for unknown or already resolved prompt ignored");
            return false;
        };
        tracing::debug!(id, %decision, "Trust decision resolved");
        pending.complete(Resolution::Decided(decision))
    }

    /// [`resolve`](Self::resolve) for a decision that arrived over the wire.
    pub fn deliver(&self, message: &DecisionMessage) -> bool {
        self.resolve(message.id, message.decision())
    }

    /// Cancel the wait for `id`; the waiter treats it as abort.
    pub fn interrupt(&self, id: DecisionId) -> bool {
        let Some(pending) = self.take(id) else {
            tracing::debug!(id, "Interrupt for unknown or already resolved prompt ignored");
            return false;
        };
        tracing::info!(id, "Trust decision interrupted");
        pending.complete(Resolution::Interrupted)
    }

    /// Interrupt every open prompt (shutdown). Returns how many were open.
    pub fn interrupt_all(&self) -> usize {
        let drained: Vec<_> = self.lock().open.drain().collect();
        let count = drained.len();
        for (id, pending) in drained {
            tracing::debug!(id, "Trust decision interrupted at shutdown");
            pending.complete(Resolution::Interrupted);
        }
        count
    }

    /// Drop `id` without waking anyone. Used by a waiter that gave up.
    /// Returns `false` if someone else already removed it.
    pub fn retire(&self, id: DecisionId) -> bool {
        self.take(id).is_some()
    }

    /// Open identifiers, ascending.
    pub fn pending(&self) -> Vec<DecisionId> {
        let mut ids: Vec<_> = self.lock().open.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().open.is_empty()
    }

    fn take(&self, id: DecisionId) -> Option<Arc<PendingDecision>> {
        self.lock().open.remove(&id)
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pending() -> Arc<PendingDecision> {
        Arc::new(PendingDecision::new("prompt"))
    }

    #[test]
    fn ids_are_sequential() {
        let registry = DecisionRegistry::new();
        assert_eq!(registry.register(pending()), 0);
        assert_eq!(registry.register(pending()), 1);
        assert_eq!(registry.register(pending()), 2);
        assert_eq!(registry.pending(), vec![0, 1, 2]);
    }

    #[test]
    fn resolve_sets_state_and_removes() {
        let registry = DecisionRegistry::new();
        let p = pending();
        let id = registry.register(Arc::clone(&p));

        assert!(registry.resolve(id, TrustDecision::Once));
        assert!(registry.is_empty());
        assert_eq!(p.resolution(), Some(Resolution::Decided(TrustDecision::Once)));
    }

    #[test]
    fn second_resolve_is_a_no_op() {
        let registry = DecisionRegistry::new();
        let p = pending();
        let id = registry.register(Arc::clone(&p));

        assert!(registry.resolve(id, TrustDecision::Abort));
        assert!(!registry.resolve(id, TrustDecision::Always));
        assert_eq!(p.resolution(), Some(Resolution::Decided(TrustDecision::Abort)));
    }

    #[test]
    fn resolve_unknown_id_is_a_no_op() {
        let registry = DecisionRegistry::new();
        assert!(!registry.resolve(42, TrustDecision::Always));
        assert!(!registry.interrupt(42));
        assert!(!registry.retire(42));
    }

    #[test]
    fn deliver_parses_choice() {
        let registry = DecisionRegistry::new();
        let p = pending();
        let id = registry.register(Arc::clone(&p));

        let msg = DecisionMessage {
            id,
            choice: "bogus".into(),
        };
        assert!(registry.deliver(&msg));
        assert_eq!(p.resolution(), Some(Resolution::Decided(TrustDecision::Abort)));
    }

    #[test]
    fn interrupt_all_wakes_everyone() {
        let registry = DecisionRegistry::new();
        let a = pending();
        let b = pending();
        registry.register(Arc::clone(&a));
        registry.register(Arc::clone(&b));

        assert_eq!(registry.interrupt_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(a.wait(Some(Duration::ZERO)), Some(Resolution::Interrupted));
        assert_eq!(b.wait(Some(Duration::ZERO)), Some(Resolution::Interrupted));
    }

    #[test]
    fn retire_does_not_wake() {
        let registry = DecisionRegistry::new();
        let p = pending();
        let id = registry.register(Arc::clone(&p));

        assert!(registry.retire(id));
        assert!(p.resolution().is_none());
        assert!(!registry.resolve(id, TrustDecision::Always));
    }

    #[test]
    fn concurrent_registration_yields_distinct_ids() {
        let registry = Arc::new(DecisionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| registry.register(pending()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<DecisionId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(registry.len(), 400);
    }
}
