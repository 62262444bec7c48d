//! Trust decisions and the wait handle a validating thread blocks on.

use std::str::FromStr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Correlates a dispatched prompt with its answer.
pub type DecisionId = u64;

/// The user's answer to a trust prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDecision {
    /// Do not trust this connection.
    Abort,
    /// Trust this connection attempt only.
    Once,
    /// Trust and remember the chain.
    Always,
}

impl TrustDecision {
    /// Interpret a choice coming over an untyped transport.
    ///
    /// Anything unrecognised is a rejection.
    pub fn from_choice(choice: &str) -> Self {
        choice.parse().unwrap_or_else(|e: UnknownChoice| {
            tracing::warn!(choice = %e.0, "Unknown trust choice treated as abort");
            Self::Abort
        })
    }

    pub fn accepts(self) -> bool {
        matches!(self, Self::Once | Self::Always)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Once => "once",
            Self::Always => "always",
        }
    }
}

impl std::fmt::Display for TrustDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trust choice: {0:?}")]
pub struct UnknownChoice(pub String);

impl FromStr for TrustDecision {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "once" => Ok(Self::Once),
            "always" => Ok(Self::Always),
            _ => Err(UnknownChoice(s.to_string())),
        }
    }
}

/// Wire form of a decision delivered from another process or task.
///
/// `choice` stays a string so a malformed value degrades to abort
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionMessage {
    pub id: DecisionId,
    pub choice: String,
}

impl DecisionMessage {
    pub fn new(id: DecisionId, decision: TrustDecision) -> Self {
        Self {
            id,
            choice: decision.as_str().to_string(),
        }
    }

    pub fn decision(&self) -> TrustDecision {
        TrustDecision::from_choice(&self.choice)
    }
}

/// How a pending decision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Decided(TrustDecision),
    /// The wait was cancelled; treated as abort.
    Interrupted,
}

/// One in-flight prompt.
///
/// The state starts unset and moves exactly once to a [`Resolution`].
/// Later completions are ignored.
#[derive(Debug)]
pub struct PendingDecision {
    message: String,
    state: Mutex<Option<Resolution>>,
    wake: Condvar,
}

impl PendingDecision {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            state: Mutex::new(None),
            wake: Condvar::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn resolution(&self) -> Option<Resolution> {
        *self.lock()
    }

    /// Set the resolution and wake the waiter. Returns `false` if the
    /// decision was already resolved.
    pub(crate) fn complete(&self, resolution: Resolution) -> bool {
        let mut state = self.lock();
        if state.is_some() {
            return false;
        }
        *state = Some(resolution);
        drop(state);
        self.wake.notify_one();
        true
    }

    /// Block until resolved. `None` means the timeout elapsed first.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<Resolution> {
        let state = self.lock();
        match timeout {
            None => *self
                .wake
                .wait_while(state, |s| s.is_none())
                .unwrap_or_else(PoisonError::into_inner),
            Some(limit) => {
                let (state, _) = self
                    .wake
                    .wait_timeout_while(state, limit, |s| s.is_none())
                    .unwrap_or_else(PoisonError::into_inner);
                *state
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Resolution>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn parses_choices_case_insensitively() {
        assert_eq!("always".parse::<TrustDecision>(), Ok(TrustDecision::Always));
        assert_eq!(" Once ".parse::<TrustDecision>(), Ok(TrustDecision::Once));
        assert_eq!("ABORT".parse::<TrustDecision>(), Ok(TrustDecision::Abort));
        assert!("yes".parse::<TrustDecision>().is_err());
    }

    #[test]
    fn unknown_choice_is_abort() {
        assert_eq!(TrustDecision::from_choice("maybe"), TrustDecision::Abort);
        assert_eq!(TrustDecision::from_choice(""), TrustDecision::Abort);
        assert!(!TrustDecision::Abort.accepts());
        assert!(TrustDecision::Once.accepts());
    }

    #[test]
    fn decision_message_wire_format() {
        let msg = DecisionMessage::new(7, TrustDecision::Always);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 7, "choice": "always" }));

        let garbled: DecisionMessage =
            serde_json::from_value(serde_json::json!({ "id": 7, "choice": "sure" })).unwrap();
        assert_eq!(garbled.decision(), TrustDecision::Abort);
    }

    #[test]
    fn complete_only_once() {
        let pending = PendingDecision::new("msg");
        assert!(pending.complete(Resolution::Decided(TrustDecision::Once)));
        assert!(!pending.complete(Resolution::Decided(TrustDecision::Always)));
        assert_eq!(
            pending.resolution(),
            Some(Resolution::Decided(TrustDecision::Once))
        );
    }

    #[test]
    fn wait_returns_immediately_when_already_resolved() {
        let pending = PendingDecision::new("msg");
        pending.complete(Resolution::Interrupted);
        assert_eq!(pending.wait(None), Some(Resolution::Interrupted));
    }

    #[test]
    fn wait_times_out_when_unresolved() {
        let pending = PendingDecision::new("msg");
        assert_eq!(pending.wait(Some(Duration::from_millis(20))), None);
    }

    #[test]
    fn waiter_wakes_on_completion_from_other_thread() {
        let pending = Arc::new(PendingDecision::new("msg"));
        let resolver = Arc::clone(&pending);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            resolver.complete(Resolution::Decided(TrustDecision::Always));
        });

        let outcome = pending.wait(Some(Duration::from_secs(5)));
        handle.join().unwrap();
        assert_eq!(outcome, Some(Resolution::Decided(TrustDecision::Always)));
    }
}
