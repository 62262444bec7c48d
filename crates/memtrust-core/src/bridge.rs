//! Getting a prompt in front of a user.
//!
//! The negotiator blocks a validation thread; the bridge hands the prompt
//! to whatever owns the user interface and never blocks itself. Answers
//! come back through the [`DecisionRegistry`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::decision::{DecisionId, TrustDecision};
use crate::registry::DecisionRegistry;

/// A prompt awaiting an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRequest {
    pub id: DecisionId,
    pub message: String,
}

/// Delivers prompts to an interactive surface.
///
/// Implementations must return promptly. An implementation that cannot
/// show the prompt should resolve the id as abort, or the waiter stays
/// blocked until its timeout (if any).
pub trait PromptBridge: Send + Sync {
    fn dispatch(&self, request: PromptRequest);
}

/// Out-of-band notice for a prompt that no surface could show.
pub trait Notifier: Send + Sync {
    fn notify(&self, request: &PromptRequest);
}

/// Notifier that writes the prompt to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, request: &PromptRequest) {
        tracing::warn!(
            id = request.id,
            message = %request.message,
            "Certificate needs a trust decision but no prompt surface is available"
        );
    }
}

/// One-shot answer handle for a prompt.
///
/// Dropping it unanswered (the user dismissed the prompt, the surface
/// went away) resolves the prompt as abort.
#[derive(Debug)]
pub struct DecisionReply {
    registry: Arc<DecisionRegistry>,
    id: DecisionId,
    answered: bool,
}

impl DecisionReply {
    pub fn new(registry: Arc<DecisionRegistry>, id: DecisionId) -> Self {
        Self {
            registry,
            id,
            answered: false,
        }
    }

    pub fn id(&self) -> DecisionId {
        self.id
    }

    /// Answer the prompt. Returns whether a waiter was still listening.
    pub fn send(mut self, decision: TrustDecision) -> bool {
        self.answered = true;
        self.registry.resolve(self.id, decision)
    }
}

impl Drop for DecisionReply {
    fn drop(&mut self) {
        if !self.answered {
            tracing::debug!(id = self.id, "Prompt dismissed without an answer");
            self.registry.resolve(self.id, TrustDecision::Abort);
        }
    }
}

/// A prompt plus the handle to answer it.
#[derive(Debug)]
pub struct PromptTicket {
    pub request: PromptRequest,
    pub reply: DecisionReply,
}

/// Bridge that queues prompts onto a bounded channel for a UI task.
pub struct ChannelBridge {
    registry: Arc<DecisionRegistry>,
    tx: mpsc::Sender<PromptTicket>,
    notifier: Arc<dyn Notifier>,
}

impl ChannelBridge {
    /// Create the bridge and the receiver the UI task drains.
    ///
    /// `capacity` bounds the prompts waiting for the UI. Dispatch never
    /// waits for room: a prompt arriving at a full (or closed) channel
    /// goes to the notifier and is rejected at once, so size it for the
    /// largest burst of concurrent handshakes expected.
    pub fn new(
        registry: Arc<DecisionRegistry>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<PromptTicket>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let bridge = Self {
            registry,
            tx,
            notifier: Arc::new(LogNotifier),
        };
        (bridge, rx)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

impl PromptBridge for ChannelBridge {
    fn dispatch(&self, request: PromptRequest) {
        let ticket = PromptTicket {
            reply: DecisionReply::new(Arc::clone(&self.registry), request.id),
            request,
        };
        if let Err(e) = self.tx.try_send(ticket) {
            let reason = match &e {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            let PromptTicket { request, reply } = e.into_inner();
            tracing::warn!(id = request.id, reason, "Prompt channel unavailable");
            self.notifier.notify(&request);
            reply.send(TrustDecision::Abort);
        }
    }
}

impl std::fmt::Debug for ChannelBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBridge")
            .field("capacity", &self.tx.max_capacity())
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

/// Bridge for processes with no interactive surface: notify, then reject.
pub struct UnattendedBridge {
    registry: Arc<DecisionRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl UnattendedBridge {
    pub fn new(registry: Arc<DecisionRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self { registry, notifier }
    }
}

impl PromptBridge for UnattendedBridge {
    fn dispatch(&self, request: PromptRequest) {
        self.notifier.notify(&request);
        self.registry.resolve(request.id, TrustDecision::Abort);
    }
}

impl std::fmt::Debug for UnattendedBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnattendedBridge").finish_non_exhaustive()
    }
}
