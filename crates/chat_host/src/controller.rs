//! Single-conversation controller.
//!
//! Owns the turn history and the one request that may be in flight. Views
//! never touch the state directly; they read snapshots or subscribe to them.

use parking_lot::Mutex;
use providers::CompletionGateway;
use shared::{ConversationSnapshot, Sender, Turn, TurnId, UserInput};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::prompts::AssistantProfile;

/// Why a submission was dropped without touching the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A request is already in flight
    Pending,
    /// Blank text and no image
    Blank,
}

/// How a submission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend's reply was appended
    Answered,
    /// The request failed and the fallback message was appended
    FellBack,
    /// Nothing happened
    Ignored(IgnoreReason),
}

#[derive(Default)]
struct ConversationState {
    history: Vec<Turn>,
    pending: bool,
    next_id: u64,
}

impl ConversationState {
    fn allocate_id(&mut self) -> TurnId {
        self.next_id += 1;
        TurnId::new(self.next_id)
    }

    fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            history: self.history.clone(),
            pending: self.pending,
        }
    }
}

/// Conversation controller: one per conversation.
pub struct ConversationController {
    gateway: Arc<dyn CompletionGateway>,
    profile: AssistantProfile,
    state: Mutex<ConversationState>,
    updates: watch::Sender<ConversationSnapshot>,
}

/// Clears `pending` if the submit future goes away before it finished,
/// e.g. when the task running it is aborted.
struct PendingGuard<'a> {
    controller: &'a ConversationController,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.controller.state.lock();
            state.pending = false;
            self.controller.publish(&state);
        }
    }
}

impl ConversationController {
    pub fn new(gateway: Arc<dyn CompletionGateway>, profile: AssistantProfile) -> Self {
        let (updates, _) = watch::channel(ConversationSnapshot::default());
        Self {
            gateway,
            profile,
            state: Mutex::new(ConversationState::default()),
            updates,
        }
    }

    pub fn profile(&self) -> &AssistantProfile {
        &self.profile
    }

    /// Current history and pending flag.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.state.lock().snapshot()
    }

    /// Receiver that sees a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.updates.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Submit user input and wait for the round to finish.
    ///
    /// Ignored while a request is in flight or when there is nothing to send.
    /// Otherwise appends the user turn, asks the gateway, and appends either
    /// the reply or the fallback message. Gateway errors never escape; they
    /// are logged.
    pub async fn submit(&self, input: UserInput) -> SubmitOutcome {
        let context = match self.accept(input) {
            Ok(context) => context,
            Err(reason) => {
                debug!(?reason, "submission ignored");
                return SubmitOutcome::Ignored(reason);
            }
        };
        let mut guard = PendingGuard {
            controller: self,
            armed: true,
        };

        let result = self
            .gateway
            .complete(
                &context.system_instructions,
                &context.prior_turns,
                &context.current_turn,
            )
            .await;

        let (reply, outcome) = match result {
            Ok(reply) if !reply.is_empty() => (reply, SubmitOutcome::Answered),
            Ok(_) => {
                warn!("completion backend returned an empty reply");
                (self.profile.fallback_message.clone(), SubmitOutcome::FellBack)
            }
            Err(e) => {
                warn!(kind = e.kind(), status = ?e.status(), error = %e, "completion failed");
                (self.profile.fallback_message.clone(), SubmitOutcome::FellBack)
            }
        };

        self.finish(reply);
        guard.armed = false;
        outcome
    }

    /// Run [`submit`](Self::submit) on the tokio runtime without waiting.
    pub fn spawn_submit(self: &Arc<Self>, input: UserInput) -> JoinHandle<SubmitOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.submit(input).await })
    }

    /// Empty the history. Does not cancel an in-flight request; its result
    /// is appended to the emptied history when it arrives.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.history.clear();
        self.publish(&state);
    }

    /// Validate, append the user turn, raise `pending`, and build the request
    /// context, all under one lock.
    fn accept(&self, input: UserInput) -> Result<RequestContext, IgnoreReason> {
        let mut state = self.state.lock();
        if state.pending {
            return Err(IgnoreReason::Pending);
        }
        if input.is_blank() {
            return Err(IgnoreReason::Blank);
        }

        let image = input.attached_image().map(str::to_string);
        let mut text = input.text.trim().to_string();
        if text.is_empty() {
            text = self.profile.default_caption.clone();
        }

        let id = state.allocate_id();
        let turn = Turn::new(id, Sender::User, Some(text), image).ok_or(IgnoreReason::Blank)?;
        let context =
            RequestContext::build(&self.profile.system_instructions, &state.history, &turn);
        debug!(
            turn = %id,
            prior_turns = context.prior_turns.len(),
            with_image = turn.image().is_some(),
            "submission accepted"
        );

        state.history.push(turn);
        state.pending = true;
        self.publish(&state);
        Ok(context)
    }

    fn finish(&self, reply: String) {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        if let Some(turn) = Turn::new(id, Sender::Assistant, Some(reply), None) {
            state.history.push(turn);
        }
        state.pending = false;
        self.publish(&state);
    }

    fn publish(&self, state: &ConversationState) {
        self.updates.send_replace(state.snapshot());
    }
}
