//! Single-subscriber progress fan-out.
//!
//! The shell attaches one handler for the lifetime of an operation. Events
//! published while nobody is subscribed are dropped, and a late subscriber
//! does not get a replay of what it missed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::step::StepTag;

/// A chunk of raw output (or an announcement) produced by one pipeline step.
///
/// `data` is not line-aligned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub step: StepTag,
    pub data: String,
}

impl ProgressEvent {
    pub fn new(step: StepTag, data: impl Into<String>) -> Self {
        Self {
            step,
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

type Handler = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Default)]
struct ChannelState {
    next_token: u64,
    subscriber: Option<(u64, Handler)>,
    sealed: bool,
}

/// Progress channel scoped to one orchestration call.
#[derive(Default)]
pub struct ProgressChannel {
    state: Mutex<ChannelState>,
}

impl std::fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ProgressChannel")
            .field("subscribed", &state.subscriber.is_some())
            .field("sealed", &state.sealed)
            .finish()
    }
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler`, replacing any previous subscriber.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        state.next_token += 1;
        let token = state.next_token;
        state.subscriber = Some((token, Arc::new(handler)));
        SubscriptionToken(token)
    }

    /// Detach the subscriber registered under `token`. Returns false when that
    /// subscriber was already replaced or removed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut state = self.lock();
        match state.subscriber {
            Some((current, _)) if current == token.0 => {
                state.subscriber = None;
                true
            }
            _ => false,
        }
    }

    pub fn publish(&self, event: ProgressEvent) {
        let handler = {
            let state = self.lock();
            if state.sealed {
                return;
            }
            match &state.subscriber {
                Some((_, handler)) => Arc::clone(handler),
                None => return,
            }
        };
        // Called outside the lock so handlers may unsubscribe themselves.
        handler(&event);
    }

    pub fn emit(&self, step: StepTag, data: impl Into<String>) {
        self.publish(ProgressEvent::new(step, data));
    }

    /// Stop delivering events. Orchestrators seal the channel once their
    /// terminal result is built.
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
