//! Single-session state tracking
//!
//! At most one authorization attempt is active at a time. The slot holds
//! the attempt's anti-forgery state token and the caller's completion
//! handlers; beginning a new attempt displaces any pending one.
//!
//! Each `begin` issues a generation number. A completion presents its
//! generation back to `resolve`, which hands out the session only while
//! that generation is still current — the compare-and-reset point that
//! keeps duplicate and late completions from resolving a session twice.

use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Error;

pub(crate) type SuccessHandler = Box<dyn FnOnce(String) + Send>;
pub(crate) type FailureHandler = Box<dyn FnOnce(Error) + Send>;

/// One pending authorization attempt.
pub(crate) struct Session {
    pub state: String,
    pub on_success: SuccessHandler,
    pub on_failure: FailureHandler,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    session: Option<Session>,
}

/// Mutex-guarded slot for the single active session.
pub(crate) struct SessionSlot {
    inner: Mutex<Slot>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Slot::default()),
        }
    }

    /// Install a new session and return its generation.
    ///
    /// Overwrite semantics: a pending attempt is dropped without resolving,
    /// so its caller never hears back through the original handlers.
    pub async fn begin(
        &self,
        state: String,
        on_success: SuccessHandler,
        on_failure: FailureHandler,
    ) -> u64 {
        let mut slot = self.inner.lock().await;
        if slot.session.is_some() {
            warn!("displacing a pending authorization attempt");
        }
        slot.generation += 1;
        slot.session = Some(Session {
            state,
            on_success,
            on_failure,
        });
        slot.generation
    }

    /// State token of the pending session, if one is active.
    pub async fn pending_state(&self) -> Option<String> {
        let slot = self.inner.lock().await;
        slot.session.as_ref().map(|s| s.state.clone())
    }

    /// Generation of the pending session iff `candidate` equals its state
    /// exactly. None when no session is active: with the slot empty there
    /// is no current state for the candidate to equal.
    pub async fn matches(&self, candidate: &str) -> Option<u64> {
        let slot = self.inner.lock().await;
        match &slot.session {
            Some(s) if s.state == candidate => Some(slot.generation),
            _ => None,
        }
    }

    /// Compare-and-reset: take the session iff `generation` is still
    /// current. Exactly one completion can win; a duplicate, or a
    /// completion for a displaced session, gets None.
    pub async fn resolve(&self, generation: u64) -> Option<Session> {
        let mut slot = self.inner.lock().await;
        if slot.generation == generation {
            slot.session.take()
        } else {
            None
        }
    }

    pub async fn is_pending(&self) -> bool {
        self.inner.lock().await.session.is_some()
    }
}
