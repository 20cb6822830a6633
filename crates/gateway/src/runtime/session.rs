//! Single-session state: the message log, the in-flight prompt guard,
//! and the current prompt's cancellation handle.
//!
//! History is mutated only by the prompt task holding the guard, so
//! appends are single-writer by construction.

use std::sync::Arc;

use cl_domain::cancel::CancelToken;
use cl_domain::error::{Error, Result};
use cl_domain::history::HistoryEntry;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct Session {
    history: Mutex<Vec<HistoryEntry>>,
    /// At most one prompt in flight; acquisition failure is `Busy`.
    gate: Arc<Semaphore>,
    /// Replaced at each prompt start; read by `cancel_current`.
    cancel: Mutex<Option<CancelToken>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            gate: Arc::new(Semaphore::new(1)),
            cancel: Mutex::new(None),
        }
    }

    /// Claim the in-flight guard without waiting. The permit auto-releases
    /// on drop; a second caller gets `Error::Busy` and history is untouched.
    pub fn try_begin(&self) -> Result<OwnedSemaphorePermit> {
        self.gate
            .clone()
            .try_acquire_owned()
            .map_err(|_| Error::Busy)
    }

    /// Install a fresh cancellation handle for the new prompt.
    pub fn arm_cancel(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.cancel.lock() = Some(token.clone());
        token
    }

    /// Drop the handle when a prompt finishes.
    pub fn clear_cancel(&self) {
        *self.cancel.lock() = None;
    }

    /// Signal the in-flight prompt, if any. Returns whether a handle was
    /// present; a no-op otherwise.
    pub fn cancel_current(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn append(&self, entry: HistoryEntry) {
        self.history.lock().push(entry);
    }

    /// A copy of the log for building the next provider request.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.history.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
