//! Cooperative cancellation.
//!
//! Tokens are cheap clones over shared state. Handlers observe cancellation
//! through the [`crate::message_context::MessageContext`]; the runtime uses
//! the same token to resolve a pending RPC caller early.

use crate::error::{HiveError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Callback = Box<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct Inner {
    cancelled: bool,
    callbacks: Vec<Callback>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token. Registered callbacks run once, on the calling
    /// task; later calls are no-ops.
    pub fn cancel(&self) {
        let callbacks = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.cancelled {
                return;
            }
            inner.cancelled = true;
            std::mem::take(&mut inner.callbacks)
        };
        for callback in &callbacks {
            callback();
        }
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancelled
    }

    /// Registers a callback to run on cancellation. If the token is already
    /// cancelled the callback runs immediately.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let run_now = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.cancelled {
                true
            } else {
                inner.callbacks.push(Box::new(callback));
                return;
            }
        };
        if run_now {
            callback();
        }
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a cancel landing in
            // between cannot slip past notify_waiters unseen.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Error form of [`Self::is_cancelled`] for use in `?` chains.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(HiveError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Creates a token that is cancelled whenever this one is.
    pub fn child(&self) -> CancellationToken {
        let child = CancellationToken::new();
        let linked = child.clone();
        self.add_callback(move || linked.cancel());
        child
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// Only the flag crosses a serialization boundary; callbacks and waiters are
// process-local.
impl Serialize for CancellationToken {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bool(self.is_cancelled())
    }
}

impl<'de> Deserialize<'de> for CancellationToken {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let cancelled = bool::deserialize(deserializer)?;
        let token = CancellationToken::new();
        if cancelled {
            token.cancel();
        }
        Ok(token)
    }
}
