//! Idempotent cancellation handle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelReason {
    Hang,
    Timeout,
    User,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CancelReason::Hang => "hang detected",
            CancelReason::Timeout => "build timeout",
            CancelReason::User => "cancelled by user",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Default)]
struct Inner {
    reason: OnceLock<CancelReason>,
    notify: Notify,
}

/// Cloneable handle shared by the session loop and its periodic tasks.
/// Only the first request is recorded; repeated requests are no-ops.
#[derive(Debug, Clone, Default)]
pub struct Canceller {
    inner: Arc<Inner>,
}

impl Canceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the request that actually cancelled
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let first = self.inner.reason.set(reason).is_ok();
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.reason.get().copied()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) -> CancelReason {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(reason) = self.reason() {
                return reason;
            }
            notified.await;
        }
    }
}
