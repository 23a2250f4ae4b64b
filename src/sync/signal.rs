//! One-shot connection teardown signal.

use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;

/// Fired exactly once when a connection is torn down.
///
/// The first call to [`fire`](CloseSignal::fire) records the terminal reason;
/// later calls are ignored. Every waiter and every subsequent check observes
/// the same reason.
#[derive(Debug, Default)]
pub struct CloseSignal {
    token: CancellationToken,
    reason: OnceLock<String>,
}

impl CloseSignal {
    /// Create an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` if this call fired it.
    pub fn fire(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        // The reason is stored before waking waiters so they always find it.
        if self.reason.set(reason).is_err() {
            return false;
        }
        if let Some(reason) = self.reason.get() {
            debug!(%reason, "connection closed");
        }
        self.token.cancel();
        true
    }

    /// Check whether the signal has fired.
    #[inline]
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The terminal reason, if fired.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// The error every write observing this signal returns.
    #[must_use]
    pub fn error(&self) -> Error {
        Error::ConnectionClosed(self.reason().unwrap_or("connection closed").to_owned())
    }

    /// Wait until the signal fires.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}
