//! Cancellable, deadline-bound contexts for write operations.
//!
//! Every operation that may wait (acquiring a lock, writing to the
//! transport) takes a [`WriteContext`]. A context is done once it has been
//! cancelled, once any ancestor has been cancelled, or once its deadline
//! passes.

use std::future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Cancellation and deadline scope for a write.
///
/// Cloning is cheap; clones share the same cancellation state.
#[derive(Debug, Clone, Default)]
pub struct WriteContext {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl WriteContext {
    /// A context that is never done.
    #[must_use]
    pub const fn background() -> Self {
        Self {
            token: None,
            deadline: None,
        }
    }

    /// A cancellable root context without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: Some(CancellationToken::new()),
            deadline: None,
        }
    }

    /// Derive a child that is cancelled with `self` but can also be cancelled
    /// on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        let token = match &self.token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        Self {
            token: Some(token),
            deadline: self.deadline,
        }
    }

    /// Derive a child whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child whose deadline is the earlier of `at` and the parent's.
    #[must_use]
    pub fn with_deadline(&self, at: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(parent) if parent < at => parent,
            _ => at,
        });
        child
    }

    /// Cancel this context and all of its children.
    ///
    /// A no-op on [`WriteContext::background`].
    pub fn cancel(&self) {
        if let Some(token) = &self.token {
            token.cancel();
        }
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check: the error this context is done with, if it is done.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context is done and return why.
    ///
    /// Never completes for a context without a token or deadline.
    pub async fn done(&self) -> Error {
        match (&self.token, self.deadline) {
            (Some(token), Some(at)) => tokio::select! {
                biased;
                _ = token.cancelled() => Error::Cancelled,
                _ = tokio::time::sleep_until(at) => Error::DeadlineExceeded,
            },
            (Some(token), None) => {
                token.cancelled().await;
                Error::Cancelled
            }
            (None, Some(at)) => {
                tokio::time::sleep_until(at).await;
                Error::DeadlineExceeded
            }
            (None, None) => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_never_done() {
        let ctx = WriteContext::background();
        ctx.cancel();
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_cancel_propagates_to_children() {
        let parent = WriteContext::new();
        let child = parent.child();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        parent.cancel();

        assert_eq!(child.err(), Some(Error::Cancelled));
        assert_eq!(grandchild.err(), Some(Error::Cancelled));
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let parent = WriteContext::new();
        let child = parent.child();
        child.cancel();
        assert!(parent.err().is_none());
        assert_eq!(child.err(), Some(Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_deadline_never_exceeds_parent() {
        let parent = WriteContext::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let tighter = parent.with_timeout(Duration::from_millis(10));
        assert!(tighter.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_on_deadline() {
        let ctx = WriteContext::background().with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());
        assert_eq!(ctx.done().await, Error::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(Error::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_done_on_cancel() {
        let ctx = WriteContext::new();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.done().await });
        ctx.cancel();
        assert_eq!(handle.await.unwrap(), Error::Cancelled);
    }
}
