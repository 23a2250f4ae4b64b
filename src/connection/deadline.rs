//! Deadline rendezvous between frame writes and deadline enforcement.
//!
//! Before touching the transport, a frame write publishes its context here;
//! afterwards it publishes [`WriteContext::background`]. The slot is a
//! `watch` channel, so publishing never waits for a reader.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::context::WriteContext;
use crate::sync::CloseSignal;

/// Observes the context of the in-flight frame write.
///
/// [`run`](DeadlineWatcher::run) enforces it: when the published context is
/// cancelled or its deadline passes before the write republishes, the
/// connection is torn down. Transports that apply deadlines themselves can
/// read [`current`](DeadlineWatcher::current) instead.
#[derive(Debug)]
pub struct DeadlineWatcher {
    rx: watch::Receiver<WriteContext>,
    closed: Arc<CloseSignal>,
}

impl DeadlineWatcher {
    pub(crate) fn new(rx: watch::Receiver<WriteContext>, closed: Arc<CloseSignal>) -> Self {
        Self { rx, closed }
    }

    /// The most recently published context.
    #[must_use]
    pub fn current(&self) -> WriteContext {
        self.rx.borrow().clone()
    }

    /// Enforce published contexts until the connection closes.
    pub async fn run(mut self) {
        loop {
            let ctx = self.rx.borrow_and_update().clone();
            tokio::select! {
                biased;
                _ = self.closed.fired() => return,
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                err = ctx.done() => {
                    debug!(%err, "frame write outlived its context");
                    self.closed.fire(format!("write timed out: {err}"));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;

    fn watcher() -> (watch::Sender<WriteContext>, Arc<CloseSignal>, DeadlineWatcher) {
        let (tx, rx) = watch::channel(WriteContext::background());
        let closed = Arc::new(CloseSignal::new());
        let watcher = DeadlineWatcher::new(rx, Arc::clone(&closed));
        (tx, closed, watcher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_on_expired_publication() {
        let (tx, closed, watcher) = watcher();
        let task = tokio::spawn(watcher.run());

        tx.send_replace(WriteContext::background().with_timeout(Duration::from_secs(1)));
        task.await.unwrap();

        assert_eq!(
            closed.error(),
            Error::ConnectionClosed("write timed out: context deadline exceeded".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_republished_background_disarms() {
        let (tx, closed, watcher) = watcher();
        let task = tokio::spawn(watcher.run());

        tx.send_replace(WriteContext::background().with_timeout(Duration::from_secs(1)));
        tokio::task::yield_now().await;
        tx.send_replace(WriteContext::background());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!closed.is_fired());

        closed.fire("shutdown");
        task.await.unwrap();
        assert_eq!(closed.reason(), Some("shutdown"));
    }

    #[tokio::test]
    async fn test_exits_when_sender_dropped() {
        let (tx, closed, watcher) = watcher();
        assert!(watcher.current().deadline().is_none());
        drop(tx);
        watcher.run().await;
        assert!(!closed.is_fired());
    }
}
