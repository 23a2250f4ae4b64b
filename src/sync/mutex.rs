//! Binary lock with cancellable acquisition.
//!
//! # Cancel Safety
//!
//! Acquisition is a single race between three events, checked in this order:
//! the connection's close signal, the caller's context, and the lock itself.
//! If the close signal or the context wins, no lock is held and nothing needs
//! cleaning up. Once a guard is returned it is released on drop.
//!
//! The guard is owned (`OwnedMutexGuard`), so it can be stored inside a
//! handle and released from a different call than the one that acquired it.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::context::WriteContext;
use crate::error::Result;
use crate::sync::CloseSignal;

/// A FIFO-fair async mutex whose `lock` gives up when the caller's context is
/// done or the connection is torn down.
#[derive(Debug)]
pub struct CancellableMutex<T> {
    inner: Arc<Mutex<T>>,
    closed: Arc<CloseSignal>,
}

impl<T> CancellableMutex<T> {
    /// Create a mutex tied to a connection's close signal.
    pub fn new(value: T, closed: Arc<CloseSignal>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
            closed,
        }
    }

    /// Acquire the lock.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    ///   close signal fired before or while waiting
    /// - [`Error::Cancelled`](crate::Error::Cancelled) /
    ///   [`Error::DeadlineExceeded`](crate::Error::DeadlineExceeded) if `ctx`
    ///   was done before or while waiting
    pub async fn lock(&self, ctx: &WriteContext) -> Result<OwnedMutexGuard<T>> {
        if self.closed.is_fired() {
            return Err(self.closed.error());
        }
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let guard = tokio::select! {
            biased;
            _ = self.closed.fired() => return Err(self.closed.error()),
            err = ctx.done() => return Err(err),
            guard = Arc::clone(&self.inner).lock_owned() => guard,
        };

        // The lock may have been won in the same poll the signal fired.
        if self.closed.is_fired() {
            drop(guard);
            return Err(self.closed.error());
        }
        Ok(guard)
    }

    /// Acquire the lock without waiting, ignoring the context.
    #[cfg(test)]
    pub(crate) fn try_lock(&self) -> Option<OwnedMutexGuard<T>> {
        Arc::clone(&self.inner).try_lock_owned().ok()
    }
}
