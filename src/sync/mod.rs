//! Synchronization primitives for the write path.
//!
//! - [`CloseSignal`]: one-shot, connection-wide teardown event
//! - [`CancellableMutex`]: binary lock whose acquisition races the caller's
//!   context and the close signal

mod mutex;
mod signal;

pub use mutex::CancellableMutex;
pub use signal::CloseSignal;
