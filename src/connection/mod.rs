//! The outgoing side of a WebSocket connection.
//!
//! ## Locking
//!
//! Two locks guard every connection:
//!
//! 1. **Message lock** - held from [`Connection::writer`] until
//!    [`MessageWriter::close`], so messages never interleave
//! 2. **Frame lock** - held while one physical frame is written, so a
//!    control frame can slip in between two frames of a data message
//!
//! Both give up as soon as the caller's [`WriteContext`](crate::WriteContext)
//! is done or the connection is torn down.

#[allow(clippy::module_inception)]
mod connection;
mod deadline;
mod role;
mod writer;

pub use connection::Connection;
pub use deadline::DeadlineWatcher;
pub use role::Role;
pub use writer::MessageWriter;
