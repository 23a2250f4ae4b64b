//! Byte-level output for the write path.
//!
//! [`BufferedSink`] owns the transport and the output buffer that frame
//! headers and payloads are assembled in. It is only ever touched while the
//! connection's frame-level lock is held.

mod sink;

pub use sink::BufferedSink;
