//! # rsws-framer - the outgoing half of a WebSocket connection
//!
//! Turns application messages into RFC 6455 frames on any
//! `tokio::io::AsyncWrite`, with optional permessage-deflate (RFC 7692),
//! under concurrent use.
//!
//! ## Features
//!
//! - **Streamed messages** of any size, written chunk by chunk
//! - **Client masking** applied in place as bytes enter the write buffer
//! - **permessage-deflate** with or without context takeover, with a
//!   shareable compressor pool
//! - **Control frames mid-message**: pings never wait for a large message
//! - **Cancellable waits** on every lock and write through [`WriteContext`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rsws_framer::{Config, Connection, MessageType, Role, WriteContext};
//!
//! let conn = Connection::new(stream, Role::Client, Config::default());
//! let ctx = WriteContext::background();
//!
//! conn.write(&ctx, MessageType::Text, b"hello").await?;
//! conn.ping(&ctx, b"").await?;
//! ```

pub mod codec;
pub mod compression;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod protocol;
pub mod sync;

pub use codec::BufferedSink;
pub use compression::{DeflateConfig, DeflaterPool};
pub use config::Config;
pub use connection::{Connection, DeadlineWatcher, MessageWriter, Role};
pub use context::WriteContext;
pub use error::{Error, Result, WritePhase};
pub use protocol::{MessageType, OpCode};

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<DeflateConfig>();
        assert_send::<DeflaterPool>();
        assert_send::<WriteContext>();
        assert_send::<Role>();
        assert_send::<Connection<DuplexStream>>();
        assert_send::<MessageWriter<DuplexStream>>();
        assert_send::<DeadlineWatcher>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<DeflaterPool>();
        assert_sync::<WriteContext>();
        assert_sync::<Role>();
        assert_sync::<Connection<DuplexStream>>();
    }

    #[test]
    fn test_write_future_is_send() {
        fn assert_send_val<T: Send>(_: &T) {}
        let (tx, _rx) = tokio::io::duplex(16);
        let conn = Connection::new(tx, Role::Client, Config::default());
        let ctx = WriteContext::background();
        let fut = conn.write(&ctx, MessageType::Text, b"x");
        assert_send_val(&fut);
    }
}
