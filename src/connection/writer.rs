//! Streaming message writer.
//!
//! One [`MessageState`] lives inside each connection's message lock and is
//! reused for every message. A [`MessageWriter`] is the handle to it while a
//! message is open: it owns the lock guard from
//! [`Connection::writer`](crate::Connection::writer) until
//! [`close`](MessageWriter::close).

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::sync::OwnedMutexGuard;
use tracing::warn;

use crate::compression::{Deflater, TrimTail};
use crate::connection::connection::{Compression, Shared, TeardownGuard};
use crate::context::WriteContext;
use crate::error::{Error, Result};
use crate::protocol::OpCode;

const COMPRESSED_OUTPUT_LOST: &str = "compressed output lost";

/// Per-connection state of the message being written.
#[derive(Debug)]
pub(crate) struct MessageState {
    ctx: WriteContext,
    opcode: OpCode,
    closed: bool,
    /// Data was handed to the writer, so the peer may have seen part of it.
    started: bool,
    /// The fin frame went out, or the connection was torn down for it.
    finished: bool,
    deflate_active: bool,
    compression: Option<Compression>,
    /// With context takeover this lives as long as the connection. Without,
    /// it is checked out per message.
    deflater: Option<Deflater>,
    trim: TrimTail,
    scratch: Vec<u8>,
}

impl MessageState {
    pub(crate) fn new(compression: Option<Compression>) -> Self {
        Self {
            ctx: WriteContext::background(),
            opcode: OpCode::Text,
            closed: true,
            started: false,
            finished: true,
            deflate_active: false,
            compression,
            deflater: None,
            trim: TrimTail::new(),
            scratch: Vec::new(),
        }
    }

    pub(crate) fn begin(&mut self, ctx: WriteContext, opcode: OpCode) {
        self.ctx = ctx;
        self.opcode = opcode;
        self.closed = false;
        self.started = false;
        self.finished = false;
        self.deflate_active = false;
        self.release_message_deflater();
    }

    /// Engage compression for the current message.
    fn activate_deflate(&mut self) {
        let Some(compression) = &self.compression else {
            return;
        };
        if self.deflater.is_none() {
            self.deflater = Some(compression.pool.checkout());
        }
        self.trim.reset();
        self.deflate_active = true;
    }

    /// Return a per-message compressor to the pool. The context-takeover
    /// compressor stays.
    fn release_message_deflater(&mut self) {
        if let Some(compression) = &self.compression {
            if compression.no_context_takeover {
                if let Some(deflater) = self.deflater.take() {
                    compression.pool.put(deflater);
                }
            }
        }
    }
}

impl Drop for MessageState {
    fn drop(&mut self) {
        if let (Some(compression), Some(deflater)) = (&self.compression, self.deflater.take()) {
            compression.pool.put(deflater);
        }
    }
}

/// Writes one message as a sequence of frames.
///
/// Each [`write`](MessageWriter::write) sends what it can as a non-final
/// frame; [`close`](MessageWriter::close) sends the final frame and lets the
/// next message start. With compression negotiated, output is held back until
/// the compressor produces it.
///
/// Dropping a writer without closing it releases the connection for the next
/// message if nothing was written yet. Otherwise the peer would be left
/// mid-message, so the connection is torn down.
#[derive(Debug)]
pub struct MessageWriter<T> {
    shared: Arc<Shared<T>>,
    state: Option<OwnedMutexGuard<MessageState>>,
}

impl<T> MessageWriter<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, state: OwnedMutexGuard<MessageState>) -> Self {
        Self {
            shared,
            state: Some(state),
        }
    }

    /// Check whether [`close`](MessageWriter::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.as_ref().is_none_or(|state| state.closed)
    }
}

impl<T: AsyncWrite + Unpin> MessageWriter<T> {
    /// Write part of the message. Returns `data.len()` on success.
    ///
    /// ## Errors
    ///
    /// - [`Error::ClosedWriter`] after [`close`](MessageWriter::close)
    /// - any frame write error
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let state = match self.state.as_deref_mut() {
            Some(state) if !state.closed => state,
            _ => return Err(Error::ClosedWriter),
        };
        state.started = true;

        if state.compression.is_none() {
            let n = self
                .shared
                .write_frame(&state.ctx, false, state.opcode, false, data)
                .await?;
            state.opcode = OpCode::Continuation;
            return Ok(n);
        }

        if !state.deflate_active {
            state.activate_deflate();
        }
        let MessageState {
            ctx,
            opcode,
            deflater,
            trim,
            scratch,
            ..
        } = state;
        let Some(deflater) = deflater.as_mut() else {
            return Err(Error::Compression("compressor not engaged".into()));
        };

        // The compressor consumes `data` before the frame lock is won. Output
        // that never reaches the wire leaves the stream undecodable.
        let mut guard = TeardownGuard::arm(&self.shared.closed, COMPRESSED_OUTPUT_LOST);
        scratch.clear();
        deflater.write(data, scratch)?;
        let ready = trim.push(scratch);
        if !ready.is_empty() {
            self.shared.write_frame(ctx, false, *opcode, true, ready).await?;
            *opcode = OpCode::Continuation;
        }
        guard.disarm();
        Ok(data.len())
    }

    /// Finish the message and release the connection for the next one.
    ///
    /// Every step runs even if an earlier one fails; the first error is
    /// returned. If the final frame cannot be written after part of the
    /// message went out, the connection is torn down.
    ///
    /// ## Errors
    ///
    /// - [`Error::ClosedWriter`] if already closed
    /// - any compressor or frame write error
    pub async fn close(&mut self) -> Result<()> {
        let state = match self.state.as_deref_mut() {
            Some(state) if !state.closed => state,
            _ => return Err(Error::ClosedWriter),
        };
        state.closed = true;

        let mut first_err = None;

        if state.deflate_active {
            let MessageState {
                ctx,
                opcode,
                deflater,
                trim,
                scratch,
                ..
            } = &mut *state;
            let mut guard = TeardownGuard::arm(&self.shared.closed, COMPRESSED_OUTPUT_LOST);
            scratch.clear();
            let flushed = deflater.as_mut().map(|deflater| deflater.flush(scratch));
            match flushed {
                Some(Ok(())) => {
                    let ready = trim.push(scratch);
                    if ready.is_empty() {
                        guard.disarm();
                    } else {
                        match self.shared.write_frame(ctx, false, *opcode, true, ready).await {
                            Ok(_) => {
                                *opcode = OpCode::Continuation;
                                guard.disarm();
                            }
                            Err(err) => first_err = Some(err),
                        }
                    }
                }
                Some(Err(err)) => first_err = Some(err),
                None => guard.disarm(),
            }
            drop(guard);
            trim.reset();
        }

        let fin = self
            .shared
            .write_frame(&state.ctx, true, state.opcode, state.deflate_active, &[])
            .await;
        if let Err(err) = fin {
            if state.started {
                self.shared
                    .closed
                    .fire(format!("message left unfinished: {err}"));
            }
            first_err.get_or_insert(err);
        }
        state.finished = true;

        state.release_message_deflater();
        self.state = None;

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<T> Drop for MessageWriter<T> {
    fn drop(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        if state.started && !state.finished {
            warn!("message writer dropped mid-message");
            self.shared.closed.fire("message writer dropped mid-message");
        }
        state.release_message_deflater();
    }
}
