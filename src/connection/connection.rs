use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::watch;
use tracing::trace;

use crate::codec::BufferedSink;
use crate::compression::DeflaterPool;
use crate::config::Config;
use crate::connection::writer::{MessageState, MessageWriter};
use crate::connection::{DeadlineWatcher, Role};
use crate::context::WriteContext;
use crate::error::{Error, Result, WritePhase};
use crate::protocol::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD, MAX_HEADER_LEN, MessageType, OpCode};
use crate::sync::{CancellableMutex, CloseSignal};

/// Negotiated compression as the outgoing side applies it.
#[derive(Debug, Clone)]
pub(crate) struct Compression {
    pub(crate) no_context_takeover: bool,
    pub(crate) pool: Arc<DeflaterPool>,
}

#[derive(Debug)]
pub(crate) struct Shared<T> {
    role: Role,
    compressed: bool,
    control_timeout: Duration,
    pub(crate) closed: Arc<CloseSignal>,
    deadline: watch::Sender<WriteContext>,
    frame: CancellableMutex<BufferedSink<T>>,
    message: CancellableMutex<MessageState>,
}

/// The outgoing half of a WebSocket connection.
///
/// `Connection` is a cheap handle: clones share one transport, so any number
/// of tasks can write concurrently. Data messages are serialized against each
/// other for their whole duration; control frames only wait for the physical
/// frame currently on the wire, so a ping can go out in the middle of a large
/// streamed message.
///
/// The handshake is assumed to be done. `Connection` never reads.
///
/// ## Example
///
/// ```rust,ignore
/// use rsws_framer::{Config, Connection, MessageType, Role, WriteContext};
///
/// let conn = Connection::new(stream, Role::Client, Config::default());
/// let ctx = WriteContext::background();
///
/// conn.write(&ctx, MessageType::Text, b"hello").await?;
///
/// let mut w = conn.writer(&ctx, MessageType::Binary).await?;
/// w.write(&chunk_a).await?;
/// w.write(&chunk_b).await?;
/// w.close().await?;
/// ```
#[derive(Debug)]
pub struct Connection<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Connection<T> {
    /// Wrap a transport whose handshake is complete.
    ///
    /// If `config` carries negotiated compression, a compressor pool private
    /// to this connection is created. Use [`Connection::with_pool`] to share
    /// one between connections.
    pub fn new(io: T, role: Role, config: Config) -> Self {
        let pool = config
            .compression
            .as_ref()
            .map(|deflate| Arc::new(DeflaterPool::for_config(deflate, role)));
        Self::build(io, role, config, pool)
    }

    /// Like [`Connection::new`], drawing compressors from `pool`.
    ///
    /// The pool must produce compressors for the window size negotiated for
    /// `role`. It is ignored if `config` has no compression.
    pub fn with_pool(io: T, role: Role, config: Config, pool: Arc<DeflaterPool>) -> Self {
        Self::build(io, role, config, Some(pool))
    }

    fn build(io: T, role: Role, config: Config, pool: Option<Arc<DeflaterPool>>) -> Self {
        let compression = match (&config.compression, pool) {
            (Some(deflate), Some(pool)) => Some(Compression {
                no_context_takeover: deflate.no_context_takeover(role),
                pool,
            }),
            _ => None,
        };

        let closed = Arc::new(CloseSignal::new());
        let (deadline, _) = watch::channel(WriteContext::background());
        let sink = BufferedSink::new(io, config.write_buffer_size);

        Self {
            shared: Arc::new(Shared {
                role,
                compressed: compression.is_some(),
                control_timeout: config.control_timeout,
                frame: CancellableMutex::new(sink, Arc::clone(&closed)),
                message: CancellableMutex::new(MessageState::new(compression), Arc::clone(&closed)),
                closed,
                deadline,
            }),
        }
    }

    /// Which side of the connection this is.
    #[must_use]
    pub fn role(&self) -> Role {
        self.shared.role
    }

    /// Check whether outgoing data messages are compressed.
    #[must_use]
    pub fn compression_enabled(&self) -> bool {
        self.shared.compressed
    }

    /// Tear the connection down. Every pending and future write fails with
    /// [`Error::ConnectionClosed`] carrying `reason`.
    ///
    /// Returns `false` if the connection was already closed; the first
    /// reason is kept.
    pub fn close_now(&self, reason: impl Into<String>) -> bool {
        self.shared.closed.fire(reason)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_fired()
    }

    /// Wait until the connection is torn down.
    pub async fn closed(&self) {
        self.shared.closed.fired().await;
    }

    /// The error writes fail with once the connection is closed.
    #[must_use]
    pub fn terminal_error(&self) -> Option<Error> {
        self.shared.closed.is_fired().then(|| self.shared.closed.error())
    }

    /// A watcher over the context of the in-flight frame write.
    pub fn deadline_watcher(&self) -> DeadlineWatcher {
        DeadlineWatcher::new(self.shared.deadline.subscribe(), Arc::clone(&self.shared.closed))
    }
}

impl<T: AsyncWrite + Unpin> Connection<T> {
    /// Start a message of type `ty`.
    ///
    /// Waits until no other message is in progress on this connection. The
    /// returned writer holds that exclusivity until it is closed or dropped.
    ///
    /// ## Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::Cancelled`] / [`Error::DeadlineExceeded`] if `ctx` is done
    ///   before the previous message finishes
    pub async fn writer(&self, ctx: &WriteContext, ty: MessageType) -> Result<MessageWriter<T>> {
        let mut state = self.shared.message.lock(ctx).await?;
        state.begin(ctx.clone(), ty.into());
        Ok(MessageWriter::new(Arc::clone(&self.shared), state))
    }

    /// Write a whole message.
    ///
    /// Without compression the message is always exactly one frame.
    pub async fn write(&self, ctx: &WriteContext, ty: MessageType, payload: &[u8]) -> Result<()> {
        if !self.shared.compressed {
            let _message = self.shared.message.lock(ctx).await?;
            self.shared.write_frame(ctx, true, ty.into(), false, payload).await?;
            return Ok(());
        }

        let mut writer = self.writer(ctx, ty).await?;
        let written = writer.write(payload).await;
        let closed = writer.close().await;
        written.and(closed)
    }

    /// Write a control frame under the connection's control ceiling.
    ///
    /// Does not wait for an in-progress data message, only for the frame
    /// currently being written.
    ///
    /// ## Errors
    ///
    /// - [`Error::NotControlFrame`] if `opcode` is a data opcode
    /// - [`Error::ControlFrameTooLarge`] if `payload` exceeds 125 bytes
    /// - [`Error::DeadlineExceeded`] if the ceiling passes first
    pub async fn write_control(&self, ctx: &WriteContext, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if !opcode.is_control() {
            return Err(Error::NotControlFrame(opcode));
        }
        if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload.len()));
        }

        let ctx = ctx.with_timeout(self.shared.control_timeout);
        self.shared.write_frame(&ctx, true, opcode, false, payload).await?;
        Ok(())
    }

    /// Send a ping carrying `payload`.
    pub async fn ping(&self, ctx: &WriteContext, payload: &[u8]) -> Result<()> {
        self.write_control(ctx, OpCode::Ping, payload).await
    }

    /// Send a pong carrying `payload`.
    pub async fn pong(&self, ctx: &WriteContext, payload: &[u8]) -> Result<()> {
        self.write_control(ctx, OpCode::Pong, payload).await
    }
}

impl<T> Shared<T> {
    fn publish(&self, ctx: WriteContext) {
        self.deadline.send_replace(ctx);
    }
}

impl<T: AsyncWrite + Unpin> Shared<T> {
    /// Write one physical frame and return the number of payload bytes
    /// written.
    ///
    /// `compressed` marks the message as deflated; it only reaches the wire
    /// as RSV1 on the first frame of a data message.
    pub(crate) async fn write_frame(
        &self,
        ctx: &WriteContext,
        fin: bool,
        opcode: OpCode,
        compressed: bool,
        payload: &[u8],
    ) -> Result<usize> {
        let mut sink = self.frame.lock(ctx).await?;
        if self.closed.is_fired() {
            return Err(self.closed.error());
        }

        let mask_key = if self.role.must_mask() {
            Some(new_mask_key()?)
        } else {
            None
        };
        let header = FrameHeader {
            fin,
            rsv1: compressed && opcode.starts_message(),
            opcode,
            payload_len: payload.len() as u64,
            mask_key,
        };

        self.publish(ctx.clone());
        let mut guard = TeardownGuard::arm(&self.closed, "frame write abandoned");

        let result = tokio::select! {
            biased;
            _ = self.closed.fired() => Err(self.closed.error()),
            res = write_header_and_payload(&mut sink, &header, payload) => res,
            err = ctx.done() => {
                self.closed.fire(format!("write timed out: {err}"));
                Err(err)
            }
        };

        guard.disarm();
        self.publish(WriteContext::background());

        match &result {
            Ok(_) => trace!(
                opcode = opcode.name(),
                fin,
                rsv1 = header.rsv1,
                len = payload.len(),
                masked = mask_key.is_some(),
                "wrote frame"
            ),
            // A partial frame on the wire cannot be recovered from.
            Err(err @ Error::Transport { .. }) => {
                self.closed.fire(format!("write failed: {err}"));
            }
            Err(_) => {}
        }
        result
    }
}

async fn write_header_and_payload<T: AsyncWrite + Unpin>(
    sink: &mut BufferedSink<T>,
    header: &FrameHeader,
    payload: &[u8],
) -> Result<usize> {
    let mut buf = [0u8; MAX_HEADER_LEN];
    let len = header.encode(&mut buf);
    sink.write(&buf[..len])
        .await
        .map_err(|e| Error::transport(WritePhase::Header, e))?;

    let written = match header.mask_key {
        Some(key) => sink.write_masked(payload, key).await,
        None => sink.write(payload).await,
    }
    .map_err(|e| Error::transport(WritePhase::Payload, e))?;

    if header.fin {
        sink.flush()
            .await
            .map_err(|e| Error::transport(WritePhase::Flush, e))?;
    }
    Ok(written)
}

fn new_mask_key() -> Result<[u8; 4]> {
    let mut key = [0u8; 4];
    getrandom::getrandom(&mut key).map_err(|e| Error::RandomSource(e.to_string()))?;
    Ok(key)
}

/// Tears the connection down with `reason` unless disarmed before it is
/// dropped.
///
/// Held across a step that leaves the wire or the compressor in a state the
/// peer cannot follow if the step stops halfway: a frame between its first
/// and last byte, or compressed output that has not reached the wire yet.
pub(crate) struct TeardownGuard<'a> {
    closed: &'a CloseSignal,
    reason: &'static str,
    armed: bool,
}

impl<'a> TeardownGuard<'a> {
    pub(crate) fn arm(closed: &'a CloseSignal, reason: &'static str) -> Self {
        Self {
            closed,
            reason,
            armed: true,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.closed.fire(self.reason);
        }
    }
}
