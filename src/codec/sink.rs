use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::mask::mask_rolling;

/// Fixed-capacity write buffer in front of an async transport.
///
/// Unlike `tokio::io::BufWriter`, the buffer is exposed to masking: masked
/// payload bytes are XORed in place right after they are copied in, so no
/// separate masked copy of a payload is ever allocated.
#[derive(Debug)]
pub struct BufferedSink<T> {
    io: T,
    buf: BytesMut,
    capacity: usize,
}

impl<T> BufferedSink<T> {
    /// Wrap `io` with a buffer of `capacity` bytes (at least 1).
    pub fn new(io: T, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            io,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes that fit before the buffer must be drained.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn get_ref(&self) -> &T {
        &self.io
    }

    /// Unwrap the transport. Buffered bytes are discarded.
    #[cfg(test)]
    pub(crate) fn into_inner(self) -> T {
        self.io
    }
}

impl<T: AsyncWrite + Unpin> BufferedSink<T> {
    /// Copy `data` into the buffer, draining to the transport whenever the
    /// buffer fills.
    ///
    /// A write at least as large as the buffer goes straight to the
    /// transport if nothing is buffered.
    pub async fn write(&mut self, mut data: &[u8]) -> io::Result<usize> {
        let total = data.len();
        while !data.is_empty() {
            if self.buf.is_empty() && data.len() >= self.capacity {
                self.io.write_all(data).await?;
                break;
            }
            if self.available() == 0 {
                self.drain().await?;
            }
            let n = data.len().min(self.available());
            self.buf.extend_from_slice(&data[..n]);
            data = &data[n..];
        }
        Ok(total)
    }

    /// Copy `data` into the buffer and mask it in place with `key`.
    ///
    /// Each buffer-sized piece continues the key phase where the previous
    /// piece left off.
    pub async fn write_masked(&mut self, mut data: &[u8], mut key: [u8; 4]) -> io::Result<usize> {
        let total = data.len();
        while !data.is_empty() {
            if self.available() == 0 {
                self.drain().await?;
            }
            let start = self.buf.len();
            let n = data.len().min(self.available());
            self.buf.extend_from_slice(&data[..n]);
            key = mask_rolling(key, &mut self.buf[start..]);
            data = &data[n..];
        }
        Ok(total)
    }

    /// Drain the buffer and flush the transport.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.drain().await?;
        self.io.flush().await
    }

    async fn drain(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.io.write_all(&self.buf).await?;
            self.buf.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mask::apply_mask_bytewise;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Records each `poll_write` call separately.
    #[derive(Default)]
    struct RecordingStream {
        writes: Vec<Vec<u8>>,
        flushes: usize,
    }

    impl RecordingStream {
        fn concat(&self) -> Vec<u8> {
            self.writes.concat()
        }
    }

    impl AsyncWrite for RecordingStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.writes.push(buf.to_vec());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.flushes += 1;
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_small_writes_stay_buffered() {
        let mut sink = BufferedSink::new(RecordingStream::default(), 16);
        sink.write(b"abc").await.unwrap();
        sink.write(b"def").await.unwrap();

        assert_eq!(sink.buffered(), 6);
        assert!(sink.get_ref().writes.is_empty());

        sink.flush().await.unwrap();
        assert_eq!(sink.get_ref().concat(), b"abcdef");
        assert_eq!(sink.get_ref().flushes, 1);
        assert_eq!(sink.buffered(), 0);
    }

    #[tokio::test]
    async fn test_drains_when_full() {
        let mut sink = BufferedSink::new(RecordingStream::default(), 4);
        sink.write(b"ab").await.unwrap();
        sink.write(b"cdefg").await.unwrap();

        assert_eq!(sink.get_ref().writes, vec![b"abcd".to_vec()]);
        assert_eq!(sink.buffered(), 3);
        assert_eq!(sink.get_ref().flushes, 0);
    }

    #[tokio::test]
    async fn test_large_write_bypasses_empty_buffer() {
        let mut sink = BufferedSink::new(RecordingStream::default(), 4);
        let n = sink.write(b"0123456789").await.unwrap();

        assert_eq!(n, 10);
        assert_eq!(sink.get_ref().writes, vec![b"0123456789".to_vec()]);
        assert_eq!(sink.buffered(), 0);
    }

    #[tokio::test]
    async fn test_masked_write_spanning_many_drains() {
        let key = [0x01, 0x02, 0x04, 0x08];
        let payload: Vec<u8> = (0..50u8).collect();

        // Odd capacity and a pre-filled buffer force every piece to start at
        // a different key phase.
        let mut sink = BufferedSink::new(RecordingStream::default(), 7);
        sink.write(b"hd").await.unwrap();
        let n = sink.write_masked(&payload, key).await.unwrap();
        sink.flush().await.unwrap();

        assert_eq!(n, payload.len());
        assert!(sink.get_ref().writes.iter().all(|w| w.len() <= 7));

        let wire = sink.get_ref().concat();
        assert_eq!(&wire[..2], b"hd");

        let mut expected = payload.clone();
        apply_mask_bytewise(&mut expected, key);
        assert_eq!(&wire[2..], &expected[..]);
    }

    #[tokio::test]
    async fn test_vec_transport() {
        let mut sink = BufferedSink::new(Vec::new(), 8);
        sink.write(b"hello").await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(sink.into_inner(), b"hello");
    }
}
