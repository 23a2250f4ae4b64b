//! Shared helpers for integration tests: a minimal frame decoder and a
//! permessage-deflate inflater for checking what reached the wire.

#![allow(dead_code)]

use flate2::{Decompress, FlushDecompress};
use rsws_framer::protocol::apply_mask;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::task::JoinHandle;

/// A decoded frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: u8,
    pub mask: Option<[u8; 4]>,
    pub payload: Vec<u8>,
}

impl WireFrame {
    pub fn is_control(&self) -> bool {
        self.opcode >= 0x8
    }
}

/// Decode every frame in `wire`. Panics on truncated input.
pub fn parse_frames(mut wire: &[u8]) -> Vec<WireFrame> {
    let mut frames = Vec::new();
    while !wire.is_empty() {
        assert!(wire.len() >= 2, "truncated frame header");
        let b0 = wire[0];
        let b1 = wire[1];
        let mut pos = 2;

        let len = match b1 & 0x7f {
            126 => {
                let len = u16::from_be_bytes([wire[2], wire[3]]) as usize;
                pos += 2;
                len
            }
            127 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&wire[2..10]);
                pos += 8;
                u64::from_be_bytes(raw) as usize
            }
            len => len as usize,
        };

        let mask = if b1 & 0x80 != 0 {
            let key = [wire[pos], wire[pos + 1], wire[pos + 2], wire[pos + 3]];
            pos += 4;
            Some(key)
        } else {
            None
        };

        assert!(wire.len() >= pos + len, "truncated frame payload");
        let mut payload = wire[pos..pos + len].to_vec();
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        frames.push(WireFrame {
            fin: b0 & 0x80 != 0,
            rsv1: b0 & 0x40 != 0,
            rsv2: b0 & 0x20 != 0,
            rsv3: b0 & 0x10 != 0,
            opcode: b0 & 0x0f,
            mask,
            payload,
        });
        wire = &wire[pos + len..];
    }
    frames
}

/// Read everything the peer writes until it hangs up.
pub fn drain(mut rx: DuplexStream) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut wire = Vec::new();
        rx.read_to_end(&mut wire).await.unwrap();
        wire
    })
}

/// Group data frames into messages, dropping control frames.
///
/// Asserts that data frames of different messages never interleave.
pub fn data_messages(frames: &[WireFrame]) -> Vec<Vec<WireFrame>> {
    let mut messages = Vec::new();
    let mut current: Vec<WireFrame> = Vec::new();
    for frame in frames.iter().filter(|f| !f.is_control()) {
        if current.is_empty() {
            assert_ne!(frame.opcode, 0x0, "message starts with a continuation frame");
        } else {
            assert_eq!(frame.opcode, 0x0, "new message started before fin");
        }
        current.push(frame.clone());
        if frame.fin {
            messages.push(std::mem::take(&mut current));
        }
    }
    assert!(current.is_empty(), "unfinished message on the wire");
    messages
}

/// Concatenated payload of one message's frames.
pub fn payload_of(message: &[WireFrame]) -> Vec<u8> {
    message.iter().flat_map(|f| f.payload.iter().copied()).collect()
}

/// Receiving side of permessage-deflate.
pub struct Inflater {
    inner: Decompress,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
        }
    }

    /// Inflate one message's payload, appending the trailer the sender
    /// stripped.
    pub fn inflate(&mut self, compressed: &[u8]) -> Vec<u8> {
        let mut input = compressed.to_vec();
        input.extend_from_slice(&[0x00, 0x00, 0xff, 0xff]);

        let mut out = Vec::with_capacity(input.len() * 4 + 1024);
        let mut pos = 0;
        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(4096));
            }
            let before = self.inner.total_in();
            self.inner
                .decompress_vec(&input[pos..], &mut out, FlushDecompress::Sync)
                .unwrap();
            pos += (self.inner.total_in() - before) as usize;
            if pos == input.len() && out.len() < out.capacity() {
                return out;
            }
        }
    }

    pub fn reset(&mut self) {
        self.inner.reset(false);
    }
}
