use crate::compression::deflate::DEFLATE_TRAILER;

const HOLD: usize = DEFLATE_TRAILER.len();

/// Holds back the last four bytes of a compressed stream.
///
/// Permessage-deflate messages are sent without the `00 00 FF FF` that ends
/// every sync flush. Since the compressor cannot say which of its output
/// bytes are the trailer until the stream ends, the final four bytes seen
/// are always withheld; when the message finishes they are the trailer and
/// are dropped with [`reset`](TrimTail::reset).
#[derive(Debug, Default)]
pub struct TrimTail {
    held: Vec<u8>,
    out: Vec<u8>,
}

impl TrimTail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push compressor output. Returns the bytes that are now safe to send,
    /// which may be empty.
    pub fn push(&mut self, data: &[u8]) -> &[u8] {
        self.out.clear();
        if self.held.len() + data.len() <= HOLD {
            self.held.extend_from_slice(data);
            return &self.out;
        }

        self.out.extend_from_slice(&self.held);
        self.out.extend_from_slice(data);
        let cut = self.out.len() - HOLD;
        self.held.clear();
        self.held.extend_from_slice(&self.out[cut..]);
        self.out.truncate(cut);
        &self.out
    }

    /// Bytes currently withheld.
    #[must_use]
    pub fn held(&self) -> &[u8] {
        &self.held
    }

    /// Discard the withheld bytes.
    pub fn reset(&mut self) {
        self.held.clear();
        self.out.clear();
    }
}
