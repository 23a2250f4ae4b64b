//! Permessage-deflate parameters and the streaming compressor (RFC 7692).

use flate2::{Compress, Compression, FlushCompress};

use crate::connection::Role;
use crate::error::{Error, Result};

const MIN_WINDOW_BITS: u8 = 8;
const MAX_WINDOW_BITS: u8 = 15;
const DEFAULT_WINDOW_BITS: u8 = 15;

/// Raw deflate in zlib cannot use a 256-byte window; 8 is negotiated as 9.
const MIN_ZLIB_WINDOW_BITS: u8 = 9;

/// Spare output capacity reserved before each compressor call.
const OUTPUT_CHUNK: usize = 1024;

/// Trailer every sync flush ends with. Stripped before transmission.
pub const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// Negotiated permessage-deflate parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeflateConfig {
    pub server_no_context_takeover: bool,
    pub client_no_context_takeover: bool,
    pub server_max_window_bits: u8,
    pub client_max_window_bits: u8,
    pub compression_level: u32,
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self {
            server_no_context_takeover: false,
            client_no_context_takeover: false,
            server_max_window_bits: DEFAULT_WINDOW_BITS,
            client_max_window_bits: DEFAULT_WINDOW_BITS,
            compression_level: 6,
        }
    }
}

impl DeflateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_no_context_takeover(mut self, value: bool) -> Self {
        self.server_no_context_takeover = value;
        self
    }

    pub fn client_no_context_takeover(mut self, value: bool) -> Self {
        self.client_no_context_takeover = value;
        self
    }

    pub fn server_max_window_bits(mut self, bits: u8) -> Result<Self> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits) {
            return Err(Error::InvalidExtension(format!(
                "server_max_window_bits must be {}-{}, got {}",
                MIN_WINDOW_BITS, MAX_WINDOW_BITS, bits
            )));
        }
        self.server_max_window_bits = bits;
        Ok(self)
    }

    pub fn client_max_window_bits(mut self, bits: u8) -> Result<Self> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits) {
            return Err(Error::InvalidExtension(format!(
                "client_max_window_bits must be {}-{}, got {}",
                MIN_WINDOW_BITS, MAX_WINDOW_BITS, bits
            )));
        }
        self.client_max_window_bits = bits;
        Ok(self)
    }

    pub fn compression_level(mut self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidExtension(format!(
                "compression_level must be 0-9, got {}",
                level
            )));
        }
        self.compression_level = level;
        Ok(self)
    }

    /// Whether the compressor used by `role` for its own messages must start
    /// every message with an empty dictionary.
    #[must_use]
    pub fn no_context_takeover(&self, role: Role) -> bool {
        match role {
            Role::Client => self.client_no_context_takeover,
            Role::Server => self.server_no_context_takeover,
        }
    }

    /// LZ77 window size for the compressor used by `role`.
    #[must_use]
    pub fn window_bits(&self, role: Role) -> u8 {
        let bits = match role {
            Role::Client => self.client_max_window_bits,
            Role::Server => self.server_max_window_bits,
        };
        bits.clamp(MIN_ZLIB_WINDOW_BITS, MAX_WINDOW_BITS)
    }

    #[must_use]
    pub fn level(&self) -> Compression {
        Compression::new(self.compression_level.min(9))
    }
}

/// A streaming raw-deflate compressor.
///
/// Input written with [`write`](Deflater::write) may be held internally until
/// enough accumulates for a block; [`flush`](Deflater::flush) forces it all
/// out with a sync flush, which always ends in [`DEFLATE_TRAILER`].
#[derive(Debug)]
pub struct Deflater {
    compress: Compress,
}

impl Deflater {
    pub fn new(level: Compression, window_bits: u8) -> Self {
        let window_bits = window_bits.clamp(MIN_ZLIB_WINDOW_BITS, MAX_WINDOW_BITS);
        Self {
            compress: Compress::new_with_window_bits(level, false, window_bits),
        }
    }

    /// Feed `input`, appending whatever compressed output is ready to `out`.
    pub fn write(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        while !input.is_empty() {
            out.reserve(input.len() / 2 + OUTPUT_CHUNK);
            let before_in = self.compress.total_in();
            let before_out = out.len();

            self.compress
                .compress_vec(input, out, FlushCompress::None)
                .map_err(|e| Error::Compression(e.to_string()))?;

            let consumed = (self.compress.total_in() - before_in) as usize;
            if consumed == 0 && out.len() == before_out {
                return Err(Error::Compression("deflate stream stalled".into()));
            }
            input = &input[consumed..];
        }
        Ok(())
    }

    /// Sync-flush everything buffered so far into `out`.
    pub fn flush(&mut self, out: &mut Vec<u8>) -> Result<()> {
        loop {
            out.reserve(OUTPUT_CHUNK);
            let spare = out.capacity() - out.len();
            let before_out = out.len();

            self.compress
                .compress_vec(&[], out, FlushCompress::Sync)
                .map_err(|e| Error::Compression(e.to_string()))?;

            // Output stopped short of the spare space: the flush is complete.
            if out.len() - before_out < spare {
                return Ok(());
            }
        }
    }

    /// Drop all dictionary and pending state.
    pub fn reset(&mut self) {
        self.compress.reset();
    }

    /// Total uncompressed bytes fed since creation or the last reset.
    #[must_use]
    pub fn total_in(&self) -> u64 {
        self.compress.total_in()
    }
}
