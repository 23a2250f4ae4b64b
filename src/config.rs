//! Configuration for the outbound side of a WebSocket connection.

use std::time::Duration;

use crate::compression::DeflateConfig;

/// Default capacity of the buffered sink.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 8192;

/// Default ceiling applied to every control frame write.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket write-side configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Write buffer size (in bytes).
    ///
    /// Frames are assembled in a buffer of this capacity before reaching the
    /// transport. Masked payloads larger than the buffer are masked and
    /// flushed one buffer at a time.
    ///
    /// Default: 8 KB (8192)
    pub write_buffer_size: usize,

    /// Ceiling for control frame writes (ping, pong, close).
    ///
    /// Default: 5 seconds
    pub control_timeout: Duration,

    /// Negotiated permessage-deflate parameters.
    ///
    /// `None` means compression was not negotiated and every message is sent
    /// uncompressed.
    /// Default: None
    pub compression: Option<DeflateConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            compression: None,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set write buffer size. Values below 1 are raised to 1.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set the control frame ceiling.
    #[must_use]
    pub const fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Enable permessage-deflate with the negotiated parameters.
    #[must_use]
    pub fn with_compression(mut self, compression: DeflateConfig) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Check whether permessage-deflate was negotiated.
    #[inline]
    #[must_use]
    pub const fn compression_enabled(&self) -> bool {
        self.compression.is_some()
    }
}
