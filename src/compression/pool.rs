use std::sync::{Mutex, PoisonError};

use flate2::Compression;
use tracing::trace;

use crate::compression::deflate::{DeflateConfig, Deflater};
use crate::connection::Role;

/// Shared pool of idle compressors.
///
/// Every compressor handed out by one pool is configured identically, so a
/// pool may be shared by any number of connections that negotiated the same
/// level and window size.
#[derive(Debug)]
pub struct DeflaterPool {
    level: Compression,
    window_bits: u8,
    max_idle: usize,
    idle: Mutex<Vec<Deflater>>,
}

impl DeflaterPool {
    pub const DEFAULT_MAX_IDLE: usize = 64;

    pub fn new(level: Compression, window_bits: u8) -> Self {
        Self {
            level,
            window_bits,
            max_idle: Self::DEFAULT_MAX_IDLE,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Pool for the compressor `role` uses under `config`.
    pub fn for_config(config: &DeflateConfig, role: Role) -> Self {
        Self::new(config.level(), config.window_bits(role))
    }

    /// Cap the number of idle compressors kept. Extra returns are dropped.
    #[must_use]
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    #[must_use]
    pub fn window_bits(&self) -> u8 {
        self.window_bits
    }

    #[must_use]
    pub fn level(&self) -> Compression {
        self.level
    }

    /// Take an idle compressor, or build a new one.
    ///
    /// The compressor is always in its initial state.
    pub fn checkout(&self) -> Deflater {
        let reused = self.lock().pop();
        match reused {
            Some(deflater) => {
                trace!("reusing pooled compressor");
                deflater
            }
            None => {
                trace!(window_bits = self.window_bits, "allocating compressor");
                Deflater::new(self.level, self.window_bits)
            }
        }
    }

    /// Return a compressor. It is reset before it becomes reusable.
    pub fn put(&self, mut deflater: Deflater) {
        deflater.reset();
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(deflater);
        }
    }

    /// Number of idle compressors.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Deflater>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DeflaterPool {
    fn default() -> Self {
        Self::new(Compression::default(), 15)
    }
}
