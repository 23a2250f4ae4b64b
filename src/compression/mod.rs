//! Permessage-deflate support for outgoing messages.

pub mod deflate;
mod pool;
mod trim;

pub use deflate::{DEFLATE_TRAILER, DeflateConfig, Deflater};
pub use pool::DeflaterPool;
pub use trim::TrimTail;
