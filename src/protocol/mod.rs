//! WebSocket wire format (RFC 6455): opcodes, frame headers and masking.

pub mod frame;
pub mod mask;
pub mod opcode;

pub use frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD, MAX_HEADER_LEN};
pub use mask::{apply_mask, mask_rolling};
pub use opcode::{MessageType, OpCode};
