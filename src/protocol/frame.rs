//! WebSocket frame header serialization (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                         Masking key (if present)              |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```

use crate::protocol::OpCode;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest possible header: 2 fixed bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Header of one outgoing frame.
///
/// Built fresh for every frame and never kept. RSV2 and RSV3 are always
/// clear on this side of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Last frame of the message.
    pub fin: bool,
    /// Compressed-payload bit (permessage-deflate).
    pub rsv1: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Payload length in bytes.
    pub payload_len: u64,
    /// Masking key. Present iff the frame is masked.
    pub mask_key: Option<[u8; 4]>,
}

impl FrameHeader {
    /// Number of bytes [`encode`](FrameHeader::encode) produces.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let extended = if self.payload_len <= 125 {
            0
        } else if self.payload_len <= 0xFFFF {
            2
        } else {
            8
        };
        let mask = if self.mask_key.is_some() { 4 } else { 0 };
        2 + extended + mask
    }

    /// Serialize the header in network byte order.
    ///
    /// Returns the number of bytes written to `buf`.
    pub fn encode(&self, buf: &mut [u8; MAX_HEADER_LEN]) -> usize {
        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        buf[0] = byte0;

        let mask_bit = if self.mask_key.is_some() { 0x80 } else { 0 };
        let mut offset = 2;
        match self.payload_len {
            len @ 0..=125 => buf[1] = mask_bit | len as u8,
            len @ 126..=0xFFFF => {
                buf[1] = mask_bit | 126;
                buf[2..4].copy_from_slice(&(len as u16).to_be_bytes());
                offset += 2;
            }
            len => {
                buf[1] = mask_bit | 127;
                buf[2..10].copy_from_slice(&len.to_be_bytes());
                offset += 8;
            }
        }

        if let Some(key) = self.mask_key {
            buf[offset..offset + 4].copy_from_slice(&key);
            offset += 4;
        }

        offset
    }
}
