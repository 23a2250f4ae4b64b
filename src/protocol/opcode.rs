//! WebSocket frame opcodes and message types as defined in RFC 6455.

/// WebSocket frame opcode.
///
/// Defines the interpretation of the payload data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum OpCode {
    /// Continuation frame (0x0).
    ///
    /// Every frame of a message after the first.
    Continuation = 0x0,

    /// Text frame (0x1).
    Text = 0x1,

    /// Binary frame (0x2).
    Binary = 0x2,

    /// Close frame (0x8).
    Close = 0x8,

    /// Ping frame (0x9).
    Ping = 0x9,

    /// Pong frame (0xA).
    Pong = 0xA,
}

impl OpCode {
    /// Convert OpCode to raw byte value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this is a control frame opcode.
    ///
    /// Control frames: Close (0x8), Ping (0x9), Pong (0xA).
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Check if this opcode starts a data message (Text or Binary).
    ///
    /// Only these carry the compressed-payload bit; continuation frames of
    /// the same message never do.
    #[inline]
    #[must_use]
    pub const fn starts_message(self) -> bool {
        matches!(self, OpCode::Text | OpCode::Binary)
    }

    /// Get human-readable name for this opcode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Type of an application data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// UTF-8 text message.
    Text,
    /// Binary message.
    Binary,
}

impl From<MessageType> for OpCode {
    fn from(ty: MessageType) -> Self {
        match ty {
            MessageType::Text => OpCode::Text,
            MessageType::Binary => OpCode::Binary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_is_control() {
        assert!(!OpCode::Continuation.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
    }

    #[test]
    fn test_only_text_and_binary_start_messages() {
        assert!(OpCode::Text.starts_message());
        assert!(OpCode::Binary.starts_message());
        assert!(!OpCode::Continuation.starts_message());
        assert!(!OpCode::Ping.starts_message());
        assert!(!OpCode::Close.starts_message());
    }

    #[test]
    fn test_message_type_to_opcode() {
        assert_eq!(OpCode::from(MessageType::Text), OpCode::Text);
        assert_eq!(OpCode::from(MessageType::Binary), OpCode::Binary);
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::Text.to_string(), "Text");
        assert_eq!(OpCode::Close.to_string(), "Close");
    }
}
