//! Which end of the connection this side is.

/// WebSocket connection role.
///
/// The client is the connection initiator, the server the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiator. Masks every outgoing frame.
    Client,
    /// Responder. Never masks.
    Server,
}

impl Role {
    /// Check if this role must mask outgoing frames.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}
