//! Frame operation codes

/// Operation carried in a frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Keep-alive sent by the client, empty body
    Heartbeat,
    /// Reply to a heartbeat; body is a 4-byte big-endian popularity count
    HeartbeatReply,
    /// Command payload (chat messages, gifts, room events)
    Message,
    /// Authentication sent by the client right after the socket opens
    Auth,
    /// Authentication accepted
    ConnectSuccess,
    /// Any code this client does not interpret
    Other(u32),
}

impl Operation {
    /// Create an `Operation` from its wire value
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        match value {
            2 => Self::Heartbeat,
            3 => Self::HeartbeatReply,
            5 => Self::Message,
            7 => Self::Auth,
            8 => Self::ConnectSuccess,
            other => Self::Other(other),
        }
    }

    /// Get the wire value
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Heartbeat => 2,
            Self::HeartbeatReply => 3,
            Self::Message => 5,
            Self::Auth => 7,
            Self::ConnectSuccess => 8,
            Self::Other(value) => value,
        }
    }

    /// Get the name of this operation
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Heartbeat => "Heartbeat",
            Self::HeartbeatReply => "HeartbeatReply",
            Self::Message => "Message",
            Self::Auth => "Auth",
            Self::ConnectSuccess => "ConnectSuccess",
            Self::Other(_) => "Other",
        }
    }
}

impl From<u32> for Operation {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}
