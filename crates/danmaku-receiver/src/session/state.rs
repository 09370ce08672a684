//! Session state

use std::fmt;

/// Lifecycle of one room connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Socket being opened
    Connecting,
    /// Auth frame sent, waiting for connect-success
    Authenticating,
    /// Connect-success received, heartbeating
    Established,
    /// Socket closed; terminal
    Closed,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Established => "established",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
