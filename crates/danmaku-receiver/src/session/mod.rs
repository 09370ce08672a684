//! Room sessions
//!
//! [`Session`] holds the per-connection protocol state and is driven by
//! [`drive_socket`], which owns the WebSocket.

mod driver;
mod error;
mod session;
mod state;

pub use driver::{drive_socket, run_session, SessionEnd, SessionOptions};
pub use error::SessionError;
pub use session::{Credentials, DecodedEvent, Session};
pub use state::SessionState;
