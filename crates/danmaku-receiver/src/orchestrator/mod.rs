//! Fleet orchestration
//!
//! One session loop per configured room, started with a random stagger.

mod fleet;
mod settings;
mod status;

pub use fleet::Orchestrator;
pub use settings::{stagger_delay, OrchestratorSettings, DEFAULT_STAGGER};
pub use status::{RoomRegistry, RoomStatus};
