//! Live room commands
//!
//! Data frames from the gateway carry a JSON object keyed by `cmd`. Only a small
//! closed set is modelled; everything else is kept verbatim for forward compatibility.

mod live_command;

pub use live_command::{
    CommandError, DanmakuMessage, InteractWord, LiveCommand, WatchedChange, CMD_DANMU_MSG,
    CMD_INTERACT_WORD, CMD_WATCHED_CHANGE,
};
