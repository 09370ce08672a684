//! Platform HTTP API
//!
//! Only the danmaku server lookup is needed: it returns the gateway host to
//! connect to and the token to authenticate with.

mod danmu_info;

pub use danmu_info::{BiliApiClient, DanmuServer, HostLookup, LookupError};
