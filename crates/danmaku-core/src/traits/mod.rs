//! Persistence traits (ports)

mod store;

pub use store::{MessageStore, RepoResult};
