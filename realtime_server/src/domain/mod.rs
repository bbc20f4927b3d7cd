// Domain layer: call, world and history types plus the ports use cases depend on.

pub mod call;
pub mod errors;
pub mod history;
pub mod ports;
pub mod world;

pub use call::{ActiveCall, CallRole, CallState};
pub use errors::StoreError;
pub use history::{HistoryEntry, HistoryEvent, HistoryKind};
pub use ports::{Clock, HistoryStore};
pub use world::{Participant, WorldSnapshot, WorldUpdate};

/// Identity a connection is registered under.
pub type UserId = u64;
