// Use cases layer: connection registry, routing and the realtime workflows on top of it.

pub mod chat;
pub mod history;
pub mod registry;
pub mod router;
pub mod signaling;
pub mod types;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::ChatRelay;
pub use history::HistoryRecorder;
pub use registry::{ConnectionHandle, ConnectionRegistry, EgressError};
pub use router::MessageRouter;
pub use signaling::CallSignaling;
pub use types::{Outbound, RejectReason};
pub use world::{WorldBroadcaster, run_world_ticker};
