use crate::domain::{Clock, HistoryStore};
use crate::use_cases::{
    CallSignaling, ChatRelay, ConnectionRegistry, HistoryRecorder, MessageRouter, WorldBroadcaster,
};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct AppState {
    // Live connections keyed by user id; shared by every workflow below.
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<MessageRouter>,
    pub signaling: Arc<CallSignaling>,
    pub world: Arc<WorldBroadcaster>,
    pub chat: Arc<ChatRelay>,
    // Read side of the history port for the HTTP query route.
    pub history: Arc<dyn HistoryStore>,
    pub clock: Arc<dyn Clock>,
    // Per-connection outbound queue depth.
    pub egress_capacity: usize,
}

impl AppState {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        egress_capacity: usize,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(MessageRouter::new(Arc::clone(&registry)));
        let recorder = HistoryRecorder::new(Arc::clone(&history));

        let signaling = Arc::new(CallSignaling::new(
            Arc::clone(&router),
            recorder.clone(),
            Arc::clone(&clock),
        ));
        let world = Arc::new(WorldBroadcaster::new(Arc::clone(&router)));
        let chat = Arc::new(ChatRelay::new(
            Arc::clone(&router),
            recorder,
            Arc::clone(&clock),
        ));

        Self {
            registry,
            router,
            signaling,
            world,
            chat,
            history,
            clock,
            egress_capacity,
        }
    }
}

/// Wall-clock time source used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}
