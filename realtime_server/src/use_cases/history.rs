// Fire-and-forget writes to the history store.

use crate::domain::{HistoryEvent, HistoryStore};

use std::sync::Arc;
use tracing::warn;

/// Hands events to the store on a background task; callers never wait on
/// persistence and failures are only logged.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, event: HistoryEvent) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let (local_id, remote_id, kind) = (event.local_id, event.remote_id, event.kind);
            if let Err(e) = store.save(event).await {
                warn!(
                    local_id,
                    remote_id,
                    kind = kind.as_str(),
                    error = %e,
                    "failed to persist history event"
                );
            }
        });
    }
}
