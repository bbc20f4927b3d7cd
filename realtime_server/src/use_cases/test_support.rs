use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use crate::domain::{Clock, HistoryEntry, HistoryEvent, HistoryStore, StoreError, UserId};
use crate::use_cases::registry::{ConnectionHandle, ConnectionRegistry};

// Settable time source for deterministic use-case tests.
pub(crate) struct FixedClock(AtomicU64);

impl FixedClock {
    pub(crate) fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub(crate) fn advance_secs(&self, secs: u64) {
        self.0.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_epoch_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub(crate) struct RecordingStore {
    events: Mutex<Vec<HistoryEvent>>,
    fail_saves: bool,
}

impl RecordingStore {
    pub(crate) fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_saves: true,
        }
    }

    pub(crate) fn events(&self) -> Vec<HistoryEvent> {
        self.events.lock().expect("events mutex poisoned").clone()
    }

    // Saves run on spawned tasks; poll until `count` have landed.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<HistoryEvent> {
        for _ in 0..100 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.events()
    }

    // Gives stray spawned saves a chance to run before asserting on absence.
    pub(crate) async fn settle(&self) -> Vec<HistoryEvent> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.events()
    }
}

#[async_trait]
impl HistoryStore for RecordingStore {
    async fn save(&self, event: HistoryEvent) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Backend("save failed".to_string()));
        }
        self.events
            .lock()
            .expect("events mutex poisoned")
            .push(event);
        Ok(())
    }

    async fn query(
        &self,
        local_id: UserId,
        remote_id: UserId,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .events()
            .into_iter()
            .filter(|event| event.is_between(local_id, remote_id))
            .map(|event| event.into_entry(local_id))
            .collect())
    }
}

pub(crate) fn connect(
    registry: &ConnectionRegistry,
    user_id: UserId,
) -> (ConnectionHandle, mpsc::Receiver<Utf8Bytes>) {
    let (handle, rx) = ConnectionHandle::new(64);
    registry.upsert(user_id, handle.clone());
    (handle, rx)
}

// Everything queued so far, decoded as JSON.
pub(crate) fn drain(rx: &mut mpsc::Receiver<Utf8Bytes>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(serde_json::from_str(frame.as_str()).expect("outbound frame is JSON"));
    }
    out
}
