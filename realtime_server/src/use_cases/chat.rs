// Stateless chat relay.

use crate::domain::{Clock, HistoryEvent, UserId};
use crate::use_cases::history::HistoryRecorder;
use crate::use_cases::router::MessageRouter;
use crate::use_cases::types::Outbound;

use std::sync::Arc;
use tracing::debug;

pub struct ChatRelay {
    router: Arc<MessageRouter>,
    history: HistoryRecorder,
    clock: Arc<dyn Clock>,
}

impl ChatRelay {
    pub fn new(router: Arc<MessageRouter>, history: HistoryRecorder, clock: Arc<dyn Clock>) -> Self {
        Self {
            router,
            history,
            clock,
        }
    }

    /// Persists in the background, then delivers to the recipient and echoes
    /// to the sender so the sender's other views stay in sync.
    pub fn on_chat(&self, from_id: UserId, to_id: UserId, content: String) {
        let timestamp = self.clock.now_epoch_millis();
        self.history
            .record(HistoryEvent::chat(from_id, to_id, content.clone(), timestamp));

        let msg = Outbound::Chat {
            from_id,
            to_id,
            message: content,
            timestamp,
        };
        let Some(frame) = self.router.encode(msg) else {
            return;
        };
        let delivered = self.router.send_frame(to_id, frame.clone());
        if to_id != from_id {
            self.router.send_frame(from_id, frame);
        }
        debug!(from_id, to_id, delivered, "chat relayed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::registry::ConnectionRegistry;
    use crate::use_cases::test_support::{FixedClock, RecordingStore, connect, drain};

    fn relay(store: Arc<RecordingStore>) -> (Arc<ConnectionRegistry>, ChatRelay) {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(MessageRouter::new(Arc::clone(&registry)));
        let relay = ChatRelay::new(
            router,
            HistoryRecorder::new(store),
            Arc::new(FixedClock::new(42)),
        );
        (registry, relay)
    }

    #[tokio::test]
    async fn chat_reaches_recipient_and_echoes_to_sender() {
        let store = Arc::new(RecordingStore::default());
        let (registry, relay) = relay(store.clone());
        let (_a, mut rx_a) = connect(&registry, 1);
        let (_b, mut rx_b) = connect(&registry, 2);

        relay.on_chat(1, 2, "hello".to_string());

        for rx in [&mut rx_a, &mut rx_b] {
            let msgs = drain(rx);
            assert_eq!(msgs.len(), 1);
            assert_eq!(msgs[0]["type"], "chat");
            assert_eq!(msgs[0]["fromId"], 1);
            assert_eq!(msgs[0]["toId"], 2);
            assert_eq!(msgs[0]["message"], "hello");
            assert_eq!(msgs[0]["timestamp"], 42);
        }

        let events = store.wait_for(1).await;
        assert_eq!(events[0], HistoryEvent::chat(1, 2, "hello".to_string(), 42));
    }

    #[tokio::test]
    async fn offline_recipient_still_persists_and_echoes() {
        let store = Arc::new(RecordingStore::default());
        let (registry, relay) = relay(store.clone());
        let (_a, mut rx_a) = connect(&registry, 1);

        relay.on_chat(1, 2, "are you there".to_string());

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(store.wait_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn failing_store_does_not_block_delivery() {
        let store = Arc::new(RecordingStore::failing());
        let (registry, relay) = relay(store);
        let (_b, mut rx_b) = connect(&registry, 2);

        relay.on_chat(1, 2, "hi".to_string());

        assert_eq!(drain(&mut rx_b).len(), 1);
    }
}
