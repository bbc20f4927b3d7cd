// Best-effort delivery of outbound messages over the connection registry.

use crate::domain::UserId;
use crate::interface_adapters::protocol::ServerMessage;
use crate::use_cases::registry::{ConnectionRegistry, EgressError};
use crate::use_cases::types::Outbound;

use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Send-to-one and broadcast on top of [`ConnectionRegistry`].
///
/// Delivery is at-most-once: unknown or closed recipients are skipped
/// silently and a full egress queue drops the frame.
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Serializes a message once so it can be fanned out as shared bytes.
    pub fn encode(&self, msg: Outbound) -> Option<Utf8Bytes> {
        match serde_json::to_string(&ServerMessage::from(msg)) {
            Ok(txt) => Some(Utf8Bytes::from(txt)),
            Err(e) => {
                error!(error = ?e, "failed to serialize outbound message");
                None
            }
        }
    }

    pub fn send_to(&self, user_id: UserId, msg: Outbound) -> bool {
        match self.encode(msg) {
            Some(frame) => self.send_frame(user_id, frame),
            None => false,
        }
    }

    /// Queues an already-encoded frame; returns whether it was queued.
    pub fn send_frame(&self, user_id: UserId, frame: Utf8Bytes) -> bool {
        let Some(handle) = self.registry.lookup(user_id) else {
            debug!(user_id, "recipient not connected; dropping message");
            return false;
        };
        match handle.try_send(frame) {
            Ok(()) => true,
            Err(EgressError::Closed) => {
                debug!(user_id, "recipient connection closed; dropping message");
                false
            }
            Err(EgressError::Full) => {
                warn!(user_id, "egress queue full; dropping message");
                false
            }
        }
    }

    pub fn broadcast(&self, msg: Outbound) -> usize {
        self.broadcast_where(msg, |_| true)
    }

    /// Sends to every open connection whose user id matches `predicate`.
    /// Returns how many recipients the frame was queued for.
    pub fn broadcast_where(&self, msg: Outbound, predicate: impl Fn(UserId) -> bool) -> usize {
        match self.encode(msg) {
            Some(frame) => self.broadcast_frame(frame, predicate),
            None => 0,
        }
    }

    pub fn broadcast_frame(&self, frame: Utf8Bytes, predicate: impl Fn(UserId) -> bool) -> usize {
        let mut delivered = 0;
        for (user_id, handle) in self.registry.handles() {
            if !handle.is_open() || !predicate(user_id) {
                continue;
            }
            match handle.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(EgressError::Full) => {
                    warn!(user_id, "egress queue full; skipping broadcast frame");
                }
                Err(EgressError::Closed) => {
                    debug!(user_id, "connection closed during broadcast");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::registry::ConnectionHandle;
    use crate::use_cases::test_support::{connect, drain};

    #[test]
    fn send_to_unknown_user_is_a_noop() {
        let router = MessageRouter::new(Arc::new(ConnectionRegistry::new()));
        let msg = Outbound::CallEnd {
            from_id: 1,
            to_id: 2,
        };
        assert!(!router.send_to(2, msg));
    }

    #[test]
    fn send_to_closed_handle_never_queues() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(Arc::clone(&registry));
        let (handle, mut rx) = ConnectionHandle::new(8);
        registry.upsert(2, handle.clone());
        handle.close();

        let msg = Outbound::CallEnd {
            from_id: 1,
            to_id: 2,
        };
        assert!(!router.send_to(2, msg));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn frames_to_one_recipient_keep_call_order() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(Arc::clone(&registry));
        let (_handle, mut rx) = connect(&registry, 5);

        for from_id in 1..=3 {
            router.send_to(5, Outbound::CallInvite { from_id, to_id: 5 });
        }

        let from_ids: Vec<u64> = drain(&mut rx)
            .iter()
            .map(|msg| msg["fromId"].as_u64().expect("fromId"))
            .collect();
        assert_eq!(from_ids, vec![1, 2, 3]);
    }

    #[test]
    fn broadcast_skips_full_and_filtered_recipients() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(Arc::clone(&registry));
        let (_a, mut rx_a) = connect(&registry, 1);
        let (_b, mut rx_b) = connect(&registry, 2);
        let (full, _rx_full) = ConnectionHandle::new(1);
        full.try_send(Utf8Bytes::from("{}")).expect("prefill");
        registry.upsert(3, full);

        let delivered = router.broadcast(Outbound::ParticipantRemoved { user_id: 9 });
        assert_eq!(delivered, 2);
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);

        let delivered =
            router.broadcast_where(Outbound::ParticipantRemoved { user_id: 9 }, |id| id != 1);
        assert_eq!(delivered, 1);
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn world_batch_is_encoded_once_for_all_recipients() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(Arc::clone(&registry));
        let (_a, mut rx_a) = connect(&registry, 1);
        let (_b, mut rx_b) = connect(&registry, 2);

        let participants = vec![crate::domain::Participant {
            id: 1,
            model: "m".to_string(),
            colour: "c".to_string(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            heading: 0.0,
            pitch: 0.0,
            action: "Idle".to_string(),
        }];
        assert_eq!(router.broadcast(Outbound::WorldBatch { participants }), 2);

        let frame_a = rx_a.try_recv().expect("frame for 1");
        let frame_b = rx_b.try_recv().expect("frame for 2");
        assert_eq!(frame_a.as_str(), frame_b.as_str());
        assert!(frame_a.as_str().contains(r#""type":"remoteData""#));
    }
}
