// Call-signaling state machine: per-user call state and its transition rules.

use crate::domain::history::duration_secs;
use crate::domain::{CallRole, CallState, Clock, HistoryEvent, UserId};
use crate::use_cases::history::HistoryRecorder;
use crate::use_cases::registry::ConnectionRegistry;
use crate::use_cases::router::MessageRouter;
use crate::use_cases::types::{Outbound, RejectReason};

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

type StateSlot = Arc<Mutex<CallState>>;
type StateGuard = OwnedMutexGuard<CallState>;

/// Owns every user's [`CallState`] and applies signaling events to it.
///
/// Each user id has its own async mutex, so one user's transitions are
/// serialized without blocking anyone else. Transitions that touch two users
/// take both locks in ascending id order. No lock is ever held across socket
/// I/O: outbound frames only go onto per-connection queues.
///
/// Protocol violations (self-addressed events, acting outside one's role)
/// are logged and dropped without a state change or a reply.
pub struct CallSignaling {
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
    history: HistoryRecorder,
    clock: Arc<dyn Clock>,
    states: DashMap<UserId, StateSlot>,
}

impl CallSignaling {
    pub fn new(router: Arc<MessageRouter>, history: HistoryRecorder, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Arc::clone(router.registry()),
            router,
            history,
            clock,
            states: DashMap::new(),
        }
    }

    pub fn on_connect(&self, user_id: UserId) {
        // Keeps an existing slot so a reconnect mid-call keeps its call.
        self.own_slot(user_id);
    }

    /// Current state for a user; unknown users are idle.
    pub async fn state_of(&self, user_id: UserId) -> CallState {
        match self.existing_slot(user_id) {
            Some(slot) => *slot.lock().await,
            None => CallState::Idle,
        }
    }

    pub async fn invite(&self, user_id: UserId, to_id: UserId) {
        if user_id == to_id {
            warn!(user_id, "self-addressed invite dropped");
            return;
        }

        let (mut caller, callee) = self.lock_pair(user_id, to_id).await;
        if caller.is_busy() {
            warn!(user_id, to_id, "invite while already in a call dropped");
            return;
        }

        let now = self.clock.now_epoch_millis();
        if !self.registry.is_online(to_id) {
            info!(user_id, to_id, "invite target offline");
            self.router.send_to(
                user_id,
                Outbound::CallReject {
                    from_id: to_id,
                    to_id: user_id,
                    reason: RejectReason::Offline,
                },
            );
            self.history
                .record(HistoryEvent::callee_offline(user_id, to_id, now));
            return;
        }

        if callee.is_busy() {
            info!(user_id, to_id, "invite target busy");
            self.router.send_to(
                user_id,
                Outbound::CallReject {
                    from_id: to_id,
                    to_id: user_id,
                    reason: RejectReason::Busy,
                },
            );
            self.history
                .record(HistoryEvent::callee_busy(user_id, to_id, now));
            return;
        }

        *caller = CallState::start(CallRole::Initiator, to_id, now);
        self.router.send_to(
            to_id,
            Outbound::CallInvite {
                from_id: user_id,
                to_id,
            },
        );
        info!(user_id, to_id, "call invite sent");
    }

    pub async fn accept(&self, user_id: UserId, to_id: UserId) {
        if user_id == to_id {
            warn!(user_id, "self-addressed accept dropped");
            return;
        }

        let (mut receiver, caller) = self.lock_pair(user_id, to_id).await;
        if !caller.is_initiator_of(user_id) {
            warn!(user_id, to_id, "accept without a pending invite dropped");
            return;
        }
        if receiver.is_busy() {
            warn!(user_id, to_id, "accept while already in a call dropped");
            return;
        }

        *receiver = CallState::start(CallRole::Receiver, to_id, self.clock.now_epoch_millis());
        self.router.send_to(
            to_id,
            Outbound::CallAccept {
                from_id: user_id,
                to_id,
            },
        );
        info!(user_id, to_id, "call accepted");
    }

    pub async fn reject(&self, user_id: UserId, to_id: UserId) {
        if user_id == to_id {
            warn!(user_id, "self-addressed reject dropped");
            return;
        }

        let (mut rejecter, mut caller) = self.lock_pair(user_id, to_id).await;
        if rejecter.is_initiator_of(to_id) {
            warn!(user_id, to_id, "initiator rejecting own invite dropped");
            return;
        }

        self.router.send_to(
            to_id,
            Outbound::CallReject {
                from_id: user_id,
                to_id,
                reason: RejectReason::Reject,
            },
        );
        // Recorded against the caller.
        self.history.record(HistoryEvent::call_rejected(
            to_id,
            user_id,
            self.clock.now_epoch_millis(),
        ));

        if caller.is_initiator_of(user_id) {
            caller.reset();
        }
        if rejecter.references(to_id) {
            rejecter.reset();
        }
        info!(user_id, to_id, "call rejected");
    }

    pub async fn end(&self, user_id: UserId, to_id: UserId) {
        if user_id == to_id {
            warn!(user_id, "self-addressed end dropped");
            return;
        }

        let (mut own, mut peer) = self.lock_pair(user_id, to_id).await;
        let Some(started_at) = own
            .active()
            .filter(|call| call.peer == to_id)
            .map(|call| call.started_at)
        else {
            warn!(user_id, to_id, "end without an active call dropped");
            return;
        };

        let now = self.clock.now_epoch_millis();
        self.router.send_to(
            to_id,
            Outbound::CallEnd {
                from_id: user_id,
                to_id,
            },
        );
        if peer.references(user_id) {
            peer.reset();
        }
        own.reset();

        // Whoever hangs up records the call.
        self.history
            .record(HistoryEvent::call_ended(user_id, to_id, started_at, now));
        info!(
            user_id,
            to_id,
            duration_secs = duration_secs(started_at, now),
            "call ended"
        );
    }

    pub async fn cancel(&self, user_id: UserId, to_id: UserId) {
        if user_id == to_id {
            warn!(user_id, "self-addressed cancel dropped");
            return;
        }

        let (mut own, peer) = self.lock_pair(user_id, to_id).await;
        if !own.is_initiator_of(to_id) {
            warn!(user_id, to_id, "cancel without a pending invite dropped");
            return;
        }
        if peer.is_receiver_of(user_id) {
            warn!(user_id, to_id, "cancel after accept dropped");
            return;
        }

        self.router.send_to(
            to_id,
            Outbound::CallCancel {
                from_id: user_id,
                to_id,
            },
        );
        own.reset();
        self.history.record(HistoryEvent::call_cancelled(
            user_id,
            to_id,
            self.clock.now_epoch_millis(),
        ));
        info!(user_id, to_id, "call invite cancelled");
    }

    /// Opaque relay of call negotiation data; never touches call state.
    pub fn processing(&self, user_id: UserId, to_id: UserId, forward_data: serde_json::Value) {
        if user_id == to_id {
            warn!(user_id, "self-addressed relay dropped");
            return;
        }
        self.router.send_to(
            to_id,
            Outbound::CallProcessing {
                from_id: user_id,
                to_id,
                forward_data,
            },
        );
    }

    /// Releases everyone still in a call or a pending invite with `user_id`.
    ///
    /// Runs after the registry entry is gone, so no new invite can reach the
    /// user while this scans. Safe to call repeatedly.
    pub async fn on_disconnect(&self, user_id: UserId) {
        let own_call = match self.existing_slot(user_id) {
            Some(slot) => {
                let mut own = slot.lock().await;
                let call = own.active().copied();
                own.reset();
                call
            }
            None => None,
        };

        // One lock at a time, so no ordering is needed here.
        let others: Vec<(UserId, StateSlot)> = self
            .states
            .iter()
            .filter(|entry| *entry.key() != user_id)
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        for (peer_id, slot) in others {
            let mut peer = slot.lock().await;
            if !peer.references(user_id) {
                continue;
            }
            let was_accepted = own_call
                .is_some_and(|call| call.peer == peer_id && call.role == CallRole::Receiver);
            let pending_invite = peer.is_initiator_of(user_id) && !was_accepted;
            peer.reset();
            drop(peer);

            let notice = if pending_invite {
                Outbound::CallReject {
                    from_id: user_id,
                    to_id: peer_id,
                    reason: RejectReason::Offline,
                }
            } else {
                Outbound::CallEnd {
                    from_id: user_id,
                    to_id: peer_id,
                }
            };
            self.router.send_to(peer_id, notice);
            info!(user_id, peer_id, "peer released after disconnect");
        }

        // A reconnect may already own the slot again.
        let removed = self
            .states
            .remove_if(&user_id, |_, _| !self.registry.is_online(user_id))
            .is_some();
        debug!(user_id, removed, "call state cleanup finished");
    }

    fn own_slot(&self, user_id: UserId) -> StateSlot {
        Arc::clone(self.states.entry(user_id).or_default().value())
    }

    fn existing_slot(&self, user_id: UserId) -> Option<StateSlot> {
        self.states.get(&user_id).map(|slot| Arc::clone(slot.value()))
    }

    // Locks the acting user's state and the peer's state in ascending id order.
    // A peer without a slot gets a detached idle one; writes to it are discarded.
    async fn lock_pair(&self, user_id: UserId, peer_id: UserId) -> (StateGuard, StateGuard) {
        debug_assert_ne!(user_id, peer_id);
        let own = self.own_slot(user_id);
        let peer = self.existing_slot(peer_id).unwrap_or_default();
        if user_id < peer_id {
            let own = own.lock_owned().await;
            let peer = peer.lock_owned().await;
            (own, peer)
        } else {
            let peer = peer.lock_owned().await;
            let own = own.lock_owned().await;
            (own, peer)
        }
    }
}
