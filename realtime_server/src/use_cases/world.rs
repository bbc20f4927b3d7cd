// World-sync snapshots and the fixed-tick batch broadcaster.

use crate::domain::{Participant, UserId, WorldSnapshot, WorldUpdate};
use crate::use_cases::router::MessageRouter;
use crate::use_cases::types::Outbound;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Per-user world snapshots, batched and broadcast once per tick.
///
/// Updates write a single entry under that entry's shard lock. A tick copies
/// populated entries one at a time, so an update racing the copy simply shows
/// up on the next tick.
pub struct WorldBroadcaster {
    router: Arc<MessageRouter>,
    snapshots: DashMap<UserId, WorldSnapshot>,
}

impl WorldBroadcaster {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self {
            router,
            snapshots: DashMap::new(),
        }
    }

    /// Starts the user with an empty snapshot, replacing any previous one.
    pub fn on_connect(&self, user_id: UserId) {
        self.snapshots.insert(user_id, WorldSnapshot::default());
    }

    /// Last write wins. Returns false if the user has no snapshot (not connected).
    pub fn on_update(&self, user_id: UserId, update: WorldUpdate) -> bool {
        match self.snapshots.get_mut(&user_id) {
            Some(mut snapshot) => {
                snapshot.apply(update);
                true
            }
            None => {
                debug!(user_id, "world update for unknown participant dropped");
                false
            }
        }
    }

    /// Populated snapshots at the moment of the call, ordered by user id.
    pub fn participants(&self) -> Vec<Participant> {
        let mut participants: Vec<Participant> = self
            .snapshots
            .iter()
            .filter_map(|entry| entry.value().participant(*entry.key()))
            .collect();
        participants.sort_by_key(|participant| participant.id);
        participants
    }

    /// Broadcasts one batch to every open connection; returns the recipient count.
    pub fn tick(&self) -> usize {
        if self.router.registry().is_empty() {
            return 0;
        }
        let participants = self.participants();
        self.router.broadcast(Outbound::WorldBatch { participants })
    }

    /// Drops the snapshot and announces the removal once. A second call is a no-op,
    /// as is a call after the user has already reconnected.
    pub fn on_disconnect(&self, user_id: UserId) -> bool {
        let registry = self.router.registry();
        if self
            .snapshots
            .remove_if(&user_id, |_, _| !registry.is_online(user_id))
            .is_none()
        {
            return false;
        }
        self.router
            .broadcast(Outbound::ParticipantRemoved { user_id });
        info!(user_id, "participant removed from world");
        true
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Drives [`WorldBroadcaster::tick`] at a fixed interval until `shutdown` fires.
///
/// Ticks run inline in this task, so they never overlap; a slow tick delays
/// the next one instead of bursting to catch up.
pub async fn run_world_ticker(
    world: Arc<WorldBroadcaster>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        tick_interval_ms = tick_interval.as_millis() as u64,
        "world ticker started"
    );

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {
                world.tick();
            }
        }
    }

    info!("world ticker stopped");
}
