// Registry of live connections keyed by user id.

use crate::domain::UserId;

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Notify, mpsc};

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressError {
    Closed,
    Full,
}

struct HandleInner {
    token: u64,
    egress_tx: mpsc::Sender<Utf8Bytes>,
    closed: AtomicBool,
    close_signal: Notify,
}

/// Cheap, cloneable reference to one live connection.
///
/// Frames pushed through the handle land on a bounded per-connection queue
/// drained by the socket task, so sending never waits on network I/O.
/// Two handles are equal only when they refer to the same connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("token", &self.inner.token)
            .field("open", &self.is_open())
            .finish()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.token == other.inner.token
    }
}

impl Eq for ConnectionHandle {}

impl ConnectionHandle {
    /// Creates a handle plus the receiving end of its egress queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (egress_tx, egress_rx) = mpsc::channel(capacity);
        let handle = Self {
            inner: Arc::new(HandleInner {
                token: next_token(),
                egress_tx,
                closed: AtomicBool::new(false),
                close_signal: Notify::new(),
            }),
        };
        (handle, egress_rx)
    }

    pub fn token(&self) -> u64 {
        self.inner.token
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire) && !self.inner.egress_tx.is_closed()
    }

    pub fn try_send(&self, frame: Utf8Bytes) -> Result<(), EgressError> {
        if !self.is_open() {
            return Err(EgressError::Closed);
        }
        self.inner.egress_tx.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => EgressError::Full,
            mpsc::error::TrySendError::Closed(_) => EgressError::Closed,
        })
    }

    /// Marks the connection closed and wakes its socket task.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            // notify_one keeps a permit if the socket task is not waiting yet.
            self.inner.close_signal.notify_one();
        }
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        self.inner.close_signal.notified().await;
    }
}

// Process-unique connection token; seeded from the clock so restarts do not reuse tokens.
fn next_token() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        AtomicU64::new(seed)
    });
    counter.fetch_add(1, Ordering::Relaxed)
}

/// Thread-safe map of user id to its current connection.
///
/// Backed by a sharded map, so operations on different ids rarely contend
/// and there is no registry-wide lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<UserId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handle` for `user_id` and returns the handle it superseded, if any.
    ///
    /// The superseded handle is left open; closing it is the caller's decision.
    pub fn upsert(&self, user_id: UserId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(user_id, handle)
    }

    /// Removes the entry only if it is still `handle`; returns whether it did.
    pub fn remove(&self, user_id: UserId, handle: &ConnectionHandle) -> bool {
        self.connections
            .remove_if(&user_id, |_, current| current == handle)
            .is_some()
    }

    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionHandle> {
        self.connections
            .get(&user_id)
            .map(|entry| entry.value().clone())
    }

    pub fn is_open(&self, handle: &ConnectionHandle) -> bool {
        handle.is_open()
    }

    /// Registered with an open connection.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.lookup(user_id).is_some_and(|handle| handle.is_open())
    }

    /// Copy of the current entries; no shard stays locked after this returns.
    pub fn handles(&self) -> Vec<(UserId, ConnectionHandle)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
