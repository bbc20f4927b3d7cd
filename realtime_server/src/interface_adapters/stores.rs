// History store adapters: in-process for development and tests, PostgreSQL for deployments.

use crate::domain::{HistoryEntry, HistoryEvent, HistoryKind, HistoryStore, StoreError, UserId};

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::Mutex;

// History kept in memory; lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    events: Arc<Mutex<Vec<HistoryEvent>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save(&self, event: HistoryEvent) -> Result<(), StoreError> {
        let mut events = self.events.lock().await;
        events.push(event);
        Ok(())
    }

    async fn query(
        &self,
        local_id: UserId,
        remote_id: UserId,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut matching: Vec<HistoryEvent> = {
            let events = self.events.lock().await;
            events
                .iter()
                .filter(|event| event.is_between(local_id, remote_id))
                .cloned()
                .collect()
        };
        // Stable sort keeps insertion order for equal timestamps.
        matching.sort_by_key(|event| event.timestamp);
        Ok(matching
            .into_iter()
            .map(|event| event.into_entry(local_id))
            .collect())
    }
}

// PostgreSQL-backed history store; schema lives in ./migrations.
#[derive(Clone)]
pub struct PostgresHistoryStore {
    pub db: PgPool,
}

impl PostgresHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn to_db_id(id: UserId) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::InvalidRecord(format!("id {id} out of range")))
}

fn from_db_u64(value: i64, field: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("negative {field}: {value}")))
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    async fn save(&self, event: HistoryEvent) -> Result<(), StoreError> {
        let time_stamp = i64::try_from(event.timestamp).map_err(|_| {
            StoreError::InvalidRecord(format!("timestamp {} out of range", event.timestamp))
        })?;

        sqlx::query(
            r#"
            INSERT INTO history_messages (local_id, remote_id, content, kind, time_stamp)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(to_db_id(event.local_id)?)
        .bind(to_db_id(event.remote_id)?)
        .bind(&event.content)
        .bind(event.kind.as_str())
        .bind(time_stamp)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn query(
        &self,
        local_id: UserId,
        remote_id: UserId,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT local_id, content, kind, time_stamp
            FROM history_messages
            WHERE (local_id = $1 AND remote_id = $2)
               OR (local_id = $2 AND remote_id = $1)
            ORDER BY time_stamp ASC, id ASC
            "#,
        )
        .bind(to_db_id(local_id)?)
        .bind(to_db_id(remote_id)?)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<HistoryEntry, StoreError> {
                let owner: i64 = row.try_get("local_id")?;
                let kind: String = row.try_get("kind")?;
                let time_stamp: i64 = row.try_get("time_stamp")?;
                Ok(HistoryEntry {
                    message: row.try_get("content")?,
                    timestamp: from_db_u64(time_stamp, "time_stamp")?,
                    is_self: from_db_u64(owner, "local_id")? == local_id,
                    kind: HistoryKind::parse(&kind)
                        .ok_or_else(|| StoreError::InvalidRecord(format!("unknown kind {kind}")))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_merges_both_directions_in_time_order() {
        let store = InMemoryHistoryStore::new();
        store
            .save(HistoryEvent::chat(2, 1, "second".to_string(), 200))
            .await
            .expect("save");
        store
            .save(HistoryEvent::chat(1, 2, "first".to_string(), 100))
            .await
            .expect("save");
        store
            .save(HistoryEvent::call_ended(1, 2, 1_000, 66_000))
            .await
            .expect("save");

        let entries = store.query(1, 2).await.expect("query");
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "Call duration: 00:01:05"]);
        assert!(entries[0].is_self);
        assert!(!entries[1].is_self);
        assert_eq!(entries[2].kind, HistoryKind::Video);

        let other_side = store.query(2, 1).await.expect("query");
        assert!(!other_side[0].is_self);
        assert!(other_side[1].is_self);
    }

    #[tokio::test]
    async fn query_excludes_unrelated_pairs() {
        let store = InMemoryHistoryStore::new();
        store
            .save(HistoryEvent::chat(1, 3, "elsewhere".to_string(), 10))
            .await
            .expect("save");
        store
            .save(HistoryEvent::callee_offline(3, 2, 20))
            .await
            .expect("save");

        assert!(store.query(1, 2).await.expect("query").is_empty());
    }

    #[test]
    fn ids_outside_bigint_range_are_rejected() {
        assert!(matches!(
            to_db_id(u64::MAX),
            Err(StoreError::InvalidRecord(_))
        ));
        assert_eq!(to_db_id(42).expect("in range"), 42);
        assert!(from_db_u64(-1, "local_id").is_err());
    }
}
