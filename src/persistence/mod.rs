//! Persistence layer: the client interaction (analytics) log.
//!
//! Decoded client → server interaction frames end up in an
//! [`InteractionLog`]. Recording is best-effort: callers log failures and
//! keep the connection open.

pub mod models;
pub mod postgres;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::{DateTime, Utc};

use self::models::{NewInteraction, StoredInteraction};
use self::postgres::PostgresInteractionStore;
use crate::config::ServerConfig;
use crate::domain::{Identity, InteractionFrame};
use crate::error::RealtimeError;

/// Where interactions are recorded.
#[derive(Debug)]
pub enum InteractionLog {
    /// Interactions are decoded and then discarded.
    Disabled,
    /// Bounded in-process buffer, oldest rows evicted first.
    Memory(MemoryInteractionLog),
    /// PostgreSQL `interactions` table.
    Postgres(PostgresInteractionStore),
}

impl InteractionLog {
    /// Builds the log selected by `config`.
    ///
    /// With analytics enabled this connects to PostgreSQL, creates the
    /// schema and applies the retention purge. Otherwise it falls back to
    /// the in-memory buffer, or [`InteractionLog::Disabled`] when its
    /// capacity is zero.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] if the database is
    /// unreachable or the schema cannot be created.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, RealtimeError> {
        if !config.analytics_enabled {
            if config.analytics_memory_capacity == 0 {
                return Ok(Self::Disabled);
            }
            return Ok(Self::Memory(MemoryInteractionLog::new(
                config.analytics_memory_capacity,
            )));
        }

        let store = PostgresInteractionStore::connect(config).await?;
        store.ensure_schema().await?;
        if config.analytics_retention_days > 0 {
            let purged = store
                .purge_older_than(config.analytics_retention_days)
                .await?;
            tracing::info!(
                purged,
                retention_days = config.analytics_retention_days,
                "purged expired interactions"
            );
        }
        Ok(Self::Postgres(store))
    }

    /// In-memory log holding at most `capacity` rows.
    #[must_use]
    pub fn memory(capacity: usize) -> Self {
        Self::Memory(MemoryInteractionLog::new(capacity))
    }

    /// Records one frame received from `identity`.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] if the backend rejects
    /// the write.
    pub async fn record(
        &self,
        identity: &Identity,
        frame: InteractionFrame,
    ) -> Result<(), RealtimeError> {
        let row = NewInteraction::from_frame(identity, frame);
        match self {
            Self::Disabled => Ok(()),
            Self::Memory(log) => {
                log.push(row);
                Ok(())
            }
            Self::Postgres(store) => store.save_interaction(&row).await.map(|_| ()),
        }
    }

    /// Up to `limit` interactions received after `after` (or from the
    /// oldest retained one), oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] on backend failure.
    pub async fn recent(
        &self,
        after: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<StoredInteraction>, RealtimeError> {
        match self {
            Self::Disabled => Ok(Vec::new()),
            Self::Memory(log) => Ok(log.after(after, limit)),
            Self::Postgres(store) => {
                store
                    .load_after(after.unwrap_or(DateTime::<Utc>::MIN_UTC), limit)
                    .await
            }
        }
    }

    /// Short name of the backend, for logs.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }
}

/// Ring buffer of interactions.
#[derive(Debug)]
pub struct MemoryInteractionLog {
    capacity: usize,
    rows: Mutex<MemoryRows>,
}

#[derive(Debug, Default)]
struct MemoryRows {
    next_id: i64,
    rows: VecDeque<StoredInteraction>,
}

impl MemoryInteractionLog {
    /// Creates a buffer of `capacity` rows.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rows: Mutex::new(MemoryRows::default()),
        }
    }

    fn push(&self, row: NewInteraction) {
        let mut state = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_id += 1;
        let stored = row.into_stored(state.next_id);
        state.rows.push_back(stored);
        while state.rows.len() > self.capacity {
            state.rows.pop_front();
        }
    }

    fn after(&self, after: Option<DateTime<Utc>>, limit: usize) -> Vec<StoredInteraction> {
        let state = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .rows
            .iter()
            .filter(|r| after.is_none_or(|t| r.received_at > t))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of retained rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .len()
    }

    /// Returns `true` if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{ClientType, InteractionKind, UserId};

    fn frame(n: u32) -> InteractionFrame {
        InteractionFrame::new(
            InteractionKind::ProductView,
            json!({"productId": format!("P{n}")}),
            Some("U1".to_string()),
        )
    }

    #[tokio::test]
    async fn memory_log_evicts_oldest() {
        let log = InteractionLog::memory(2);
        let who = Identity::new(ClientType::Client, Some(UserId::from("U1")));
        for n in 1..=3 {
            assert!(log.record(&who, frame(n)).await.is_ok());
        }

        let Ok(rows) = log.recent(None, 10).await else {
            panic!("recent failed");
        };
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        let Some(last) = rows.last() else {
            panic!("no rows");
        };
        assert_eq!(last.event_type, "product:view");
        assert_eq!(last.user_id.as_deref(), Some("U1"));
        assert_eq!(last.session_id, who.session_id.as_uuid());
        assert_eq!(last.payload, json!({"productId": "P3"}));
    }

    #[tokio::test]
    async fn memory_log_filters_and_limits() {
        let log = InteractionLog::memory(10);
        let who = Identity::new(ClientType::Client, None);
        assert!(log.record(&who, frame(1)).await.is_ok());
        let Ok(first) = log.recent(None, 1).await else {
            panic!("recent failed");
        };
        let Some(cutoff) = first.first().map(|r| r.received_at) else {
            panic!("no rows");
        };
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(log.record(&who, frame(2)).await.is_ok());
        assert!(log.record(&who, frame(3)).await.is_ok());

        let Ok(later) = log.recent(Some(cutoff), 1).await else {
            panic!("recent failed");
        };
        assert_eq!(later.len(), 1);
        assert_eq!(later.first().map(|r| r.id), Some(2));
    }

    #[tokio::test]
    async fn disabled_log_keeps_nothing() {
        let log = InteractionLog::Disabled;
        let who = Identity::new(ClientType::Admin, Some(UserId::from("A1")));
        assert!(log.record(&who, frame(1)).await.is_ok());
        assert!(log.recent(None, 10).await.is_ok_and(|r| r.is_empty()));
        assert_eq!(log.backend(), "disabled");
    }
}
