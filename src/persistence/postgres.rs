//! PostgreSQL interaction store.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{NewInteraction, StoredInteraction};
use crate::config::ServerConfig;
use crate::error::RealtimeError;

type InteractionRow = (
    i64,
    Uuid,
    Option<String>,
    Option<String>,
    String,
    serde_json::Value,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// PostgreSQL-backed interaction log using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresInteractionStore {
    pool: PgPool,
}

impl PostgresInteractionStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the database settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] if the pool cannot be
    /// created.
    pub async fn connect(config: &ServerConfig) -> Result<Self, RealtimeError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await
            .map_err(|e| RealtimeError::PersistenceError(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Creates the `interactions` table and its index if missing.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), RealtimeError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS interactions (\
                id BIGSERIAL PRIMARY KEY, \
                session_id UUID NOT NULL, \
                user_id TEXT, \
                claimed_user_id TEXT, \
                event_type TEXT NOT NULL, \
                payload JSONB NOT NULL, \
                sent_at TIMESTAMPTZ NOT NULL, \
                received_at TIMESTAMPTZ NOT NULL DEFAULT now())",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RealtimeError::PersistenceError(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS interactions_received_at_idx \
             ON interactions (received_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RealtimeError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    /// Appends an interaction.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] on database failure.
    pub async fn save_interaction(&self, row: &NewInteraction) -> Result<i64, RealtimeError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO interactions \
             (session_id, user_id, claimed_user_id, event_type, payload, sent_at, received_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(row.session_id)
        .bind(row.user_id.as_deref())
        .bind(row.frame.user_id.as_deref())
        .bind(row.frame.kind.as_str())
        .bind(&row.frame.payload)
        .bind(row.frame.sent_at)
        .bind(row.received_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RealtimeError::PersistenceError(e.to_string()))?;

        Ok(id)
    }

    /// Loads up to `limit` interactions received after `after`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] on database failure.
    pub async fn load_after(
        &self,
        after: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StoredInteraction>, RealtimeError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, InteractionRow>(
            "SELECT id, session_id, user_id, claimed_user_id, event_type, payload, sent_at, received_at \
             FROM interactions WHERE received_at > $1 ORDER BY received_at ASC, id ASC LIMIT $2",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RealtimeError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, session_id, user_id, claimed_user_id, event_type, payload, sent_at, received_at)| {
                    StoredInteraction {
                        id,
                        session_id,
                        user_id,
                        claimed_user_id,
                        event_type,
                        payload,
                        sent_at,
                        received_at,
                    }
                },
            )
            .collect())
    }

    /// Deletes interactions older than the given number of days.
    ///
    /// # Errors
    ///
    /// Returns a [`RealtimeError::PersistenceError`] on database failure.
    pub async fn purge_older_than(&self, days: u64) -> Result<u64, RealtimeError> {
        // chrono panics on day counts beyond its range.
        let days = i64::try_from(days).unwrap_or(i64::MAX).min(1_000_000);
        let cutoff = Utc::now() - chrono::Duration::days(days);

        let result = sqlx::query("DELETE FROM interactions WHERE received_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| RealtimeError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
