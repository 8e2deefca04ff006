//! PostgreSQL event journal

use super::journal::EventJournal;
use crate::config::DatabaseConfig;
use crate::error::{PoolError, PoolResult};
use crate::events::ProtocolEvent;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};

/// State manager for PostgreSQL persistence
pub struct StateManager {
    pool: PgPool,
}

impl StateManager {
    /// Create a new state manager
    pub async fn new(config: &DatabaseConfig) -> PoolResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> PoolResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS protocol_events (
                id BIGSERIAL PRIMARY KEY,
                chain_id BIGINT NOT NULL,
                event_type VARCHAR(50) NOT NULL,
                event_data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_events_chain_type
            ON protocol_events (chain_id, event_type)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cross_chain_messages (
                message_id BYTEA PRIMARY KEY,
                source_chain BIGINT NOT NULL,
                dest_chain BIGINT NOT NULL,
                nonce BIGINT NOT NULL,
                sent_at BIGINT NOT NULL,
                kind VARCHAR(20) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                resolved_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> PoolResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn store_event(&self, event: &ProtocolEvent) -> PoolResult<()> {
        let event_data =
            serde_json::to_value(event).map_err(|e| PoolError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO protocol_events (chain_id, event_type, event_data)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(to_db_int("chain_id", event.chain_id())?)
        .bind(event.name())
        .bind(event_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn track_message(&self, event: &ProtocolEvent) -> PoolResult<()> {
        match event {
            ProtocolEvent::MessageSent {
                chain_id,
                message_id,
                dest_chain,
                nonce,
                timestamp,
                kind,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO cross_chain_messages
                        (message_id, source_chain, dest_chain, nonce, sent_at, kind)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (message_id) DO NOTHING
                    "#,
                )
                .bind(message_id.as_slice())
                .bind(to_db_int("chain_id", *chain_id)?)
                .bind(to_db_int("dest_chain", *dest_chain)?)
                .bind(to_db_int("nonce", *nonce)?)
                .bind(to_db_int("timestamp", *timestamp)?)
                .bind(kind.as_str())
                .execute(&self.pool)
                .await?;
            }
            ProtocolEvent::MessageResolved {
                message_id, status, ..
            } => {
                sqlx::query(
                    r#"
                    UPDATE cross_chain_messages
                    SET status = $1, resolved_at = $2
                    WHERE message_id = $3
                    "#,
                )
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(message_id.as_slice())
                .execute(&self.pool)
                .await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Get message statistics
    pub async fn get_stats(&self) -> PoolResult<MessageStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'confirmed') as confirmed,
                COUNT(*) FILTER (WHERE status = 'failed') as failed
            FROM cross_chain_messages
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MessageStats {
            pending: row.get::<i64, _>("pending") as u64,
            confirmed: row.get::<i64, _>("confirmed") as u64,
            failed: row.get::<i64, _>("failed") as u64,
        })
    }
}

#[async_trait]
impl EventJournal for StateManager {
    async fn record(&self, event: &ProtocolEvent) -> PoolResult<()> {
        self.store_event(event).await?;
        self.track_message(event).await?;
        debug!("Journaled {} on chain {}", event.name(), event.chain_id());
        Ok(())
    }
}

/// Postgres BIGINT is signed; values above `i64::MAX` are refused
fn to_db_int(column: &str, value: u64) -> PoolResult<i64> {
    i64::try_from(value)
        .map_err(|_| PoolError::Internal(format!("{} {} exceeds BIGINT range", column, value)))
}

/// Message statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MessageStats {
    pub pending: u64,
    pub confirmed: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_int_range() {
        assert_eq!(to_db_int("nonce", 7).unwrap(), 7);
        assert_eq!(to_db_int("nonce", i64::MAX as u64).unwrap(), i64::MAX);
        assert!(matches!(
            to_db_int("chain_id", u64::MAX),
            Err(PoolError::Internal(_))
        ));
    }
}
