//! Session store backends (Postgres, in-memory)

use crate::{
    auth::session::{SessionCodec, SessionPayload, SessionRecord, SessionStore},
    error::AppError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;

/// Sessions in the `http_sessions` table
pub struct PgSessionStore {
    db: PgPool,
    codec: Arc<dyn SessionCodec>,
}

impl PgSessionStore {
    pub fn new(db: PgPool, codec: Arc<dyn SessionCodec>) -> Self {
        Self { db, codec }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id_hash: &str) -> Result<Option<SessionRecord>, AppError> {
        let row: Option<(Vec<u8>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT data, expires_at FROM http_sessions WHERE id_hash = $1",
        )
        .bind(id_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Session(e.to_string()))?;

        let Some((data, expires_at)) = row else {
            return Ok(None);
        };

        match self.codec.decode(&data) {
            Ok(payload) => Ok(Some(SessionRecord {
                payload,
                expires_at,
            })),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable session record");
                self.destroy(id_hash).await?;
                Ok(None)
            }
        }
    }

    async fn save(
        &self,
        id_hash: &str,
        payload: &SessionPayload,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let data = self.codec.encode(payload)?;
        sqlx::query(
            r#"
            INSERT INTO http_sessions (id_hash, account_id, data, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id_hash) DO UPDATE
            SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(id_hash)
        .bind(payload.account_id)
        .bind(data)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Session(e.to_string()))?;

        Ok(())
    }

    async fn destroy(&self, id_hash: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM http_sessions WHERE id_hash = $1")
            .bind(id_hash)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM http_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Process-local sessions, for single-instance deployments and tests
pub struct MemorySessionStore {
    entries: DashMap<String, (Vec<u8>, DateTime<Utc>)>,
    codec: Arc<dyn SessionCodec>,
}

impl MemorySessionStore {
    pub fn new(codec: Arc<dyn SessionCodec>) -> Self {
        Self {
            entries: DashMap::new(),
            codec,
        }
    }

    pub fn contains(&self, id_hash: &str) -> bool {
        self.entries.contains_key(id_hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id_hash: &str) -> Result<Option<SessionRecord>, AppError> {
        let Some((data, expires_at)) = self.entries.get(id_hash).map(|e| e.value().clone()) else {
            return Ok(None);
        };

        match self.codec.decode(&data) {
            Ok(payload) => Ok(Some(SessionRecord {
                payload,
                expires_at,
            })),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable session record");
                self.entries.remove(id_hash);
                Ok(None)
            }
        }
    }

    async fn save(
        &self,
        id_hash: &str,
        payload: &SessionPayload,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let data = self.codec.encode(payload)?;
        self.entries.insert(id_hash.to_string(), (data, expires_at));
        Ok(())
    }

    async fn destroy(&self, id_hash: &str) -> Result<(), AppError> {
        self.entries.remove(id_hash);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut purged = 0;
        self.entries.retain(|_, (_, expires_at)| {
            let live = *expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });
        Ok(purged)
    }
}
