//! Migration claims: a short-lived exclusive lease per temp object.
//!
//! A claim expires on its own, so a migrator that dies mid-copy never blocks
//! the object for longer than the TTL. Each claim carries a token; only the
//! holder of the current token can release it, so a migrator whose lease ran
//! out cannot drop the claim of the one that took over.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heirloom_core::AppError;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait MigrationClaimRepository: Send + Sync {
    /// Take the claim on `source_key` for `ttl`.
    ///
    /// Returns the claim token, or `None` while another unexpired claim holds the key.
    async fn try_claim(&self, source_key: &str, ttl: Duration) -> Result<Option<Uuid>, AppError>;

    /// Drop the claim if `token` still holds it. Otherwise a no-op.
    async fn release(&self, source_key: &str, token: Uuid) -> Result<(), AppError>;
}

fn expiry(ttl: Duration) -> Result<DateTime<Utc>, AppError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::InvalidInput(format!("claim TTL out of range: {}", e)))?;
    Ok(Utc::now() + ttl)
}

#[derive(Clone)]
pub struct PostgresMigrationClaimRepository {
    pool: PgPool,
}

impl PostgresMigrationClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationClaimRepository for PostgresMigrationClaimRepository {
    #[tracing::instrument(skip(self), fields(db.table = "migration_claims"))]
    async fn try_claim(&self, source_key: &str, ttl: Duration) -> Result<Option<Uuid>, AppError> {
        let expires_at = expiry(ttl)?;
        let token = Uuid::new_v4();
        // The upsert only takes over rows whose lease already ran out.
        let result = sqlx::query(
            r#"
            INSERT INTO migration_claims (source_key, token, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (source_key) DO UPDATE
            SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at
            WHERE migration_claims.expires_at < NOW()
            "#,
        )
        .bind(source_key)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "migration_claims"))]
    async fn release(&self, source_key: &str, token: Uuid) -> Result<(), AppError> {
        let result =
            sqlx::query("DELETE FROM migration_claims WHERE source_key = $1 AND token = $2")
                .bind(source_key)
                .bind(token)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            tracing::debug!("Claim already expired or taken over; nothing released");
        }
        Ok(())
    }
}

struct Lease {
    token: Uuid,
    expires_at: DateTime<Utc>,
}

/// Process-local claims. Only serializes migrations within one process.
#[derive(Default)]
pub struct InMemoryMigrationClaimRepository {
    claims: Mutex<HashMap<String, Lease>>,
}

impl InMemoryMigrationClaimRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationClaimRepository for InMemoryMigrationClaimRepository {
    async fn try_claim(&self, source_key: &str, ttl: Duration) -> Result<Option<Uuid>, AppError> {
        let expires_at = expiry(ttl)?;
        let now = Utc::now();
        let mut claims = self.claims.lock().await;
        match claims.get(source_key) {
            Some(lease) if lease.expires_at >= now => Ok(None),
            _ => {
                let token = Uuid::new_v4();
                claims.insert(source_key.to_string(), Lease { token, expires_at });
                Ok(Some(token))
            }
        }
    }

    async fn release(&self, source_key: &str, token: Uuid) -> Result<(), AppError> {
        let mut claims = self.claims.lock().await;
        if claims.get(source_key).is_some_and(|lease| lease.token == token) {
            claims.remove(source_key);
        }
        Ok(())
    }
}
