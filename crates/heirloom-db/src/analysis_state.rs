//! Analysis state repository: one status row per item.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heirloom_core::{AnalysisState, AnalysisStatus, AppError};
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persisted analysis status, keyed by item
#[async_trait]
pub trait AnalysisStateRepository: Send + Sync {
    async fn get(&self, item_id: Uuid) -> Result<Option<AnalysisState>, AppError>;

    /// Insert or overwrite the item's row.
    async fn save(&self, state: &AnalysisState) -> Result<(), AppError>;

    /// Insert `state` unless the item already has a row; return whichever row is stored.
    async fn insert_if_absent(&self, state: &AnalysisState) -> Result<AnalysisState, AppError>;

    /// Items left in `processing` with no update since `older_than`, oldest first.
    async fn list_stale(&self, older_than: DateTime<Utc>) -> Result<Vec<AnalysisState>, AppError>;
}

#[derive(Clone)]
pub struct PostgresAnalysisStateRepository {
    pool: PgPool,
}

impl PostgresAnalysisStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStateRepository for PostgresAnalysisStateRepository {
    #[tracing::instrument(skip(self), fields(db.table = "analysis_states"))]
    async fn get(&self, item_id: Uuid) -> Result<Option<AnalysisState>, AppError> {
        let state = sqlx::query_as::<Postgres, AnalysisState>(
            r#"
            SELECT item_id, status, error, updated_at
            FROM analysis_states
            WHERE item_id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    #[tracing::instrument(skip(self, state), fields(db.table = "analysis_states", item_id = %state.item_id, status = %state.status))]
    async fn save(&self, state: &AnalysisState) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO analysis_states (item_id, status, error, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id) DO UPDATE
            SET status = EXCLUDED.status,
                error = EXCLUDED.error,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(state.item_id)
        .bind(state.status.to_string())
        .bind(state.last_error.as_deref())
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, state), fields(db.table = "analysis_states", item_id = %state.item_id))]
    async fn insert_if_absent(&self, state: &AnalysisState) -> Result<AnalysisState, AppError> {
        sqlx::query(
            r#"
            INSERT INTO analysis_states (item_id, status, error, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id) DO NOTHING
            "#,
        )
        .bind(state.item_id)
        .bind(state.status.to_string())
        .bind(state.last_error.as_deref())
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;

        self.get(state.item_id).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "analysis state for {} vanished after insert",
                state.item_id
            ))
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "analysis_states"))]
    async fn list_stale(&self, older_than: DateTime<Utc>) -> Result<Vec<AnalysisState>, AppError> {
        let rows = sqlx::query_as::<Postgres, AnalysisState>(
            r#"
            SELECT item_id, status, error, updated_at
            FROM analysis_states
            WHERE status = $1 AND updated_at < $2
            ORDER BY updated_at ASC
            "#,
        )
        .bind(AnalysisStatus::Processing.to_string())
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Process-local repository. State is lost on exit.
#[derive(Default)]
pub struct InMemoryAnalysisStateRepository {
    states: RwLock<HashMap<Uuid, AnalysisState>>,
}

impl InMemoryAnalysisStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalysisStateRepository for InMemoryAnalysisStateRepository {
    async fn get(&self, item_id: Uuid) -> Result<Option<AnalysisState>, AppError> {
        Ok(self.states.read().await.get(&item_id).cloned())
    }

    async fn save(&self, state: &AnalysisState) -> Result<(), AppError> {
        self.states
            .write()
            .await
            .insert(state.item_id, state.clone());
        Ok(())
    }

    async fn insert_if_absent(&self, state: &AnalysisState) -> Result<AnalysisState, AppError> {
        let mut states = self.states.write().await;
        Ok(states
            .entry(state.item_id)
            .or_insert_with(|| state.clone())
            .clone())
    }

    async fn list_stale(&self, older_than: DateTime<Utc>) -> Result<Vec<AnalysisState>, AppError> {
        let mut stale: Vec<AnalysisState> = self
            .states
            .read()
            .await
            .values()
            .filter(|s| s.status == AnalysisStatus::Processing && s.updated_at < older_than)
            .cloned()
            .collect();
        stale.sort_by_key(|s| s.updated_at);
        Ok(stale)
    }
}
