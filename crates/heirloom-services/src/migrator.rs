//! Storage migration: move an upload from the temp namespace to its
//! owner- and item-scoped permanent location.
//!
//! Backends have no atomic rename across prefixes, so a move is a copy
//! followed by a best-effort delete. Success means the destination holds a
//! retrievable copy; a source left behind by a failed delete is reported in
//! the outcome and reclaimed by the temp-namespace sweep.

use heirloom_core::{AppError, ErrorMetadata, LogLevel, Namespace, StorageObject};
use heirloom_db::MigrationClaimRepository;
use heirloom_storage::{KeyLayout, Storage, StorageError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::authorization::{KeyOwnerAuthorizer, OwnerAuthorizer};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Invalid storage reference: {0}")]
    InvalidReference(String),

    #[error("Owner {owner_id} may not migrate {url}")]
    Unauthorized { owner_id: Uuid, url: String },

    #[error("Migration of {0} is already in progress")]
    InProgress(String),

    #[error("Copy of {key} failed: {source}")]
    CopyFailed {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<StorageError> for MigrationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidReference(msg) | StorageError::InvalidKey(msg) => {
                MigrationError::InvalidReference(msg)
            }
            other => MigrationError::Storage(other),
        }
    }
}

impl ErrorMetadata for MigrationError {
    fn error_code(&self) -> &'static str {
        match self {
            MigrationError::InvalidReference(_) => "INVALID_REFERENCE",
            MigrationError::Unauthorized { .. } => "UNAUTHORIZED",
            MigrationError::InProgress(_) => "MIGRATION_IN_PROGRESS",
            MigrationError::CopyFailed { .. } => "COPY_FAILED",
            MigrationError::Storage(_) => "STORAGE_ERROR",
            MigrationError::Repository(e) => e.error_code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            MigrationError::InvalidReference(_) | MigrationError::Unauthorized { .. } => false,
            MigrationError::InProgress(_)
            | MigrationError::CopyFailed { .. }
            | MigrationError::Storage(_) => true,
            MigrationError::Repository(e) => e.is_recoverable(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            MigrationError::InvalidReference(_) | MigrationError::Unauthorized { .. } => {
                LogLevel::Debug
            }
            MigrationError::InProgress(_) => LogLevel::Warn,
            MigrationError::CopyFailed { .. } | MigrationError::Storage(_) => LogLevel::Error,
            MigrationError::Repository(e) => e.log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Copied into the permanent namespace by this call.
    Moved,
    /// The URL was already permanent; returned unchanged.
    AlreadyPermanent,
    /// An earlier call already moved the object; the source is gone.
    AlreadyMigrated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub url: String,
    pub status: MigrationStatus,
    /// Temp key whose delete failed after a successful copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leftover_source: Option<String>,
}

impl MigrationOutcome {
    fn unchanged(url: String, status: MigrationStatus) -> Self {
        Self {
            url,
            status,
            leftover_source: None,
        }
    }
}

pub struct StorageMigrator {
    storage: Arc<dyn Storage>,
    layout: KeyLayout,
    claims: Arc<dyn MigrationClaimRepository>,
    authorizer: Arc<dyn OwnerAuthorizer>,
    claim_ttl: Duration,
}

impl StorageMigrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        layout: KeyLayout,
        claims: Arc<dyn MigrationClaimRepository>,
        claim_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            layout,
            claims,
            authorizer: Arc::new(KeyOwnerAuthorizer),
            claim_ttl,
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn OwnerAuthorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Move the object behind `object_url` to `{owner_id}/{item_id}/{filename}`
    /// and return its permanent public URL.
    ///
    /// Permanent URLs come back unchanged. While the temp object exists it is
    /// copied over the destination, so a re-upload under the same name replaces
    /// the earlier copy. A copy failure leaves the source untouched and never
    /// triggers a delete.
    #[tracing::instrument(skip(self))]
    pub async fn migrate(
        &self,
        object_url: &str,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> Result<MigrationOutcome, MigrationError> {
        let object = self.validate(object_url, owner_id).await?;

        if object.namespace == Namespace::Permanent {
            if object.item_id != Some(item_id) {
                tracing::debug!(
                    url = %object_url,
                    bound_item = ?object.item_id,
                    "Object already bound to another item; returning unchanged"
                );
            }
            return Ok(MigrationOutcome::unchanged(
                object_url.to_string(),
                MigrationStatus::AlreadyPermanent,
            ));
        }

        let source_key = object.path.clone();
        let Some(token) = self.claims.try_claim(&source_key, self.claim_ttl).await? else {
            tracing::warn!(key = %source_key, "Migration already in progress");
            return Err(MigrationError::InProgress(source_key));
        };

        let result = self.relocate(&object, owner_id, item_id).await;

        if let Err(e) = self.claims.release(&source_key, token).await {
            tracing::warn!(
                error = %e,
                key = %source_key,
                "Failed to release migration claim; it will expire on its own"
            );
        }

        result
    }

    /// Migrate every URL of an item's media list, preserving order.
    ///
    /// All URLs are validated before anything is copied, so a malformed or
    /// foreign URL anywhere in the list fails the call with no side effects.
    pub async fn migrate_all(
        &self,
        urls: &[String],
        owner_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<MigrationOutcome>, MigrationError> {
        for url in urls {
            self.validate(url, owner_id).await?;
        }

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            outcomes.push(self.migrate(url, owner_id, item_id).await?);
        }
        Ok(outcomes)
    }

    async fn validate(
        &self,
        object_url: &str,
        owner_id: Uuid,
    ) -> Result<StorageObject, MigrationError> {
        let object = self.layout.parse_url(object_url)?;

        if !self.authorizer.is_owner(&object, owner_id).await? {
            return Err(MigrationError::Unauthorized {
                owner_id,
                url: object_url.to_string(),
            });
        }

        Ok(object)
    }

    async fn relocate(
        &self,
        object: &StorageObject,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> Result<MigrationOutcome, MigrationError> {
        let source_key = object.path.as_str();
        let dest_key = self
            .layout
            .permanent_key(owner_id, item_id, object.filename());

        // A present source always wins: it may be a re-upload under the same name.
        if !self.storage.exists(source_key).await? && self.storage.exists(&dest_key).await? {
            tracing::info!(
                from_key = %source_key,
                to_key = %dest_key,
                "Source already moved; skipping copy"
            );
            return Ok(MigrationOutcome::unchanged(
                self.storage.public_url(&dest_key),
                MigrationStatus::AlreadyMigrated,
            ));
        }

        let start = std::time::Instant::now();

        self.storage
            .copy(source_key, &dest_key)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    from_key = %source_key,
                    to_key = %dest_key,
                    "Copy to permanent namespace failed; source left in place"
                );
                MigrationError::CopyFailed {
                    key: source_key.to_string(),
                    source: e,
                }
            })?;

        let url = self.storage.public_url(&dest_key);

        let leftover_source = match self.storage.remove(&[source_key.to_string()]).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    key = %source_key,
                    "Failed to delete migrated source; leaving it for the temp sweep"
                );
                Some(source_key.to_string())
            }
        };

        tracing::info!(
            from_key = %source_key,
            to_key = %dest_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object migrated to permanent namespace"
        );

        Ok(MigrationOutcome {
            url,
            status: MigrationStatus::Moved,
            leftover_source,
        })
    }
}
