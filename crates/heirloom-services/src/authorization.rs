//! Owner authorization for stored objects.

use async_trait::async_trait;
use heirloom_core::{AppError, StorageObject};
use uuid::Uuid;

/// Decides whether `owner_id` may act on a stored object.
///
/// Session- or token-based checks live outside this crate and plug in here.
#[async_trait]
pub trait OwnerAuthorizer: Send + Sync {
    async fn is_owner(&self, object: &StorageObject, owner_id: Uuid) -> Result<bool, AppError>;
}

/// Trusts the owner segment of the object key.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyOwnerAuthorizer;

#[async_trait]
impl OwnerAuthorizer for KeyOwnerAuthorizer {
    async fn is_owner(&self, object: &StorageObject, owner_id: Uuid) -> Result<bool, AppError> {
        Ok(object.owner_id == owner_id)
    }
}
