//! Heirloom Storage Library
//!
//! This crate provides the storage abstraction and its implementations.
//! It includes the Storage trait and implementations for S3 and local filesystem.
//!
//! # Storage key format
//!
//! Keys live in one of two disjoint namespaces:
//!
//! - **Temp** (fresh uploads): `{temp_prefix}/{owner_id}/{filename}`
//! - **Permanent** (bound to an item): `{owner_id}/{item_id}/{filename}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation and URL parsing
//! are centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, key_layout};
pub use heirloom_core::StorageBackend;
pub use keys::KeyLayout;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
