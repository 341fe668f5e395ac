//! Heirloom Services Library
//!
//! Business services that sit between storage and the callers that own items:
//! relocating uploads into their permanent namespace and deciding who may do so.

pub mod authorization;
pub mod migrator;

pub use authorization::{KeyOwnerAuthorizer, OwnerAuthorizer};
pub use migrator::{MigrationError, MigrationOutcome, MigrationStatus, StorageMigrator};
