//! Heirloom persistence layer
//!
//! Repositories for per-item analysis status and for the short-lived claims
//! that serialize storage migrations. Each repository is a trait with a
//! PostgreSQL implementation and an in-memory one for tests and database-less
//! runs.

pub mod analysis_state;
pub mod migration_claim;
pub mod setup;

pub use analysis_state::{
    AnalysisStateRepository, InMemoryAnalysisStateRepository, PostgresAnalysisStateRepository,
};
pub use migration_claim::{
    InMemoryMigrationClaimRepository, MigrationClaimRepository, PostgresMigrationClaimRepository,
};
pub use setup::setup_database;
