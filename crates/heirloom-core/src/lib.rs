//! Heirloom Core Library
//!
//! Domain models, media classification, primary-visual selection, error types
//! and configuration shared by every heirloom crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod media_kind;
pub mod models;
pub mod primary;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use media_kind::classify;
pub use models::{
    AnalysisState, AnalysisStatus, MediaKind, MediaList, MediaRef, Namespace, StepName,
    StorageObject,
};
pub use primary::select_primary;
pub use storage_types::StorageBackend;
