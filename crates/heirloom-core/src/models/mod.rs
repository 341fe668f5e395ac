//! Data models for the pipeline
//!
//! Each sub-module covers one concern: media references, persisted analysis
//! state, and stored objects.

mod analysis;
mod media;
mod storage;

pub use analysis::*;
pub use media::*;
pub use storage::*;
