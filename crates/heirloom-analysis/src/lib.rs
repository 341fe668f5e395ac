//! Heirloom analysis pipeline
//!
//! Calls named remote analysis steps with a per-attempt timeout and a single
//! jittered retry, and drives each item through its fixed step sequence while
//! persisting the item's status.

pub mod invoker;
pub mod orchestrator;
pub mod retry;
pub mod tracker;
pub mod transport;

pub use invoker::{AnalysisStepInvoker, StepFailure, StepOutcome};
pub use orchestrator::{AnalysisOrchestrator, PipelineOutcome};
pub use retry::{RetryExhausted, RetryPolicy};
pub use tracker::AnalysisTracker;
pub use transport::{HttpStepTransport, StepTransport, TransportError};
