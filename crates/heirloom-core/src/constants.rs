//! Application-wide constants.

/// Per-attempt ceiling for one remote analysis call.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 45_000;

/// Bounds of the uniformly distributed pause before the single retry.
pub const DEFAULT_RETRY_BACKOFF_MIN_MS: u64 = 500;
pub const DEFAULT_RETRY_BACKOFF_MAX_MS: u64 = 1_500;

/// Reference step order: transcripts and captions feed the summary.
pub const DEFAULT_ANALYSIS_STEPS: [&str; 3] = ["audio", "images", "summary"];

/// Top-level prefix under which freshly uploaded objects land.
pub const DEFAULT_TEMP_PREFIX: &str = "temp";

/// Path segment a third-party media host shares between audio and video assets.
pub const SHARED_VIDEO_UPLOAD_SEGMENT: &str = "/video/upload/";

pub const DEFAULT_MAX_CONCURRENT_ITEMS: usize = 4;
pub const DEFAULT_MIGRATION_CLAIM_TTL_SECS: u64 = 60;
pub const DEFAULT_STALE_AFTER_SECS: u64 = 900;
