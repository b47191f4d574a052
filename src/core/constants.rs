//! Shared constants used across the engine

/// Accepted events kept per panel; the oldest entry is dropped first.
pub const EVENT_LOG_CAPACITY: usize = 200;

/// Backend-side execution timeout sent with a call when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Reason sent with operator-initiated cancel requests.
pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by operator";
