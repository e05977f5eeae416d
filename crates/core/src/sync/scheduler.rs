//! Scheduler constants for local persistence and remote sync.

/// Trailing-edge debounce window for local persistence (milliseconds).
pub const LOCAL_SAVE_DEBOUNCE_MS: u64 = 200;

/// Trailing-edge debounce window for remote autosave (milliseconds).
pub const REMOTE_AUTOSAVE_DEBOUNCE_MS: u64 = 8_000;

/// Minimum time between two successful remote pushes (milliseconds).
pub const MIN_REMOTE_PUSH_INTERVAL_MS: i64 = 6_000;

/// Upper bound for any single gateway request (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
