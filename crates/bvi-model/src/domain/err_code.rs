//! Error codes persisted on failed or terminated Tasks.

/// Unexpected failure inside the service (backend error, panic, shutdown).
pub const INTERNAL: i32 = 1999;

/// Data-processing failure; used when a Task is terminated through the store.
pub const DATA_PROCESSING: i32 = 1507;

/// User-facing message for a scan that exceeded its timeout.
pub const MSG_TIMEOUT: &str = "scanning timeout";

/// User-facing message for an internal failure.
pub const MSG_INTERNAL: &str = "internal service failure";

/// User-facing message for Tasks interrupted by a shutdown.
pub const MSG_INTERRUPTED: &str = "Stopped because server interrupt.";

/// User-facing message for Tasks terminated on request.
pub const MSG_TERMINATED: &str = "terminate";
