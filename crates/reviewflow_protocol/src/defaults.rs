//! Canonical default values shared across the pipeline.

/// Priority stamped on intake rows when none is configured.
pub const DEFAULT_PRIORITY: &str = "Normal";

/// Default for risk columns that no reviewer has filled in yet.
pub const NOT_ASSESSED: &str = "Not assessed";

/// FileURL annotation used when an archive copy could not be located in time.
pub const COPY_PENDING_PREFIX: &str = "[copy pending]";

/// LastAction written when a fast-track move was aborted.
pub const FAST_TRACK_NOT_MOVED: &str = "attempted, not moved";

/// Default intake polling interval.
pub const DEFAULT_INTAKE_INTERVAL_SECS: u64 = 60;

/// Default router polling interval.
pub const DEFAULT_ROUTER_INTERVAL_SECS: u64 = 300;

/// Default timeout applied to every remote call.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
