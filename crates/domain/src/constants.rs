//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Token refresh configuration
pub const REFRESH_THRESHOLD_SECONDS: i64 = 300;

// Provider HTTP configuration
pub const PROVIDER_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CALENDAR_ID: &str = "primary";

// Provider identifiers
pub const PROVIDER_GOOGLE: &str = "google";
