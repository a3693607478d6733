// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names read by Thiri entry points

// Credentials
pub const THIRI_API_KEY: &str = "THIRI_API_KEY";

// Endpoint Configuration
pub const THIRI_API_BASE: &str = "THIRI_API_BASE";

// Post-creation wait in milliseconds (0 disables it)
pub const THIRI_READY_DELAY_MS: &str = "THIRI_READY_DELAY_MS";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";
