//! Centralized branding constants
//!
//! All product naming comes from this module.

/// Human-readable product name
pub const DISPLAY_NAME: &str = "SCM Tool Gateway";

/// Short identifier used for data directories and log file names
pub const IDENTIFIER: &str = "toolgate";

/// Prefix for rolling log files (e.g. `toolgate.2026-10-15.log`)
pub const LOG_PREFIX: &str = "toolgate";

/// Default listen port
pub const DEFAULT_GATEWAY_PORT: u16 = 7070;

/// Default bind host
pub const DEFAULT_GATEWAY_HOST: &str = "0.0.0.0";

/// Platform log directory (e.g. `~/.local/share/toolgate/logs` on Linux)
pub fn default_logs_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(IDENTIFIER)
        .join("logs")
}
