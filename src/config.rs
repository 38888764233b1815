use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "ClinicFlow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "clinic.db";

/// How long a connection waits on a locked database before giving up.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Get the application data directory
/// ~/ClinicFlow/ on all platforms; falls back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the default database path
pub fn database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

/// Busy timeout applied to every connection (milliseconds).
pub fn busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    "info,clinic_flow=debug".to_string()
}
