pub mod authorization;
pub mod config;
pub mod db;
pub mod fulfillment;
pub mod models;
pub mod status;
pub mod workflow;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

pub use workflow::{ErrorKind, WorkflowError};

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Open (and migrate) the clinic database, then print the patient count per
/// status as JSON. The first CLI argument overrides the database path.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::database_path);
    let conn = db::open_database(&path)?;
    tracing::info!(path = %path.display(), "Database ready");

    let summary = db::count_patients_by_status(&conn)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
