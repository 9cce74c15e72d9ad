use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Directives used when `RUST_LOG` is unset.
///
/// Message routing and keyboard commands log their decisions at debug under
/// `service::router`. Tier fallbacks are warnings from `service::storage`, so
/// the quieter storage debug lines (token grants, commits) stay off. Analytics
/// transport failures only reach the log, as warnings from `common::tasks`.
const DEFAULT_DIRECTIVES: &str = "info,tower_http=info,service::router=debug,service::storage=info";

fn background_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Compact human-readable output on stdout for local runs.
pub fn init_logging_default() {
    let _ = fmt()
        .with_env_filter(background_filter())
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// One JSON object per event, with targets kept so `service::storage` and
/// `service::payment` lines can be filtered downstream.
pub fn init_logging_json() {
    let _ = fmt()
        .with_env_filter(background_filter())
        .with_target(true)
        .json()
        .with_writer(io::stdout)
        .try_init();
}
