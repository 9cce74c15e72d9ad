use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use common::utils::logging::init_logging_default;
use configs::AppConfig;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::bridge::WsBridge;
use crate::routes::{self, AppState};
use service::{observability, Background};

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_default();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Router over an already wired background; used by `run` and by tests.
pub fn app(bg: Background, bridge: Arc<WsBridge>) -> Router {
    routes::build_router(AppState { bg, bridge }, build_cors())
}

/// Public entry: wire storage, payment and analytics from settings and serve HTTP
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let cfg = AppConfig::load_and_validate()?;
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    common::env::ensure_env(&cfg.storage.data_dir, &config_path).await?;

    let bridge = Arc::new(WsBridge::new());
    let bg = Background::from_config(&cfg, bridge.clone()).await?;

    let _admin = common::admin_http::spawn_admin_server(&cfg.server.admin_addr, observability::encode_metrics).await?;

    let app = app(bg, bridge.clone());
    let addr = bind_addr(&cfg)?;
    info!(%addr, "background service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            bridge.shutdown_all();
        })
        .await?;
    Ok(())
}
