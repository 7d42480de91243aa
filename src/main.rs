//! Tech Digest service: binary entrypoint.
//! Boots the Axum HTTP server, wiring routes, shared state, the optional
//! background scheduler and the Prometheus endpoint.

use shuttle_axum::ShuttleAxum;
use tech_digest::config::AppConfig;
use tech_digest::ingest::scheduler::spawn_digest_scheduler;
use tech_digest::metrics::Metrics;
use tech_digest::{create_router, init_tracing, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::from_env()?;
    let scheduler_enabled = config.scheduler_enabled;
    let state = AppState::from_config(config)?;

    if scheduler_enabled {
        spawn_digest_scheduler(state.clone());
        tracing::info!("digest scheduler enabled");
    }

    let mut router = create_router(state);
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics endpoint disabled"),
    }

    Ok(router.into())
}
