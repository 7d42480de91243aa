//! Fetch the configured feeds once, print the digest as text and store it.
//! Delivery is left to the service (`POST /api/send`).

use anyhow::Result;
use tech_digest::config::AppConfig;
use tech_digest::notify::render::render_text;
use tech_digest::{init_tracing, pipeline, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let state = AppState::from_config(AppConfig::from_env()?)?;
    let report = pipeline::collect(&state).await?;
    for f in &report.failures {
        eprintln!("feed failed: {} ({})", f.source, f.error);
    }

    let groups = state.engine.summarize(&report.items);
    state.digests.save(&groups).await?;
    print!("{}", render_text(&groups));
    Ok(())
}
