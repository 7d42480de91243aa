// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod digest;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod prefs;
pub mod store;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::digest::{
    summarize_items, summarize_items_at, AnnotatedItem, DigestEngine, Item, SummaryGroup,
};
pub use crate::pipeline::{AppState, RunReport};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the `RUST_LOG`-driven subscriber (default `tech_digest=info,warn`).
/// A no-op when the host runtime already installed one.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tech_digest=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
