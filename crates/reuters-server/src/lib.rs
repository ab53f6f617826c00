pub mod handlers;
pub mod rate_limit;
pub mod store;
pub mod xml;

use tracing::Level;
use tracing_subscriber::EnvFilter;

pub use handlers::{AppState, DEFAULT_MAX_RESULTS, router};
pub use rate_limit::RateLimiterLayer;
pub use store::{DocumentStore, QueryParams, QueryResult, StoreError};

/// Install the `RUST_LOG`-driven subscriber shared by the binaries; output goes to stderr.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
