use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use axum::http::HeaderName;
use reuters_sgml::{LoadOptions, MalformedPolicy};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use reuters_server::rate_limit::DEFAULT_CLIENT_HEADER;
use reuters_server::{AppState, DocumentStore, RateLimiterLayer, init_tracing, router};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const MAX_RESULTS_CAP: usize = 500;
const DEFAULT_RATE_LIMIT_RPS: u32 = 5;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config()?;
    info!("binding to {}:{}", config.host, config.port);
    info!("loading {} corpus file(s)", config.corpus_paths.len());
    if config.load_options.on_malformed == MalformedPolicy::Skip {
        info!("malformed documents will be skipped");
    }
    if config.disable_cache {
        info!("cache headers disabled");
    }
    info!(
        "rate limit: {} req/s (burst {}) keyed by {}",
        config.rate_limit_rps, config.rate_limit_burst, config.rate_limit_header
    );

    let start = Instant::now();
    let store = DocumentStore::load(config.corpus_paths.iter().cloned(), &config.load_options)?;
    info!(
        "store built with {} documents in {} ms",
        store.len(),
        start.elapsed().as_millis()
    );

    let state = AppState {
        store,
        max_results_cap: config.max_results_cap,
        disable_cache: config.disable_cache,
    };

    let rate_limiter = RateLimiterLayer::new(config.rate_limit_rps, config.rate_limit_burst)
        .with_client_header(config.rate_limit_header);
    let app = router(state)
        .layer(rate_limiter)
        .layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    corpus_paths: Vec<PathBuf>,
    load_options: LoadOptions,
    disable_cache: bool,
    max_results_cap: usize,
    rate_limit_rps: u32,
    rate_limit_burst: u32,
    rate_limit_header: HeaderName,
}

fn load_config() -> anyhow::Result<Config> {
    let mut disable_cache = false;
    let mut skip_malformed = env_flag("REUTERS_SKIP_MALFORMED");
    let mut cli_paths: Vec<PathBuf> = Vec::new();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--no-cache" => disable_cache = true,
            "--skip-malformed" => skip_malformed = true,
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            _ => cli_paths.push(PathBuf::from(&arg)),
        }
    }

    let corpus_paths = if cli_paths.is_empty() {
        env::var_os("REUTERS_DATA")
            .map(|raw| env::split_paths(&raw).collect())
            .unwrap_or_default()
    } else {
        cli_paths
    };
    if corpus_paths.is_empty() {
        bail!("no corpus files given; pass paths as arguments or set REUTERS_DATA");
    }

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let max_results_cap = env::var("MAX_RESULTS_CAP")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(MAX_RESULTS_CAP);
    let rate_limit_rps = env::var("RATE_LIMIT_RPS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RATE_LIMIT_RPS);
    let rate_limit_burst = env::var("RATE_LIMIT_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RATE_LIMIT_BURST);
    let rate_limit_header = match env::var("RATE_LIMIT_HEADER") {
        Ok(raw) => HeaderName::try_from(raw.trim())
            .with_context(|| format!("invalid RATE_LIMIT_HEADER {raw:?}"))?,
        Err(_) => HeaderName::from_static(DEFAULT_CLIENT_HEADER),
    };

    let load_options = LoadOptions {
        on_malformed: if skip_malformed {
            MalformedPolicy::Skip
        } else {
            MalformedPolicy::Abort
        },
    };

    Ok(Config {
        host,
        port,
        corpus_paths,
        load_options,
        disable_cache,
        max_results_cap,
        rate_limit_rps,
        rate_limit_burst,
        rate_limit_header,
    })
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
