//! Opquote Server Binary
//!
//! Serves signed operator price quotes over HTTP.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use opquote_common::{QuoteSigner, VERSION};
use opquote_engine::{
    api::{self, AppState},
    BenchmarkCache, EngineConfig, InMemoryBenchmarkCache, PersistentBenchmarkCache,
    PriceCalculator, PricingConfig, PricingConfigResolver, ProofOfWorkGate, QuoteMetrics,
    QuoteService, SecurityCommitmentBuilder,
};

/// Interval between pricing file modification checks
const PRICING_RELOAD_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Opquote pricing engine v{}", VERSION);

    // Load configuration
    let config = EngineConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let signer = match &config.server.signing_key_hex {
        Some(secret) => {
            QuoteSigner::from_secret_hex(secret).context("invalid OPQUOTE_SIGNING_KEY")?
        }
        None => {
            warn!("OPQUOTE_SIGNING_KEY not set, using an ephemeral operator key");
            QuoteSigner::generate()
        }
    };
    info!(operator = %signer.operator_did(), "Operator identity loaded");

    let pricing_config = match &config.server.pricing_file {
        Some(path) => load_pricing(path)?,
        None => {
            info!("No pricing file configured, using built-in rate table");
            PricingConfig::builtin()
        }
    };
    let pricing = Arc::new(PricingConfigResolver::new(pricing_config));

    let benchmarks: Arc<dyn BenchmarkCache> = match &config.server.benchmark_file {
        Some(path) => Arc::new(PersistentBenchmarkCache::open(path)?),
        None => {
            warn!("No benchmark file configured, cache starts empty");
            Arc::new(InMemoryBenchmarkCache::new())
        }
    };

    let calculator = PriceCalculator::new(config.pricing.block_time_seconds)
        .with_curve(config.security.curve.clone())?;

    let registry = Arc::new(prometheus::Registry::new());
    let metrics = Arc::new(QuoteMetrics::new()?);
    metrics.register(&registry)?;

    let service = Arc::new(
        QuoteService::new(
            Arc::new(ProofOfWorkGate::new(config.proof_of_work)),
            benchmarks,
            pricing.clone(),
            calculator,
            SecurityCommitmentBuilder::new(config.security.commitment_policy),
            signer,
            config.quote_settings(),
        )
        .with_metrics(metrics),
    );

    if let Some(path) = config.server.pricing_file.clone() {
        tokio::spawn(watch_pricing_file(path, pricing));
    }

    let app = api::router(AppState::new(service, registry));

    // Parse address
    let addr: SocketAddr = config.bind_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("REST API listening on {}", addr);
    info!("Available endpoints:");
    info!("  - GET  /health");
    info!("  - GET  /v1/operator");
    info!("  - GET  /v1/challenge/:workload_id");
    info!("  - POST /v1/price");
    info!("  - GET  /metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down Opquote pricing engine");
    Ok(())
}

fn load_pricing(path: &Path) -> Result<PricingConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pricing file {}", path.display()))?;
    let config = PricingConfig::from_json_str(&content)?;
    info!(
        path = %path.display(),
        default_entries = config.default.len(),
        overrides = config.overrides.len(),
        "Loaded pricing config"
    );
    Ok(config)
}

/// Reload the pricing file whenever its modification time changes
async fn watch_pricing_file(path: PathBuf, resolver: Arc<PricingConfigResolver>) {
    let modified = |path: &Path| -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    };

    let mut last_seen = modified(&path);
    let mut ticker = tokio::time::interval(PRICING_RELOAD_INTERVAL);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let current = modified(&path);
        if current == last_seen {
            continue;
        }
        last_seen = current;

        // A bad edit keeps the previous config in place
        match load_pricing(&path) {
            Ok(config) => {
                if let Err(e) = resolver.reload(config) {
                    warn!(path = %path.display(), error = %e, "Rejected pricing reload");
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to reload pricing file"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
