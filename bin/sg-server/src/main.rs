//! Swapgate gateway server
//!
//! Wires the routing gateway together: embedded store, upstream exchange
//! client, outbound request queue, coordinator, status monitor, inbound
//! rate limiters, and the public HTTP API.
//!
//! Configuration comes from swapgate.toml / config.toml with SWAPGATE_*
//! environment overrides; see `sg_config::AppConfig::example_toml()`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use sg_config::AppConfig;
use sg_gateway::api::{create_router, AppState};
use sg_gateway::{
    spawn_limiter_sweeper, AssetRule, InboundRateLimiter, OutboundQueue, OutboundQueueConfig,
    StatusMonitor, TransferCoordinator, TransferPolicy,
};
use sg_store::{RoutingStore, TransactionStore};
use sg_upstream::{HttpExchangeClient, HttpExchangeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (for local development)
    let _ = dotenvy::dotenv();

    sg_common::logging::init_logging("sg-server");

    info!("Starting Swapgate Transaction Routing Gateway");

    let config = AppConfig::load().context("Failed to load configuration")?;

    if config.upstream.api_key.is_empty() && !config.dev_mode {
        warn!("No upstream API key configured - upstream calls will be rejected");
    }

    // 1. Storage (shared across instances; carries the uniqueness
    //    constraints that make creation idempotent)
    let pool = sg_store::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    sg_store::init_schema(&pool).await?;
    let routing = RoutingStore::new(pool.clone());
    let transactions = TransactionStore::new(pool.clone());

    // 2. Upstream client
    let exchange = Arc::new(HttpExchangeClient::new(HttpExchangeConfig {
        base_url: config.upstream.base_url.clone(),
        api_key: config.upstream.api_key.clone(),
        timeout: Duration::from_millis(config.upstream.request_timeout_ms),
        connect_timeout: Duration::from_millis(config.upstream.connect_timeout_ms),
    }));

    // 3. Outbound queue - the only path to the upstream
    let queue = OutboundQueue::start(
        OutboundQueueConfig {
            max_requests_per_second: config.outbound.max_requests_per_second,
            headroom: config.outbound.headroom,
            max_attempts: config.outbound.max_attempts,
            retry_base_delay: Duration::from_millis(config.outbound.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(config.outbound.retry_max_delay_ms),
        },
        exchange,
    );

    // 4. Transfer policy from the configured asset table
    let mut rules = Vec::with_capacity(config.assets.supported.len());
    for asset in &config.assets.supported {
        let rule = AssetRule::new(&asset.currency, &asset.network, &asset.min_amount)
            .map_err(|e| anyhow::anyhow!(e))?;
        rules.push(rule);
    }
    let policy = TransferPolicy::new(rules);

    // 5. Coordinator and status monitor
    let coordinator = Arc::new(TransferCoordinator::new(
        queue.clone(),
        routing.clone(),
        transactions.clone(),
        policy,
    ));
    let monitor = Arc::new(StatusMonitor::new(queue.clone(), routing, transactions));

    // 6. Inbound rate limiters + periodic sweep
    let general_limiter = Arc::new(InboundRateLimiter::new(
        "general",
        config.limits.general.max_requests,
        Duration::from_secs(config.limits.general.window_seconds),
    ));
    let create_limiter = Arc::new(InboundRateLimiter::new(
        "create",
        config.limits.create.max_requests,
        Duration::from_secs(config.limits.create.window_seconds),
    ));
    let sweeper = spawn_limiter_sweeper(
        vec![general_limiter.clone(), create_limiter.clone()],
        Duration::from_secs(config.limits.sweep_interval_seconds),
    );

    // 7. HTTP API
    let state = AppState {
        coordinator,
        monitor,
        queue: queue.clone(),
        general_limiter,
        create_limiter,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    log_startup_summary(&config);

    info!(addr = %addr, "Swapgate started. Press Ctrl+C to shutdown.");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown signal received...");

    // Graceful teardown: stop admitting upstream calls, then close storage.
    // Queued-but-undispatched entries are abandoned; dispatched calls run to
    // completion on their own tasks.
    queue.shutdown();
    sweeper.abort();
    pool.close().await;

    info!("Swapgate shutdown complete");
    Ok(())
}

fn log_startup_summary(config: &AppConfig) {
    let effective_rate =
        config.outbound.max_requests_per_second * config.outbound.headroom;
    info!("=== Swapgate Startup Summary ===");
    info!(
        "  Upstream dispatch: {:.2}/s ({} ceiling x {} headroom)",
        effective_rate, config.outbound.max_requests_per_second, config.outbound.headroom
    );
    info!(
        "  Inbound limits: general {}/{}s, create {}/{}s",
        config.limits.general.max_requests,
        config.limits.general.window_seconds,
        config.limits.create.max_requests,
        config.limits.create.window_seconds
    );
    info!("  Supported assets: {}", config.assets.supported.len());
    if config.dev_mode {
        info!("  Mode: DEVELOPMENT");
    }
    info!("================================");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
