//! Tesseract Settlement - hub/spoke settlement coordination for multi-chain derivatives pools
//!
//! One process runs one chain's pool domain. Relayers feed it position
//! snapshots and settlement payouts over HTTP and pick up the cross-chain
//! messages it queues.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info, warn};

mod access;
mod api;
mod clock;
mod config;
mod coordination;
mod error;
mod events;
mod ledger;
mod messaging;
mod metrics;
mod pool;
mod positions;
mod rebalance;
mod registry;
mod settlement;
mod state;
mod types;

use clock::SystemClock;
use config::Settings;
use coordination::SettlementService;
use ledger::InMemoryToken;
use metrics::MetricsServer;
use pool::PoolDomain;
use settlement::IntrinsicPricer;
use state::{EventJournal, MemoryJournal, StateManager};

const RECENT_EVENTS: usize = 1_000;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Tesseract Settlement v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} ({}), {} remote chains",
        settings.domain.chain_id,
        if settings.domain.is_hub { "hub" } else { "spoke" },
        settings.enabled_chains().len()
    );

    // Optional database journal
    let state_manager = match &settings.database {
        Some(db) => {
            let manager = Arc::new(StateManager::new(db).await?);
            info!("Database connection established");
            manager.run_migrations().await?;
            info!("Database migrations complete");
            Some(manager)
        }
        None => {
            warn!("No database configured, events are kept in memory only");
            None
        }
    };

    // Build the local domain
    let domain = build_domain(&settings)?;
    info!("Pool domain initialized");

    let memory_journal = Arc::new(MemoryJournal::new(RECENT_EVENTS));
    let mut journals: Vec<Arc<dyn EventJournal>> = vec![memory_journal.clone()];
    if let Some(manager) = &state_manager {
        journals.push(manager.clone());
    }

    let service = Arc::new(SettlementService::new(
        domain,
        journals,
        settings.service.sweep_interval_secs,
        settings.service.event_buffer,
    ));

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Start API server
    let api_handle = tokio::spawn({
        let api_config = settings.api.clone();
        let state = api::AppState {
            service: service.clone(),
            journal: memory_journal.clone(),
            state_manager: state_manager.clone(),
            instance_id: settings.service.instance_id.clone(),
            started_at: Instant::now(),
        };
        async move {
            if let Err(e) = api::run_server(api_config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Start settlement service loop
    let service_handle = tokio::spawn({
        let service = service.clone();
        async move {
            if let Err(e) = service.run().await {
                error!("Settlement service error: {}", e);
            }
        }
    });

    // Health check loop
    let health_handle = tokio::spawn({
        let state_manager = state_manager.clone();
        let interval = settings.service.health_check_interval_secs;
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                if let Some(manager) = &state_manager {
                    if let Err(e) = manager.health_check().await {
                        warn!("Database health check failed: {}", e);
                        continue;
                    }
                }

                metrics::record_health_check();
            }
        }
    });

    info!("Tesseract Settlement is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Graceful shutdown
    service.stop().await;

    // Abort background tasks
    api_handle.abort();
    service_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Tesseract Settlement stopped");
    Ok(())
}

/// Construct the domain and apply the boot-time registry and relayer set
fn build_domain(settings: &Settings) -> Result<PoolDomain> {
    let mut token = InMemoryToken::new(settings.domain.collateral_token);
    for (holder, amount) in settings.collateral.parsed_balances()? {
        token.credit(holder, amount);
    }

    let owner = settings.domain.owner;
    let mut domain = PoolDomain::new(
        settings.domain_params(),
        Box::new(token),
        Arc::new(IntrinsicPricer),
        Arc::new(SystemClock),
    )?;

    let mut chains: Vec<_> = settings.enabled_chains().into_iter().map(|(_, c)| c).collect();
    chains.sort_by_key(|c| c.chain_id);
    for chain in chains {
        if chain.chain_id == settings.domain.chain_id {
            continue;
        }
        domain.register_chain(owner, chain.chain_id, chain.deployment_address)?;
        info!("Registered chain {} ({})", chain.name, chain.chain_id);
    }

    for relayer in &settings.relayers {
        domain.set_relayer(owner, *relayer, true)?;
    }
    info!("Authorized {} relayers", settings.relayers.len());

    Ok(domain)
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,tesseract_settlement=debug,sqlx=warn,hyper=warn")
    });
    let json = std::env::var("TESSERACT_LOG_JSON").is_ok();

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_target(true)))
        .with((!json).then(|| fmt::layer().with_target(true).with_thread_ids(true)))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
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
