//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Position syncs and settlements
//! - Message lifecycle and expiry backlog
//! - Locked collateral
//! - Rejected operations by error kind

use crate::error::{ErrorKind, PoolError, PoolResult};
use crate::events::ProtocolEvent;
use crate::messaging::MessageStatus;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref EVENTS_EMITTED: CounterVec = register_counter_vec!(
        "tesseract_pool_events_total",
        "Total protocol events by type",
        &["chain_id", "event_type"]
    ).unwrap();

    pub static ref POSITION_SYNCS: CounterVec = register_counter_vec!(
        "tesseract_pool_position_syncs_total",
        "Snapshots applied per reporting chain",
        &["chain_id"]
    ).unwrap();

    pub static ref SETTLEMENTS: CounterVec = register_counter_vec!(
        "tesseract_pool_settlements_total",
        "Series settled",
        &["chain_id"]
    ).unwrap();

    pub static ref MESSAGES_RESOLVED: CounterVec = register_counter_vec!(
        "tesseract_pool_messages_resolved_total",
        "Messages confirmed or failed",
        &["chain_id", "status"]
    ).unwrap();

    pub static ref MESSAGES_EXPIRED_PENDING: GaugeVec = register_gauge_vec!(
        "tesseract_pool_messages_expired_pending",
        "PENDING messages past their expiry window",
        &["chain_id"]
    ).unwrap();

    pub static ref REBALANCES: CounterVec = register_counter_vec!(
        "tesseract_pool_rebalances_total",
        "Rebalance requests by stage",
        &["chain_id", "stage"]
    ).unwrap();

    pub static ref LOCKED_COLLATERAL: GaugeVec = register_gauge_vec!(
        "tesseract_pool_locked_collateral",
        "Collateral held in local custody",
        &["chain_id"]
    ).unwrap();

    pub static ref REJECTED_OPERATIONS: CounterVec = register_counter_vec!(
        "tesseract_pool_rejected_operations_total",
        "Operations rejected by error kind",
        &["kind"]
    ).unwrap();

    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "tesseract_pool_health_check_success_total",
        "Total successful health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> PoolResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| PoolError::Internal(format!("metrics bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| PoolError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_event(event: &ProtocolEvent) {
    EVENTS_EMITTED
        .with_label_values(&[&event.chain_id().to_string(), event.name()])
        .inc();
}

pub fn record_position_sync(chain_id: u64) {
    POSITION_SYNCS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_settlement(chain_id: u64) {
    SETTLEMENTS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_message_resolved(chain_id: u64, status: MessageStatus) {
    MESSAGES_RESOLVED
        .with_label_values(&[&chain_id.to_string(), status.as_str()])
        .inc();
}

pub fn record_expired_pending(chain_id: u64, count: usize) {
    MESSAGES_EXPIRED_PENDING
        .with_label_values(&[&chain_id.to_string()])
        .set(count as f64);
}

pub fn record_rebalance(chain_id: u64, stage: &str) {
    REBALANCES
        .with_label_values(&[&chain_id.to_string(), stage])
        .inc();
}

pub fn record_locked_collateral(chain_id: u64, total_locked: u128) {
    LOCKED_COLLATERAL
        .with_label_values(&[&chain_id.to_string()])
        .set(total_locked as f64);
}

pub fn record_rejected(kind: ErrorKind) {
    REJECTED_OPERATIONS
        .with_label_values(&[kind.as_str()])
        .inc();
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}
