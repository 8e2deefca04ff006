//! HTTP API for health checks, the read surface and relayer operations
//!
//! Callers identify themselves with the `x-caller` header; the domain decides
//! what that address may do.

use crate::config::ApiConfig;
use crate::coordination::SettlementService;
use crate::error::{ErrorKind, PoolError, PoolResult};
use crate::events::ProtocolEvent;
use crate::messaging::CrossChainMessage;
use crate::positions::{AggregatedPosition, ChainPositionSnapshot};
use crate::rebalance::RebalanceRequest;
use crate::registry::ChainDeployment;
use crate::settlement::{SettlementRecord, SettlementTerms};
use crate::state::{MemoryJournal, MessageStats, StateManager};
use crate::types::{ChainId, MessageId, SeriesId};

use alloy_primitives::Address;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub const CALLER_HEADER: &str = "x-caller";

const DEFAULT_EVENT_LIMIT: usize = 100;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SettlementService>,
    pub journal: Arc<MemoryJournal>,
    pub state_manager: Option<Arc<StateManager>>,
    pub instance_id: String,
    pub started_at: Instant,
}

/// Build the router over the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status", get(get_status))
        .route("/stats", get(get_stats))
        .route("/events", get(get_events))
        // Registry
        .route("/chains", get(get_chains).post(register_chain))
        .route("/chains/:chain_id", get(get_chain))
        .route("/chains/:chain_id/activate", post(activate_chain))
        .route("/chains/:chain_id/deactivate", post(deactivate_chain))
        .route("/relayers", post(set_relayer))
        // Positions and settlement
        .route("/series/:series_id", get(get_aggregated))
        .route("/series/:series_id/chains/:chain_id", get(get_snapshot))
        .route("/series/:series_id/delta/:chain_id", get(get_delta))
        .route("/series/:series_id/settlement", get(get_settlement))
        .route("/series/:series_id/sync", post(sync_position))
        .route("/series/:series_id/receive", post(receive_position_sync))
        .route("/series/:series_id/settle", post(initiate_settlement))
        .route("/series/:series_id/execute", post(execute_settlement))
        // Collateral
        .route("/collateral", get(get_collateral))
        .route("/series/:series_id/lock", post(lock_collateral))
        .route("/series/:series_id/release", post(release_collateral))
        // Messages
        .route("/messages/pending", get(get_pending_messages))
        .route("/messages/expired", get(get_expired_messages))
        .route("/messages/:message_id", get(get_message))
        .route("/messages/:message_id/confirm", post(confirm_message))
        .route("/messages/:message_id/fail", post(fail_message))
        // Rebalancing
        .route("/rebalance", post(request_rebalance))
        .route("/rebalance/open", get(get_open_rebalances))
        .route("/rebalance/:id", get(get_rebalance))
        .route("/rebalance/:id/execute", post(execute_rebalance))
        // Administration
        .route("/admin/pause", post(pause))
        .route("/admin/unpause", post(unpause))
        .route("/admin/ownership", post(transfer_ownership))
        .route("/admin/withdraw", post(emergency_withdraw))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> PoolResult<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PoolError::Internal(format!("API bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| PoolError::Internal(format!("API server: {}", e)))?;

    Ok(())
}

// ----- Errors and extractors -----

/// Error returned by every handler
#[derive(Debug)]
pub enum ApiError {
    Pool(PoolError),
    BadRequest(String),
    Unavailable(String),
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        ApiError::Pool(err)
    }
}

fn status_for(err: &PoolError) -> StatusCode {
    match err.kind() {
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Resource => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Temporal => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Precondition => match err {
            PoolError::ChainNotRegistered(_)
            | PoolError::SeriesNotFound(_)
            | PoolError::MessageNotFound(_)
            | PoolError::RebalanceNotFound(_) => StatusCode::NOT_FOUND,
            PoolError::ZeroAddress
            | PoolError::ZeroAmount
            | PoolError::InvalidSettlementPrice
            | PoolError::SelfTarget(_)
            | PoolError::LocalSource(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::CONFLICT,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Pool(err) => (
                status_for(&err),
                ErrorResponse {
                    error: err.to_string(),
                    kind: err.kind().as_str().to_string(),
                    retryable: err.is_retryable(),
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    kind: "request".to_string(),
                    retryable: false,
                },
            ),
            ApiError::Unavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: message,
                    kind: "unavailable".to_string(),
                    retryable: true,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Address taken from the `x-caller` header
pub struct Caller(pub Address);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", CALLER_HEADER)))?
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("unreadable {} header", CALLER_HEADER)))?;

        raw.parse::<Address>()
            .map(Caller)
            .map_err(|_| ApiError::BadRequest(format!("invalid caller address: {}", raw)))
    }
}

fn parse_id(raw: &str) -> Result<SeriesId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid 32-byte id: {}", raw)))
}

fn found<T>(value: Option<T>, err: PoolError) -> ApiResult<T> {
    value.map(Json).ok_or(ApiError::Pool(err))
}

// ----- Health and status -----

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify the journal database when one is configured
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.state_manager {
        Some(manager) => Some(manager.health_check().await.is_ok()),
        None => None,
    };
    let ready = database.unwrap_or(true);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, database }))
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_seconds = state.started_at.elapsed().as_secs();
    let status = state
        .service
        .read(|d| StatusResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            instance_id: state.instance_id.clone(),
            uptime_seconds,
            chain_id: d.chain_id(),
            is_hub: d.is_hub(),
            hub_chain_id: d.hub_chain_id(),
            owner: d.owner(),
            paused: d.is_paused(),
            registered_chains: d.get_registered_chains(),
            pending_messages: d.pending_messages().len(),
            current_nonce: d.current_nonce(),
        })
        .await;
    Json(status)
}

/// Message statistics from the journal database
async fn get_stats(State(state): State<AppState>) -> ApiResult<MessageStats> {
    let manager = state
        .state_manager
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("no database configured".to_string()))?;
    Ok(Json(manager.get_stats().await?))
}

#[derive(Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<ProtocolEvent>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Json(state.journal.recent(limit).await)
}

// ----- Registry -----

async fn get_chains(State(state): State<AppState>) -> Json<Vec<ChainDeployment>> {
    let chains = state
        .service
        .read(|d| {
            d.get_registered_chains()
                .into_iter()
                .filter_map(|id| d.get_chain_deployment(id))
                .collect()
        })
        .await;
    Json(chains)
}

async fn get_chain(
    State(state): State<AppState>,
    Path(chain_id): Path<ChainId>,
) -> ApiResult<ChainDeployment> {
    let deployment = state.service.read(|d| d.get_chain_deployment(chain_id)).await;
    found(deployment, PoolError::ChainNotRegistered(chain_id))
}

#[derive(Deserialize)]
struct RegisterChainRequest {
    chain_id: ChainId,
    deployment_address: Address,
}

async fn register_chain(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<RegisterChainRequest>,
) -> ApiResult<ChainDeployment> {
    let deployment = state
        .service
        .execute(move |d| {
            d.register_chain(caller, body.chain_id, body.deployment_address)?;
            d.get_chain_deployment(body.chain_id)
                .ok_or(PoolError::ChainNotRegistered(body.chain_id))
        })
        .await?;
    Ok(Json(deployment))
}

async fn activate_chain(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(chain_id): Path<ChainId>,
) -> ApiResult<Ack> {
    state
        .service
        .execute(move |d| d.activate_chain(caller, chain_id))
        .await?;
    Ok(Json(Ack::ok()))
}

async fn deactivate_chain(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(chain_id): Path<ChainId>,
) -> ApiResult<Ack> {
    state
        .service
        .execute(move |d| d.deactivate_chain(caller, chain_id))
        .await?;
    Ok(Json(Ack::ok()))
}

#[derive(Deserialize)]
struct RelayerRequest {
    relayer: Address,
    enabled: bool,
}

async fn set_relayer(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<RelayerRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .execute(move |d| d.set_relayer(caller, body.relayer, body.enabled))
        .await?;
    Ok(Json(Ack::ok()))
}

// ----- Positions and settlement -----

async fn get_aggregated(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<AggregatedPosition> {
    let series_id = parse_id(&series_id)?;
    let position = state.service.read(|d| d.get_aggregated_position(series_id)).await;
    found(position, PoolError::SeriesNotFound(series_id))
}

async fn get_snapshot(
    State(state): State<AppState>,
    Path((series_id, chain_id)): Path<(String, ChainId)>,
) -> ApiResult<ChainPositionSnapshot> {
    let series_id = parse_id(&series_id)?;
    let snapshot = state
        .service
        .read(|d| d.get_chain_snapshot(series_id, chain_id))
        .await;
    found(snapshot, PoolError::SeriesNotFound(series_id))
}

async fn get_delta(
    State(state): State<AppState>,
    Path((series_id, chain_id)): Path<(String, ChainId)>,
) -> ApiResult<DeltaResponse> {
    let series_id = parse_id(&series_id)?;
    let delta = state
        .service
        .read(|d| d.get_settlement_delta(series_id, chain_id))
        .await?;
    Ok(Json(DeltaResponse {
        series_id,
        chain_id,
        delta,
    }))
}

async fn get_settlement(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<SettlementRecord> {
    let series_id = parse_id(&series_id)?;
    let record = state.service.read(|d| d.get_settlement_record(series_id)).await;
    found(record, PoolError::NotSettled(series_id))
}

#[derive(Deserialize)]
struct SyncRequest {
    long_amount: u128,
    short_amount: u128,
}

async fn sync_position(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(series_id): Path<String>,
    Json(body): Json<SyncRequest>,
) -> ApiResult<AggregatedPosition> {
    let series_id = parse_id(&series_id)?;
    let position = state
        .service
        .execute(move |d| d.sync_position(caller, series_id, body.long_amount, body.short_amount))
        .await?;
    Ok(Json(position))
}

#[derive(Deserialize)]
struct ReceiveSyncRequest {
    source_chain: ChainId,
    long_amount: u128,
    short_amount: u128,
    locked_collateral: u128,
}

async fn receive_position_sync(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(series_id): Path<String>,
    Json(body): Json<ReceiveSyncRequest>,
) -> ApiResult<AggregatedPosition> {
    let series_id = parse_id(&series_id)?;
    let position = state
        .service
        .execute(move |d| {
            d.receive_position_sync(
                caller,
                body.source_chain,
                series_id,
                body.long_amount,
                body.short_amount,
                body.locked_collateral,
            )
        })
        .await?;
    Ok(Json(position))
}

async fn initiate_settlement(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(series_id): Path<String>,
    Json(terms): Json<SettlementTerms>,
) -> ApiResult<AggregatedPosition> {
    let series_id = parse_id(&series_id)?;
    let position = state
        .service
        .execute(move |d| d.initiate_settlement(caller, series_id, terms))
        .await?;
    Ok(Json(position))
}

#[derive(Deserialize)]
struct ExecuteSettlementRequest {
    settlement_price: u128,
    payout_amount: i128,
}

async fn execute_settlement(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(series_id): Path<String>,
    Json(body): Json<ExecuteSettlementRequest>,
) -> ApiResult<AggregatedPosition> {
    let series_id = parse_id(&series_id)?;
    let position = state
        .service
        .execute(move |d| {
            d.execute_settlement(caller, series_id, body.settlement_price, body.payout_amount)
        })
        .await?;
    Ok(Json(position))
}

// ----- Collateral -----

async fn get_collateral(State(state): State<AppState>) -> Json<CollateralResponse> {
    let collateral = state
        .service
        .read(|d| CollateralResponse {
            token: d.collateral_token(),
            total_locked: d.total_locked(),
            total_across_chains: d.get_total_collateral_across_chains(),
        })
        .await;
    Json(collateral)
}

#[derive(Deserialize)]
struct AmountRequest {
    amount: u128,
}

async fn lock_collateral(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(series_id): Path<String>,
    Json(body): Json<AmountRequest>,
) -> ApiResult<SeriesCollateralResponse> {
    let series_id = parse_id(&series_id)?;
    let collateral = state
        .service
        .execute(move |d| d.lock_collateral(caller, series_id, body.amount))
        .await?;
    Ok(Json(SeriesCollateralResponse {
        series_id,
        collateral,
    }))
}

#[derive(Deserialize)]
struct ReleaseRequest {
    amount: u128,
    recipient: Address,
}

async fn release_collateral(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(series_id): Path<String>,
    Json(body): Json<ReleaseRequest>,
) -> ApiResult<SeriesCollateralResponse> {
    let series_id = parse_id(&series_id)?;
    let collateral = state
        .service
        .execute(move |d| d.release_collateral(caller, series_id, body.amount, body.recipient))
        .await?;
    Ok(Json(SeriesCollateralResponse {
        series_id,
        collateral,
    }))
}

// ----- Messages -----

async fn get_pending_messages(State(state): State<AppState>) -> Json<Vec<CrossChainMessage>> {
    Json(state.service.read(|d| d.pending_messages()).await)
}

async fn get_expired_messages(State(state): State<AppState>) -> Json<Vec<CrossChainMessage>> {
    Json(state.service.read(|d| d.expired_pending_messages()).await)
}

async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> ApiResult<CrossChainMessage> {
    let message_id: MessageId = parse_id(&message_id)?;
    let message = state.service.read(|d| d.get_message(message_id)).await;
    found(message, PoolError::MessageNotFound(message_id))
}

async fn confirm_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(message_id): Path<String>,
) -> ApiResult<CrossChainMessage> {
    let message_id: MessageId = parse_id(&message_id)?;
    let message = state
        .service
        .execute(move |d| d.confirm_message(caller, message_id))
        .await?;
    Ok(Json(message))
}

async fn fail_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(message_id): Path<String>,
) -> ApiResult<CrossChainMessage> {
    let message_id: MessageId = parse_id(&message_id)?;
    let message = state
        .service
        .execute(move |d| d.fail_message(caller, message_id))
        .await?;
    Ok(Json(message))
}

// ----- Rebalancing -----

#[derive(Deserialize)]
struct RebalanceBody {
    from_chain_id: ChainId,
    to_chain_id: ChainId,
    amount: u128,
}

async fn request_rebalance(
    State(state): State<AppState>,
    Json(body): Json<RebalanceBody>,
) -> ApiResult<RebalanceRequest> {
    let request = state
        .service
        .execute(move |d| d.request_rebalance(body.from_chain_id, body.to_chain_id, body.amount))
        .await?;
    Ok(Json(request))
}

async fn get_open_rebalances(State(state): State<AppState>) -> Json<Vec<RebalanceRequest>> {
    Json(state.service.read(|d| d.open_rebalance_requests()).await)
}

async fn get_rebalance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<RebalanceRequest> {
    let request = state.service.read(|d| d.get_rebalance_request(id)).await;
    found(request, PoolError::RebalanceNotFound(id))
}

async fn execute_rebalance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> ApiResult<RebalanceRequest> {
    let request = state
        .service
        .execute(move |d| d.execute_rebalance(caller, id))
        .await?;
    Ok(Json(request))
}

// ----- Administration -----

async fn pause(State(state): State<AppState>, Caller(caller): Caller) -> ApiResult<Ack> {
    state.service.execute(move |d| d.pause(caller)).await?;
    Ok(Json(Ack::ok()))
}

async fn unpause(State(state): State<AppState>, Caller(caller): Caller) -> ApiResult<Ack> {
    state.service.execute(move |d| d.unpause(caller)).await?;
    Ok(Json(Ack::ok()))
}

#[derive(Deserialize)]
struct OwnershipRequest {
    new_owner: Address,
}

async fn transfer_ownership(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<OwnershipRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .execute(move |d| d.transfer_ownership(caller, body.new_owner))
        .await?;
    Ok(Json(Ack::ok()))
}

#[derive(Deserialize)]
struct WithdrawRequest {
    to: Address,
    amount: u128,
}

async fn emergency_withdraw(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<WithdrawRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .execute(move |d| d.emergency_withdraw(caller, body.to, body.amount))
        .await?;
    Ok(Json(Ack::ok()))
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: Option<bool>,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    instance_id: String,
    uptime_seconds: u64,
    chain_id: ChainId,
    is_hub: bool,
    hub_chain_id: ChainId,
    owner: Address,
    paused: bool,
    registered_chains: Vec<ChainId>,
    pending_messages: usize,
    current_nonce: u64,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    kind: String,
    retryable: bool,
}

#[derive(Serialize)]
struct Ack {
    ok: bool,
}

impl Ack {
    fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Serialize)]
struct DeltaResponse {
    series_id: SeriesId,
    chain_id: ChainId,
    delta: i128,
}

#[derive(Serialize)]
struct CollateralResponse {
    token: Address,
    total_locked: u128,
    total_across_chains: u128,
}

#[derive(Serialize)]
struct SeriesCollateralResponse {
    series_id: SeriesId,
    collateral: u128,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ledger::InMemoryToken;
    use crate::pool::{DomainParams, PoolDomain};
    use crate::settlement::IntrinsicPricer;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const OWNER: Address = Address::repeat_byte(0x01);
    const RELAYER: Address = Address::repeat_byte(0x02);
    const DEPOSITOR: Address = Address::repeat_byte(0x03);
    const SERIES: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";

    fn app() -> Router {
        let params = DomainParams {
            chain_id: 1,
            deployment_address: Address::repeat_byte(0xa1),
            is_hub: true,
            hub_chain_id: 1,
            owner: OWNER,
            min_sync_interval_secs: 300,
            message_expiry_secs: 3_600,
        };
        let mut token = InMemoryToken::new(Address::repeat_byte(0xcc));
        token.credit(DEPOSITOR, 10_000);

        let mut domain = PoolDomain::new(
            params,
            Box::new(token),
            Arc::new(IntrinsicPricer),
            Arc::new(ManualClock::new(1_000)),
        )
        .unwrap();
        domain.set_relayer(OWNER, RELAYER, true).unwrap();

        let journal = Arc::new(MemoryJournal::new(64));
        let service = Arc::new(SettlementService::new(domain, vec![journal.clone()], 60, 64));

        router(AppState {
            service,
            journal,
            state_manager: None,
            instance_id: "test".to_string(),
            started_at: Instant::now(),
        })
    }

    fn post(uri: &str, caller: Option<Address>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(caller) = caller {
            builder = builder.header(CALLER_HEADER, caller.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_caller_is_bad_request() {
        let uri = format!("/series/{}/sync", SERIES);
        let response = app()
            .oneshot(post(&uri, None, r#"{"long_amount":1,"short_amount":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_relayer_sync_is_forbidden() {
        let uri = format!("/series/{}/sync", SERIES);
        let response = app()
            .oneshot(post(&uri, Some(DEPOSITOR), r#"{"long_amount":1,"short_amount":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json(response).await["kind"], "authorization");
    }

    #[tokio::test]
    async fn test_sync_then_rate_limited() {
        let app = app();
        let uri = format!("/series/{}/sync", SERIES);
        let body = r#"{"long_amount":500,"short_amount":300}"#;

        let response = app
            .clone()
            .oneshot(post(&uri, Some(RELAYER), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["total_long_across_chains"], 500);

        let response = app
            .clone()
            .oneshot(post(&uri, Some(RELAYER), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json(response).await["retryable"], true);

        let response = app
            .oneshot(get(&format!("/series/{}/delta/1", SERIES)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["delta"], 200);
    }

    #[tokio::test]
    async fn test_lock_then_read_collateral() {
        let app = app();
        let uri = format!("/series/{}/lock", SERIES);

        let response = app
            .clone()
            .oneshot(post(&uri, Some(DEPOSITOR), r#"{"amount":1500}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["collateral"], 1500);

        let response = app.oneshot(get("/collateral")).await.unwrap();
        assert_eq!(json(response).await["total_locked"], 1500);
    }

    #[tokio::test]
    async fn test_unknown_rebalance_is_not_found() {
        let response = app().oneshot(get("/rebalance/7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_series_id_is_bad_request() {
        let response = app().oneshot(get("/series/not-hex")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_without_database_is_unavailable() {
        let response = app().oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
