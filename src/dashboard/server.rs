//! HTTP API and WebSocket dashboard server

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::modules::giant_detector::DetectedGiant;
use crate::modules::giant_watcher::{TrackedWallet, WatchError, WatcherStats};
use crate::modules::GiantWatcher;
use crate::utils::alerts::WalletAlert;
use crate::utils::settings::NotificationConfig;
use crate::utils::solscan::{FetchError, WalletDataSource};
use crate::utils::{MetricsService, SolanaService, SolscanClient};

const DEFAULT_ALERT_LIMIT: usize = 50;
const DEFAULT_TX_LIMIT: usize = 10;
const MAX_TX_LIMIT: usize = 50;

/// Query params for list endpoints
#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<usize>,
}

/// Query params for account transaction history
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    limit: Option<usize>,
    before: Option<u64>,
}

/// Single address request body
#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    address: String,
}

/// Detection request body; no addresses means configured candidates
#[derive(Debug, Default, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    addresses: Vec<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    uptime: f64,
    watcher: WatcherStats,
}

/// WebSocket message types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "init", rename_all = "camelCase")]
    Init {
        stats: WatcherStats,
        giants: Vec<DetectedGiant>,
        recent_alerts: Vec<WalletAlert>,
    },
    #[serde(rename = "alert")]
    Alert(WalletAlert),
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub watcher: GiantWatcher,
    pub solscan: SolscanClient,
    pub metrics: Arc<MetricsService>,
    pub start_time: std::time::Instant,
}

/// Dashboard server
pub struct DashboardServer {
    config: Config,
    state: AppState,
}

impl DashboardServer {
    /// Create a new dashboard server
    pub fn new(
        config: Config,
        watcher: GiantWatcher,
        solscan: SolscanClient,
        metrics: Arc<MetricsService>,
    ) -> Self {
        let state = AppState {
            config: config.clone(),
            watcher,
            solscan,
            metrics,
            start_time: std::time::Instant::now(),
        };

        Self { config, state }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the dashboard server
    pub async fn start(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.dashboard_port));
        info!(target: "DASHBOARD", "✅ Dashboard API running at http://localhost:{}", self.config.dashboard_port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

/// All API routes over `state`
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Giants
        .route("/api/giants", get(get_giants))
        .route("/api/giants/detect", post(detect_giants))
        .route("/api/giants/add", post(add_wallet))
        // Tracking
        .route("/api/tracked", get(get_tracked).post(track_wallet))
        .route("/api/tracked/:address", axum::routing::delete(untrack_wallet))
        .route("/api/tracked/:address/toggle", post(toggle_tracking))
        // Alerts and settings
        .route("/api/alerts", get(get_alerts))
        .route("/api/settings", get(get_settings).put(update_settings))
        // Explorer
        .route("/api/transactions/latest", get(latest_transactions))
        .route("/api/transactions/:signature", get(transaction_info))
        .route("/api/tokens/trending", get(trending_tokens))
        .route("/api/tokens/:mint", get(token_meta))
        .route("/api/blocks/:slot", get(block_info))
        .route("/api/accounts/:address", get(account_info))
        .route("/api/accounts/:address/tokens", get(account_tokens))
        .route("/api/accounts/:address/transactions", get(account_transactions))
        // Prometheus metrics
        .route("/metrics", get(get_metrics))
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================
// HELPERS
// ============================================

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn upstream_error(error: FetchError) -> Response {
    warn!(target: "DASHBOARD", "Upstream request failed: {}", error);
    error_response(StatusCode::BAD_GATEWAY, error.to_string())
}

fn watch_error(error: WatchError) -> Response {
    let status = match &error {
        WatchError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        WatchError::NotAGiant(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
        WatchError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.to_string())
}

fn invalid_address(address: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        format!("invalid address: {}", address),
    )
}

fn proxy<T: Serialize>(result: Result<T, FetchError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => upstream_error(e),
    }
}

// ============================================
// HANDLERS
// ============================================

async fn get_giants(State(state): State<AppState>) -> Json<Vec<DetectedGiant>> {
    Json(state.watcher.get_giants())
}

async fn detect_giants(
    State(state): State<AppState>,
    body: Option<Json<DetectRequest>>,
) -> Response {
    let Json(request) = body.unwrap_or_default();
    if let Some(bad) = request
        .addresses
        .iter()
        .find(|a| !SolanaService::is_valid_address(a))
    {
        return invalid_address(bad);
    }

    let addresses = if request.addresses.is_empty() {
        state.config.candidate_addresses.clone()
    } else {
        request.addresses
    };
    Json(state.watcher.refresh_giants(&addresses).await).into_response()
}

async fn add_wallet(
    State(state): State<AppState>,
    Json(req): Json<AddressRequest>,
) -> Response {
    match state.watcher.add_wallet(&req.address).await {
        Ok(giant) => Json(giant).into_response(),
        Err(e) => watch_error(e),
    }
}

async fn get_tracked(State(state): State<AppState>) -> Json<Vec<TrackedWallet>> {
    Json(state.watcher.get_tracked())
}

async fn track_wallet(
    State(state): State<AppState>,
    Json(req): Json<AddressRequest>,
) -> Response {
    match state.watcher.track(&req.address) {
        Ok(wallet) => Json(wallet).into_response(),
        Err(e) => watch_error(e),
    }
}

async fn untrack_wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    if state.watcher.untrack(&address) {
        Json(json!({ "tracked": false })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "Wallet not tracked")
    }
}

async fn toggle_tracking(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    match state.watcher.toggle_tracking(&address) {
        Ok(tracked) => Json(json!({ "tracked": tracked })).into_response(),
        Err(e) => watch_error(e),
    }
}

async fn get_alerts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<WalletAlert>> {
    let limit = params.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    Json(state.watcher.alert_log().recent(limit))
}

async fn get_settings(State(state): State<AppState>) -> Json<NotificationConfig> {
    Json(state.watcher.settings())
}

async fn update_settings(
    State(state): State<AppState>,
    Json(config): Json<NotificationConfig>,
) -> Response {
    match state.watcher.update_settings(config) {
        Ok(saved) => Json(saved).into_response(),
        Err(e) => watch_error(e),
    }
}

// Explorer handlers
async fn latest_transactions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_TX_LIMIT).min(MAX_TX_LIMIT);
    proxy(state.solscan.latest_transactions(limit).await)
}

async fn transaction_info(
    State(state): State<AppState>,
    Path(signature): Path<String>,
) -> Response {
    proxy(state.solscan.transaction_info(&signature).await)
}

async fn trending_tokens(State(state): State<AppState>) -> Response {
    proxy(state.solscan.trending_tokens().await)
}

async fn token_meta(State(state): State<AppState>, Path(mint): Path<String>) -> Response {
    if !SolanaService::is_valid_address(&mint) {
        return invalid_address(&mint);
    }
    proxy(state.solscan.token_meta(&mint).await)
}

async fn block_info(State(state): State<AppState>, Path(slot): Path<u64>) -> Response {
    proxy(state.solscan.block_info(slot).await)
}

async fn account_info(State(state): State<AppState>, Path(address): Path<String>) -> Response {
    if !SolanaService::is_valid_address(&address) {
        return invalid_address(&address);
    }
    proxy(state.solscan.account_info(&address).await)
}

async fn account_tokens(State(state): State<AppState>, Path(address): Path<String>) -> Response {
    if !SolanaService::is_valid_address(&address) {
        return invalid_address(&address);
    }
    proxy(state.solscan.token_holdings(&address).await)
}

async fn account_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    if !SolanaService::is_valid_address(&address) {
        return invalid_address(&address);
    }
    let limit = params.limit.unwrap_or(DEFAULT_TX_LIMIT).min(MAX_TX_LIMIT);
    proxy(
        state
            .solscan
            .account_transactions(&address, params.before, limit)
            .await,
    )
}

// Metrics handler
async fn get_metrics(State(state): State<AppState>) -> Response {
    let stats = state.watcher.get_stats();
    state.metrics.tracked_wallets.set(stats.tracked_wallets as f64);
    state.metrics.giants.set(stats.giants as f64);
    state
        .metrics
        .set_module_status("movementMonitor", stats.is_monitoring);

    let metrics = state.metrics.get_metrics();
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        metrics,
    )
        .into_response()
}

// Health check handlers
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime: state.start_time.elapsed().as_secs_f64(),
        watcher: state.watcher.get_stats(),
    })
}

async fn readiness_check(State(state): State<AppState>) -> Response {
    if state.watcher.is_running() {
        Json(json!({ "ready": true })).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ready": false }))).into_response()
    }
}

// WebSocket handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    info!(target: "DASHBOARD", "WebSocket client connected");

    // Subscribe before the snapshot so no alert falls in between
    let mut alert_rx = state.watcher.alert_log().subscribe();

    let init_msg = WsMessage::Init {
        stats: state.watcher.get_stats(),
        giants: state.watcher.get_giants(),
        recent_alerts: state.watcher.alert_log().recent(20),
    };
    if let Ok(json) = serde_json::to_string(&init_msg) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    let send_task = tokio::spawn(async move {
        loop {
            match alert_rx.recv().await {
                Ok(alert) => {
                    let Ok(json) = serde_json::to_string(&WsMessage::Alert(alert)) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(target: "DASHBOARD", "WebSocket client lagged {} alerts", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Incoming messages only keep the connection alive
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(target: "DASHBOARD", "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_errors_map_to_client_statuses() {
        assert_eq!(
            watch_error(WatchError::InvalidAddress("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            watch_error(WatchError::NotAGiant("x".into())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let unavailable = FetchError::Status {
            endpoint: "account",
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(
            watch_error(WatchError::Upstream(unavailable)).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn init_message_is_tagged() {
        let msg = WsMessage::Init {
            stats: WatcherStats {
                giants: 0,
                tracked_wallets: 0,
                alerts: 0,
                is_monitoring: false,
                is_running: true,
            },
            giants: Vec::new(),
            recent_alerts: Vec::new(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["data"]["stats"]["isRunning"], true);
        assert!(value["data"]["recentAlerts"].is_array());
        assert!(value["data"].get("recent_alerts").is_none());
    }
}
