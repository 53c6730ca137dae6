//! Lookup API Server
//!
//! HTTP front end: `GET /json?ip=...` answers with the location of the
//! given address, or of the caller when no address is given.

use crate::application::LookupDispatcher;
use crate::domain::entities::{FailureKind, LookupResult};
use crate::infrastructure::{ResourceGuard, ShutdownController};
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

/// Query string of the lookup endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub ip: Option<String>,
}

/// Successful lookup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationResponse {
    pub city: String,
    pub country: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub time_zone: String,
    pub ip: String,
    pub status: String,
}

/// Failed lookup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    pub status: String,
    pub message: String,
    pub ip: String,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub generation: u64,
    pub database_modified: Option<String>,
    pub workers: usize,
    pub queued: usize,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<LookupDispatcher>,
    pub guard: Arc<ResourceGuard>,
    pub shutdown: ShutdownController,
}

impl ApiState {
    pub fn new(
        dispatcher: Arc<LookupDispatcher>,
        guard: Arc<ResourceGuard>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            dispatcher,
            guard,
            shutdown,
        }
    }
}

/// API Server for geolocation lookups.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self { listen_addr, state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(state: ApiState) -> Router {
        Router::new()
            .route("/json", get(lookup_handler))
            .route("/health", get(health_handler))
            .layer(CatchPanicLayer::new())
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the API server until shutdown is signalled.
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = Self::router(self.state.clone());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("lookup API listening on {}", self.listen_addr);

        let shutdown = self.state.shutdown.clone();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

        tracing::info!("lookup API stopped");
        Ok(())
    }
}

/// Address the client is calling from.
///
/// Proxy headers win over the socket peer: first `X-Forwarded-For` entry,
/// then `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }

    peer.ip().to_string()
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidInput | FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for LookupResult {
    fn into_response(self) -> Response {
        let status = self.status().to_string();
        match self {
            LookupResult::Success { ip, record } => (
                StatusCode::OK,
                Json(LocationResponse {
                    city: record.city,
                    country: record.country,
                    country_code: record.iso_code,
                    latitude: record.latitude,
                    longitude: record.longitude,
                    time_zone: record.time_zone,
                    ip,
                    status,
                }),
            )
                .into_response(),
            LookupResult::Failure { ip, kind, message } => (
                status_for(kind),
                Json(FailureResponse {
                    status,
                    message,
                    ip,
                }),
            )
                .into_response(),
        }
    }
}

// Handler functions

async fn lookup_handler(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<LookupQuery>,
) -> Response {
    let ip = match query.ip.filter(|ip| !ip.is_empty()) {
        Some(ip) => ip,
        None => client_ip(&headers, peer),
    };

    state.dispatcher.submit(ip).await.into_response()
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let generation = state.guard.generation();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        generation: generation.sequence,
        database_modified: generation.modified.map(|m| m.to_rfc3339()),
        workers: state.dispatcher.pool_size(),
        queued: state.dispatcher.queued(),
    })
}
