//! HTTP edge: thin axum handlers over the scenario engine facade. Clients
//! poll per tick; there is no streaming surface.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{ApiError, Direction, ErrorKind, PrepareRequest};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::ScenarioEngine;

#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

struct HttpApiError(ApiError);

impl From<ApiError> for HttpApiError {
    fn from(value: ApiError) -> Self {
        Self(value)
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (status_for(self.0.error), Json(self.0)).into_response()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadInput => StatusCode::BAD_REQUEST,
        ErrorKind::UnknownScenario | ErrorKind::MissingAnchor => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn serve(addr: SocketAddr, engine: Arc<ScenarioEngine>) -> Result<(), ServerError> {
    let app = router(engine);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "scenario engine listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(engine: Arc<ScenarioEngine>) -> Router {
    Router::new()
        .route("/api/scenario/prepare", post(prepare))
        .route("/api/scenario/prepared", get(list_prepared))
        .route("/api/scenario/prepared/{instance_id}", get(describe_prepared))
        .route(
            "/api/scenario/prepared/{instance_id}/timeline",
            get(timeline),
        )
        .route("/api/sim/start", post(sim_start))
        .route("/api/sim/state", get(sim_state))
        .route("/api/sim/tick", get(sim_tick))
        .route("/api/dependencies/chain", get(dependency_chain))
        .route("/api/dependencies/graph", get(dependency_graph))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(engine)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
}

async fn prepare(
    State(engine): State<Arc<ScenarioEngine>>,
    Json(request): Json<PrepareRequest>,
) -> Result<impl IntoResponse, HttpApiError> {
    let summary = engine.prepare(&request)?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize, Default)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_prepared(
    State(engine): State<Arc<ScenarioEngine>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, HttpApiError> {
    let instances = engine.list_prepared(query.limit)?;
    Ok(Json(serde_json::json!({ "instances": instances })))
}

async fn describe_prepared(
    State(engine): State<Arc<ScenarioEngine>>,
    Path(instance_id): Path<String>,
) -> Result<impl IntoResponse, HttpApiError> {
    let detail = engine.describe_prepared(&instance_id)?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize, Default)]
struct TimelineQuery {
    bucket_ticks: Option<u32>,
}

async fn timeline(
    State(engine): State<Arc<ScenarioEngine>>,
    Path(instance_id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<impl IntoResponse, HttpApiError> {
    let buckets = engine.timeline(&instance_id, query.bucket_ticks)?;
    Ok(Json(serde_json::json!({ "buckets": buckets })))
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    scenario_instance_id: String,
}

async fn sim_start(
    State(engine): State<Arc<ScenarioEngine>>,
    Json(request): Json<StartRequest>,
) -> Result<impl IntoResponse, HttpApiError> {
    let state = engine.start(&request.scenario_instance_id)?;
    Ok(Json(state))
}

#[derive(Debug, Deserialize)]
struct RunStateQuery {
    sim_run_id: String,
}

async fn sim_state(
    State(engine): State<Arc<ScenarioEngine>>,
    Query(query): Query<RunStateQuery>,
) -> Result<impl IntoResponse, HttpApiError> {
    let state = engine.run_state(&query.sim_run_id)?;
    Ok(Json(state))
}

#[derive(Debug, Deserialize)]
struct RunTickQuery {
    sim_run_id: String,
    tick_index: u32,
}

async fn sim_tick(
    State(engine): State<Arc<ScenarioEngine>>,
    Query(query): Query<RunTickQuery>,
) -> Result<impl IntoResponse, HttpApiError> {
    let poll = engine.run_tick(&query.sim_run_id, query.tick_index)?;
    Ok(Json(poll))
}

#[derive(Debug, Deserialize)]
struct ChainQuery {
    asset_id: String,
    direction: String,
    max_depth: Option<u32>,
}

async fn dependency_chain(
    State(engine): State<Arc<ScenarioEngine>>,
    Query(query): Query<ChainQuery>,
) -> Result<impl IntoResponse, HttpApiError> {
    let direction = Direction::parse(&query.direction).ok_or_else(|| {
        HttpApiError(ApiError::bad_input(format!(
            "direction must be upstream or downstream, got '{}'",
            query.direction
        )))
    })?;
    let max_depth = query.max_depth.unwrap_or(contracts::chain::MAX_CHAIN_DEPTH);
    let response = engine.chain(&query.asset_id, direction, max_depth)?;
    Ok(Json(response))
}

async fn dependency_graph(
    State(engine): State<Arc<ScenarioEngine>>,
) -> Result<impl IntoResponse, HttpApiError> {
    let graph = engine.graph()?;
    Ok(Json(graph))
}
