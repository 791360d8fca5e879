use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use evac_core::serde_utils::from_json_bytes;
use evac_protocol::evacuation::{
    ArrivalReport, ArrivalUpdate, EndSessionRequest, EvacuationSession, NewSessionRequest,
    RosterRow,
};
use evac_protocol::scan::ScanOutcome;
use serde::de::DeserializeOwned;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::arrival::apply_arrivals;
use crate::config::ServiceSettings;
use crate::error::{AppError, AppResult};
use crate::ingest::ingest_feed;
use crate::roster::{read_roster, RosterSelector};
use crate::session::{end_session, start_session, SessionStart};
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    storage: Arc<dyn Storage>,
    settings: Arc<ServiceSettings>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, settings: ServiceSettings) -> Self {
        Self {
            storage,
            settings: Arc::new(settings),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/cisco", get(validator).post(ingest))
        .route("/api/evacuations", post(create_evacuation))
        .route("/api/evacuations/:evacuation_id/end", post(finish_evacuation))
        .route("/api/people-on-evacuation/:evacuation_id", get(people_on_evacuation))
        .route("/api/evacuation-beacons", post(record_arrivals))
        .route("/api/purge-scanned-beacons", get(purge_scanned_beacons))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

async fn validator(State(state): State<AppState>) -> String {
    state.settings.validator_key.clone()
}

async fn ingest(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Vec<ScanOutcome>>> {
    let outcomes = ingest_feed(state.storage.clone(), &body, state.settings.scan_deadline).await?;
    Ok(Json(outcomes))
}

async fn create_evacuation(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let request: NewSessionRequest = decode_json(&body)?;
    let response = match start_session(state.storage.as_ref(), request.worksite, Utc::now()).await? {
        SessionStart::AlreadyActive(active) => (StatusCode::OK, Json(active)).into_response(),
        SessionStart::Started(started) => (StatusCode::CREATED, Json(started)).into_response(),
    };
    Ok(response)
}

async fn finish_evacuation(
    State(state): State<AppState>,
    Path(evacuation_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<EvacuationSession>> {
    let request: EndSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        EndSessionRequest::default()
    } else {
        decode_json(&body)?
    };
    let ended_at = request.end_date.unwrap_or_else(Utc::now);
    let session = end_session(state.storage.as_ref(), evacuation_id, ended_at).await?;
    Ok(Json(session))
}

async fn people_on_evacuation(
    State(state): State<AppState>,
    Path(evacuation_id): Path<String>,
) -> AppResult<Json<Vec<RosterRow>>> {
    let selector: RosterSelector = evacuation_id.parse()?;
    let rows = read_roster(state.storage.as_ref(), selector).await?;
    Ok(Json(rows))
}

async fn record_arrivals(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<Vec<ArrivalReport>>> {
    let updates: Vec<ArrivalUpdate> = decode_json(&body)?;
    let unresolved = apply_arrivals(state.storage.as_ref(), &updates, Utc::now()).await;
    Ok(Json(unresolved))
}

async fn purge_scanned_beacons() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({ "error": "purging scanned beacons is handled by housekeeping" })),
    )
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    from_json_bytes(body).map_err(|err| AppError::bad_request(format!("invalid request body: {err}")))
}
