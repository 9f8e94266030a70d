//! Management and query endpoint handlers.

use crate::gateway::AppState;
use crate::stats;
use crate::store::StoreError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

fn store_error(e: StoreError) -> ApiError {
    let status = match e {
        StoreError::SequenceExhausted(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log::error!("❌ Request failed: {}", e);
    (status, Json(json!({"error": e.to_string()})))
}

fn bad_request(msg: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg})))
}

/// Gift ids arrive as JSON numbers or strings depending on the client;
/// normalize both to the string key the price table uses.
fn gift_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
pub struct SetPriceRequest {
    pub id: Value,
    pub price: f64,
}

pub async fn set_price(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetPriceRequest>,
) -> ApiResult {
    let key = gift_key(&request.id).ok_or_else(|| bad_request("id must be a string or number"))?;
    state
        .prices
        .set_price(&key, request.price)
        .map_err(|e| bad_request(&e.to_string()))?;
    Ok(Json(json!({"success": true})))
}

pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(gift_id): Path<String>,
) -> ApiResult {
    Ok(Json(json!({
        "id": gift_id,
        "price": state.prices.get_price(&gift_id),
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRoomRequest {
    pub room_id: String,
    pub name: Option<String>,
    pub address: Option<String>,
}

pub async fn save_room(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveRoomRequest>,
) -> ApiResult {
    if request.room_id.trim().is_empty() {
        return Err(bad_request("roomId must not be empty"));
    }
    let room = state
        .rooms
        .upsert_room(
            &request.room_id,
            request.name.as_deref(),
            request.address.as_deref(),
        )
        .map_err(store_error)?;
    Ok(Json(json!({"success": true, "room": room})))
}

pub async fn list_rooms(State(state): State<Arc<AppState>>) -> ApiResult {
    let rooms = state.rooms.list_rooms().map_err(store_error)?;
    Ok(Json(json!(rooms)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub room_id: String,
    pub snapshot: Value,
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EndSessionRequest>,
) -> ApiResult {
    let session_id = state
        .sessions
        .create_session(&request.room_id, &request.snapshot)
        .map_err(store_error)?;
    Ok(Json(json!({"success": true, "sessionId": session_id})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsQuery {
    pub room_id: Option<String>,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionsQuery>,
) -> ApiResult {
    let sessions = state
        .sessions
        .list_sessions(query.room_id.as_deref())
        .map_err(store_error)?;
    Ok(Json(json!(sessions)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult {
    match state.sessions.get_session(&session_id).map_err(store_error)? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err((StatusCode::NOT_FOUND, Json(json!({"error": "Not found"})))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub room_id: String,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let events = state
        .events
        .events_for_room(&query.room_id)
        .map_err(store_error)?;
    let buckets = stats::aggregate(&events, &state.prices.snapshot());
    Ok(Json(json!(buckets)))
}
