//! HTTP + WebSocket surface over the core: management/query routes plus the
//! real-time notification channel.

pub mod http;
pub mod ws;

use crate::bridge::ConnectionSupervisor;
use crate::prices::PriceTable;
use crate::store::{EventStore, RoomStore, SessionRegistry};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub struct AppState {
    pub supervisor: ConnectionSupervisor,
    pub rooms: RoomStore,
    pub sessions: SessionRegistry,
    pub events: EventStore,
    pub prices: PriceTable,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/price", post(http::set_price))
        .route("/api/price/{gift_id}", get(http::get_price))
        .route("/api/rooms", post(http::save_room).get(http::list_rooms))
        .route("/api/sessions/end", post(http::end_session))
        .route("/api/sessions", get(http::list_sessions))
        .route("/api/sessions/{session_id}", get(http::get_session))
        .route("/api/history", get(http::history))
        .route("/ws", get(ws::websocket_handler))
        .with_state(state)
}
