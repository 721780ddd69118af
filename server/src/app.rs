use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_linkngo_io::SocketIoUpgrade;
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

use crate::{
    config::Config,
    room::RoomHandle,
    socket::{self, ConnectionIds},
};

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomHandle,
    pub ids: ConnectionIds,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(rooms: RoomHandle, config: Config) -> Self {
        Self {
            rooms,
            ids: ConnectionIds::default(),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "LinknGo realtime server is running" }))
        .route("/socket", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: SocketIoUpgrade,
) -> Response {
    let origin = ws.origin().and_then(|value| value.to_str().ok());
    if !state.config.client_origin.allows(origin) {
        warn!(%addr, ?origin, "origin not allowed");
        return StatusCode::FORBIDDEN.into_response();
    }

    let id = state.ids.next();
    let rooms = state.rooms.clone();
    ws.on_upgrade(state.config.socket_buffer, move |socket| {
        socket::handle_socket(socket, rooms, id, addr)
    })
}
