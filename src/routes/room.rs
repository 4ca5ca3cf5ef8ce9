use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{services::room_service, state::AppState, utils::websocket};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CreateRoomRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct JoinRoomRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyRequest {
    pub ready: bool,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        // curl -X POST http://localhost:8080/api/room/create
        .route("/create", post(create_room))
        // curl http://localhost:8080/api/room/rooms
        .route("/rooms", get(get_rooms))
        // curl http://localhost:8080/api/room/{roomid}
        .route("/:roomid", get(get_room_info))
        // curl -X POST http://localhost:8080/api/room/{roomid}/join/{playerid}
        .route("/:roomid/join/:playerid", post(join_room))
        // curl -X POST http://localhost:8080/api/room/{roomid}/leave/{playerid}
        .route("/:roomid/leave/:playerid", post(leave_room))
        .route("/:roomid/ready/:playerid", post(set_ready))
        // curl -X DELETE http://localhost:8080/api/room/{roomid}/delete
        .route("/:roomid/delete", delete(delete_room))
        // websocat ws://localhost:8080/api/room/{roomid}/ws
        .route("/:roomid/ws", get(websocket::handler))
        .with_state(state)
}

pub async fn create_room(
    State(state): State<AppState>,
    body: Option<Json<CreateRoomRequest>>,
) -> impl IntoResponse {
    let name = body.and_then(|Json(req)| req.name);
    let room_id = room_service::create_room(state, name).await;
    (
        StatusCode::OK,
        Json(format!("Room created with ID: {}", room_id)),
    )
}

async fn get_rooms(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = room_service::get_rooms(&state).await;
    (StatusCode::OK, Json(rooms))
}

async fn get_room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    match room_service::get_room_info(&state, &room_id).await {
        Some(room) => (StatusCode::OK, Json(room)).into_response(),
        None => (StatusCode::NOT_FOUND, Json("Room not found")).into_response(),
    }
}

pub async fn join_room(
    State(state): State<AppState>,
    Path((room_id, player_id)): Path<(String, String)>,
    body: Option<Json<JoinRoomRequest>>,
) -> impl IntoResponse {
    let name = body.and_then(|Json(req)| req.name);
    let success = room_service::join_room(state, &room_id, &player_id, name).await;
    if success {
        (StatusCode::OK, Json("Successfully joined room"))
    } else {
        (StatusCode::BAD_REQUEST, Json("Failed to join room"))
    }
}

pub async fn leave_room(
    State(state): State<AppState>,
    Path((room_id, player_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let success = room_service::leave_room(state, &room_id, &player_id).await;
    if success {
        (StatusCode::OK, Json("Successfully left room"))
    } else {
        (StatusCode::BAD_REQUEST, Json("Failed to leave room"))
    }
}

async fn set_ready(
    State(state): State<AppState>,
    Path((room_id, player_id)): Path<(String, String)>,
    Json(req): Json<ReadyRequest>,
) -> impl IntoResponse {
    let success = room_service::set_ready(state, &room_id, &player_id, req.ready).await;
    if success {
        (StatusCode::OK, Json("Ready state updated"))
    } else {
        (StatusCode::BAD_REQUEST, Json("Failed to update ready state"))
    }
}

async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    let success = room_service::delete_room(state, &room_id).await;
    if success {
        (
            StatusCode::OK,
            Json(format!("Room {} deleted successfully", room_id)),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(format!("Failed to delete room {}", room_id)),
        )
    }
}
