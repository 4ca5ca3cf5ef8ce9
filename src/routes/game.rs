use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::services::game_service::{
    self, AbilityRequest, GameError, NightActionRequest,
};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteAction {
    voter_id: String,
    target_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SkipAction {
    voter_id: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/:roomid",
            Router::new()
                .route("/start", post(start_game))
                .route("/state", get(get_game_state))
                .route("/living", get(get_living_players))
                .route("/role/:playerid", get(get_player_role))
                .nest(
                    "/actions",
                    Router::new()
                        .route("/night", post(night_action_handler))
                        .route("/vote", post(cast_vote_handler))
                        .route("/skip", post(skip_vote_handler))
                        .route("/day", post(day_ability_handler)),
                )
                .route("/phase/next", post(advance_phase_handler)),
        )
        .with_state(state)
}

fn error_status(error: &GameError) -> StatusCode {
    match error {
        GameError::RoomNotFound | GameError::GameNotFound | GameError::PlayerNotFound => {
            StatusCode::NOT_FOUND
        }
        GameError::GameAlreadyStarted
        | GameError::GameFinished
        | GameError::InvalidPhase(_) => StatusCode::CONFLICT,
        GameError::NotAlive
        | GameError::NotAGhost
        | GameError::WrongRole
        | GameError::AbilityUnavailable(_)
        | GameError::InvalidTarget(_)
        | GameError::BadPlayerCount { .. } => StatusCode::BAD_REQUEST,
    }
}

pub async fn start_game(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    match game_service::start_game(state, room_id).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

pub async fn get_game_state(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match game_service::get_game_view(state, room_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

async fn night_action_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(action_req): Json<NightActionRequest>,
) -> impl IntoResponse {
    match game_service::submit_night_action(state, room_id, action_req).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

async fn cast_vote_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(vote): Json<VoteAction>,
) -> impl IntoResponse {
    match game_service::day_vote(state, room_id, vote.voter_id, vote.target_id).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

async fn skip_vote_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(skip): Json<SkipAction>,
) -> impl IntoResponse {
    match game_service::day_skip(state, room_id, skip.voter_id).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

async fn get_living_players(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match game_service::get_living_players(state, room_id).await {
        Ok(living) => (StatusCode::OK, Json(living)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

async fn get_player_role(
    Path((room_id, player_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match game_service::get_player_role(state, room_id, player_id).await {
        Ok(card) => (StatusCode::OK, Json(card)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

async fn day_ability_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(ability_req): Json<AbilityRequest>,
) -> impl IntoResponse {
    match game_service::use_ability(state, room_id, ability_req).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}

async fn advance_phase_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    match game_service::advance_phase(state, room_id).await {
        Ok(advance) => (StatusCode::OK, Json(advance)).into_response(),
        Err(e) => (error_status(&e), Json(e.to_string())).into_response(),
    }
}
