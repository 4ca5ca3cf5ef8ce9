use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use town_sleeps::{app, utils::test_setup};

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_create_room() {
    test_setup::setup_test_env();
    let app = app::create_app();

    let response = app.oneshot(post("/api/room/create")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Room created with ID:"));
}

#[tokio::test]
async fn test_join_room() {
    test_setup::setup_test_env();
    let app = app::create_app();

    let create_response = app.clone().oneshot(post("/api/room/create")).await.unwrap();
    assert_eq!(create_response.status(), StatusCode::OK);
    let body_str = body_string(create_response).await;
    let room_id = body_str
        .replace("\"Room created with ID: ", "")
        .replace('"', "");

    let join_response = app
        .clone()
        .oneshot(post(&format!("/api/room/{}/join/alice", room_id)))
        .await
        .unwrap();
    assert_eq!(join_response.status(), StatusCode::OK);

    // Joining twice with the same id fails.
    let rejoin_response = app
        .oneshot(post(&format!("/api/room/{}/join/alice", room_id)))
        .await
        .unwrap();
    assert_eq!(rejoin_response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_game_requires_enough_players() {
    test_setup::setup_test_env();
    let app = app::create_app();

    let create_response = app.clone().oneshot(post("/api/room/create")).await.unwrap();
    let body_str = body_string(create_response).await;
    let room_id = body_str
        .replace("\"Room created with ID: ", "")
        .replace('"', "");

    for player in ["alice", "bob"] {
        let response = app
            .clone()
            .oneshot(post(&format!("/api/room/{}/join/{}", room_id, player)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let start_response = app
        .oneshot(post(&format!("/api/game/{}/start", room_id)))
        .await
        .unwrap();
    assert_eq!(start_response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_game_and_open_first_night() {
    test_setup::setup_test_env();
    let app = app::create_app();

    let create_response = app.clone().oneshot(post("/api/room/create")).await.unwrap();
    let body_str = body_string(create_response).await;
    let room_id = body_str
        .replace("\"Room created with ID: ", "")
        .replace('"', "");

    for player in ["alice", "bob", "carol", "dave", "erin"] {
        let response = app
            .clone()
            .oneshot(post(&format!("/api/room/{}/join/{}", room_id, player)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let start_response = app
        .clone()
        .oneshot(post(&format!("/api/game/{}/start", room_id)))
        .await
        .unwrap();
    assert_eq!(start_response.status(), StatusCode::OK);

    // A second start is rejected.
    let restart_response = app
        .clone()
        .oneshot(post(&format!("/api/game/{}/start", room_id)))
        .await
        .unwrap();
    assert_eq!(restart_response.status(), StatusCode::CONFLICT);

    let state_request = Request::builder()
        .method("GET")
        .uri(format!("/api/game/{}/state", room_id))
        .body(Body::empty())
        .unwrap();
    let state_response = app.clone().oneshot(state_request).await.unwrap();
    assert_eq!(state_response.status(), StatusCode::OK);
    let view: serde_json::Value =
        serde_json::from_str(&body_string(state_response).await).unwrap();
    assert_eq!(view["phase"], "Preparing");
    assert_eq!(view["players"].as_array().unwrap().len(), 5);
    // Living players keep their roles hidden.
    assert!(view["players"][0]["role"].is_null());

    let advance_response = app
        .clone()
        .oneshot(post(&format!("/api/game/{}/phase/next", room_id)))
        .await
        .unwrap();
    assert_eq!(advance_response.status(), StatusCode::OK);
    let advance: serde_json::Value =
        serde_json::from_str(&body_string(advance_response).await).unwrap();
    assert_eq!(advance["phase"], "Night");

    // Day votes are rejected at night.
    let vote_response = app
        .oneshot(post_json(
            &format!("/api/game/{}/actions/vote", room_id),
            json!({"voter_id": "alice", "target_id": "bob"}),
        ))
        .await
        .unwrap();
    assert_eq!(vote_response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_night_action_from_unknown_player() {
    test_setup::setup_test_env();
    let app = app::create_app();

    let create_response = app.clone().oneshot(post("/api/room/create")).await.unwrap();
    let body_str = body_string(create_response).await;
    let room_id = body_str
        .replace("\"Room created with ID: ", "")
        .replace('"', "");

    for player in ["alice", "bob", "carol", "dave"] {
        app.clone()
            .oneshot(post(&format!("/api/room/{}/join/{}", room_id, player)))
            .await
            .unwrap();
    }
    app.clone()
        .oneshot(post(&format!("/api/game/{}/start", room_id)))
        .await
        .unwrap();
    app.clone()
        .oneshot(post(&format!("/api/game/{}/phase/next", room_id)))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/api/game/{}/actions/night", room_id),
            json!({"player_id": "mallory", "action": "villain_vote", "target_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_game_state_for_missing_game() {
    test_setup::setup_test_env();
    let state = town_sleeps::state::AppState::new();
    let app = app::create_app_with_state(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/game/999/state")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
