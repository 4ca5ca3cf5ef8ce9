use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
struct WebSocketMessage {
    message_type: String,
    player_id: String,
    player_name: String,
    content: String,
    room_id: String,
}

pub async fn handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.clone(), room_id))
}

pub async fn handle_socket(ws: WebSocket, state: AppState, room_id: String) {
    info!("New WebSocket connection established for room: {}", room_id);
    let tx = state.get_or_create_room_channel(&room_id).await;

    let (mut sender, mut receiver) = ws.split();
    let mut rx = tx.subscribe();

    // Pump room broadcasts out to this client.
    let mut send_task = tokio::spawn(async move {
        while let Ok(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Relay this client's chat into the room channel.
    let tx_in = tx.clone();
    let room_id_in = room_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = receiver.next().await {
            let Ok(mut message) = serde_json::from_str::<WebSocketMessage>(&text) else {
                continue;
            };
            message.room_id = room_id_in.clone();
            let payload = serde_json::json!({
                "message_type": "chat",
                "player_id": message.player_id,
                "player_name": message.player_name,
                "content": message.content,
                "room_id": message.room_id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            });
            if let Ok(text) = serde_json::to_string(&payload) {
                let _ = tx_in.send(Message::Text(text));
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!("WebSocket connection closed for room: {}", room_id);
}
