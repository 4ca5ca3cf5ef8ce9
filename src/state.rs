use axum::extract::ws::Message;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::models::{game::Game, outcome::OutcomeReport, room::Room};

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<Mutex<HashMap<String, Room>>>,
    pub games: Arc<Mutex<HashMap<String, Game>>>,
    pub channel: Arc<Mutex<HashMap<String, broadcast::Sender<Message>>>>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            games: Arc::new(Mutex::new(HashMap::new())),
            channel: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get_or_create_room_channel(&self, room_id: &str) -> broadcast::Sender<Message> {
        let mut channels = self.channel.lock().await;
        if let Some(channel) = channels.get(room_id) {
            channel.clone()
        } else {
            let (tx, _) = broadcast::channel(1000);
            channels.insert(room_id.to_string(), tx.clone());
            tx
        }
    }

    pub async fn broadcast_phase_change(
        &self,
        room_id: &str,
        from_phase: &str,
        to_phase: &str,
    ) -> Result<(), String> {
        let tx = self.get_or_create_room_channel(room_id).await;

        let phase_notification = serde_json::json!({
            "id": Uuid::new_v4().to_string(),
            "message_type": "phase_change",
            "from_phase": from_phase,
            "to_phase": to_phase,
            "room_id": room_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Ok(message_text) = serde_json::to_string(&phase_notification) {
            // Nobody listening is fine; the lobby may be HTTP-only.
            let _ = tx.send(Message::Text(message_text));
        }

        Ok(())
    }

    /// Fans out one resolution report: announcements to the whole room,
    /// private lines tagged with their recipient so the client filters.
    pub async fn broadcast_report(&self, room_id: &str, report: &OutcomeReport) {
        let tx = self.get_or_create_room_channel(room_id).await;

        for message in &report.public_messages {
            let notification = serde_json::json!({
                "id": Uuid::new_v4().to_string(),
                "message_type": "announcement",
                "content": message,
                "room_id": room_id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            });
            if let Ok(text) = serde_json::to_string(&notification) {
                let _ = tx.send(Message::Text(text));
            }
        }

        for (player_id, messages) in &report.private_messages {
            for message in messages {
                let notification = serde_json::json!({
                    "id": Uuid::new_v4().to_string(),
                    "message_type": "private_message",
                    "content": message,
                    "target_player_id": player_id,
                    "room_id": room_id,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                if let Ok(text) = serde_json::to_string(&notification) {
                    let _ = tx.send(Message::Text(text));
                }
            }
        }

        if let Some(outcome) = &report.match_outcome {
            let notification = serde_json::json!({
                "id": Uuid::new_v4().to_string(),
                "message_type": "match_outcome",
                "outcome": outcome,
                "room_id": room_id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            });
            if let Ok(text) = serde_json::to_string(&notification) {
                let _ = tx.send(Message::Text(text));
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
