use std::collections::HashMap;

use log::info;

use crate::{
    models::{
        player::Player,
        room::{Room, RoomStatus},
    },
    state::AppState,
};

pub async fn create_room(state: AppState, name: Option<String>) -> u32 {
    let mut rooms = state.rooms.lock().await;
    let new_id = rooms
        .keys()
        .filter_map(|k| k.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    let new_room = Room::new(new_id.to_string(), name, None);
    rooms.insert(new_id.to_string(), new_room);
    info!("room {} created", new_id);
    new_id
}

pub async fn join_room(
    state: AppState,
    room_id: &str,
    player_id: &str,
    player_name: Option<String>,
) -> bool {
    let mut rooms = state.rooms.lock().await;

    if let Some(room) = rooms.get_mut(room_id) {
        if room.status != RoomStatus::Open {
            return false;
        }
        if room.players.len() >= room.max_players {
            return false;
        }
        if room.players.iter().any(|p| p.id == player_id) {
            return false;
        }

        let name = player_name.unwrap_or_else(|| format!("Player {}", player_id));
        room.players.push(Player::new(player_id.to_string(), name));
        true
    } else {
        false
    }
}

pub async fn leave_room(state: AppState, room_id: &str, player_id: &str) -> bool {
    let mut rooms = state.rooms.lock().await;

    if let Some(room) = rooms.get_mut(room_id) {
        // No leaving mid-match; elimination is the only way out.
        if room.status != RoomStatus::Open {
            return false;
        }
        let player_index = room.players.iter().position(|p| p.id == player_id);
        if let Some(index) = player_index {
            room.players.remove(index);
            true
        } else {
            false
        }
    } else {
        false
    }
}

pub async fn set_ready(state: AppState, room_id: &str, player_id: &str, ready: bool) -> bool {
    let mut rooms = state.rooms.lock().await;
    if let Some(room) = rooms.get_mut(room_id) {
        if let Some(player) = room.players.iter_mut().find(|p| p.id == player_id) {
            player.is_ready = ready;
            return true;
        }
    }
    false
}

pub async fn get_rooms(state: &AppState) -> HashMap<String, Room> {
    state.rooms.lock().await.clone()
}

pub async fn get_room_info(state: &AppState, room_id: &str) -> Option<Room> {
    let rooms = state.rooms.lock().await;
    rooms.get(room_id).cloned()
}

pub async fn delete_room(state: AppState, room_id: &str) -> bool {
    let mut rooms = state.rooms.lock().await;
    let removed = rooms.remove(room_id).is_some();
    if removed {
        state.games.lock().await.remove(room_id);
    }
    removed
}
