use serde::{Deserialize, Serialize};

use super::role::Role;

/// Roster entry of a room before the match starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub is_ready: bool,
}

impl Player {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            is_ready: false,
        }
    }
}

/// Per-player record of a running match. Created when the match starts and
/// never removed: elimination flips `is_alive`, dead players may keep acting
/// as ghosts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub is_alive: bool,
    pub is_ghost: bool,
    /// The medium this ghost is bound to.
    pub ghost_master_id: Option<String>,
    // Nightly modifiers, cleared when the night resolves.
    pub is_confused: bool,
    pub is_corrupted: bool,
    pub protected_by: Option<String>,
    // Cross-night state.
    pub bodyguard_hits_survived: u8,
    pub possession_points: u8,
    pub is_infected: bool,
}

impl PlayerState {
    pub fn new(id: String, name: String, role: Role) -> Self {
        Self {
            id,
            name,
            role,
            is_alive: true,
            is_ghost: false,
            ghost_master_id: None,
            is_confused: false,
            is_corrupted: false,
            protected_by: None,
            bodyguard_hits_survived: 0,
            possession_points: 0,
            is_infected: false,
        }
    }

    pub fn kill(&mut self) {
        self.is_alive = false;
    }

    pub fn revive(&mut self) {
        self.is_alive = true;
    }

    pub fn clear_nightly_modifiers(&mut self) {
        self.is_confused = false;
        self.is_corrupted = false;
        self.protected_by = None;
    }
}
