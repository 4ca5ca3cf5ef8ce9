use serde::{Deserialize, Serialize};

use super::role::Role;

/// Gameplay constants. Timer durations live in the server config
/// (`utils::config`); these are the rule-level numbers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSettings {
    pub min_players: usize,
    pub max_players: usize,
    /// After this many nights the match goes to the final confrontation.
    pub max_game_nights: u32,
    /// Living infected required for the plague extermination win.
    pub plague_min_infected: usize,
    /// Possession is only available in larger matches.
    pub possess_min_players: usize,
    /// Detective marks two players only above this count.
    pub detective_single_mark_max: usize,
    pub gossip_max_comparisons: u8,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            min_players: 4,
            max_players: 16,
            max_game_nights: 7,
            plague_min_infected: 4,
            possess_min_players: 11,
            detective_single_mark_max: 5,
            gossip_max_comparisons: 2,
        }
    }
}

/// Faction headcount for one player count: (town, villains, solo).
pub fn composition(num_players: usize) -> Option<(usize, usize, usize)> {
    let split = match num_players {
        4 => (3, 1, 0),
        5 => (4, 1, 0),
        6 => (4, 1, 1),
        7 => (5, 1, 1),
        8 => (5, 2, 1),
        9 => (6, 2, 1),
        10 => (6, 2, 2),
        11 => (7, 2, 2),
        12 => (7, 3, 2),
        13 => (8, 3, 2),
        14 => (8, 3, 3),
        15 => (9, 3, 3),
        16 => (9, 4, 3),
        _ => return None,
    };
    Some(split)
}

/// Town roles dealt first, in order, before the optional pool is sampled.
pub const TOWN_ESSENTIALS: &[Role] = &[Role::Mayor, Role::Sheriff, Role::Bodyguard];
/// Sampled to fill the remaining town seats; overflow becomes Villagers.
pub const TOWN_POOL: &[Role] = &[Role::Angel, Role::Detective, Role::Medium, Role::AuraSeer];

pub const VILLAIN_ESSENTIALS: &[Role] = &[Role::AlphaAssassin];
pub const VILLAIN_POOL: &[Role] = &[Role::JuniorAssassin, Role::Accomplice, Role::SimpleAssassin];

/// At most one of these per match; both win through the lynch mechanic.
pub const SOLO_EXCLUSIVES: &[Role] = &[Role::Clown, Role::Headhunter];
pub const SOLO_POOL: &[Role] = &[
    Role::Gossip,
    Role::Witch,
    Role::Cupid,
    Role::Plague,
    Role::Corruptor,
];
