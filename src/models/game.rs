use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::player::PlayerState;
use super::role::{Faction, Role};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum GamePhase {
    Preparing,
    Night,
    DayDiscussion,
    DayVoting,
    Showdown,
    Finished,
}

/// Current decision inside the final-day confrontation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum ShowdownStage {
    SheriffShots,
    VillainAttack,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NightActionKind {
    Haunt,
    CupidMatch,
    Corrupt,
    Confuse,
    Protect,
    WitchKill,
    VillainVote,
    PlagueExterminate,
    AngelRevive,
    WitchRevive,
    MarkDetective,
    FirstNightTarget,
    Possess,
}

impl NightActionKind {
    /// Fixed priority band per action class, lower resolves earlier.
    /// This ordering is load-bearing: protection must land before kills,
    /// kills before revivals, and so on.
    pub fn priority(&self) -> u8 {
        match self {
            NightActionKind::Haunt => 5,
            NightActionKind::CupidMatch => 10,
            NightActionKind::Corrupt => 15,
            NightActionKind::Confuse => 16,
            NightActionKind::Protect => 20,
            NightActionKind::WitchKill => 25,
            NightActionKind::VillainVote => 30,
            NightActionKind::PlagueExterminate => 35,
            NightActionKind::AngelRevive | NightActionKind::WitchRevive => 40,
            NightActionKind::MarkDetective => 60,
            NightActionKind::FirstNightTarget => 70,
            NightActionKind::Possess => 90,
        }
    }

    pub fn is_revive(&self) -> bool {
        matches!(
            self,
            NightActionKind::AngelRevive | NightActionKind::WitchRevive
        )
    }
}

/// One declared night intent. At most one per actor; resubmitting replaces
/// the previous one (last write wins).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NightAction {
    pub kind: NightActionKind,
    pub role: Role,
    pub priority: u8,
    /// Registration order, the stable tie-break within a priority band.
    pub seq: u64,
    /// Single target; the only field that generates a "visit".
    pub target_id: Option<String>,
    /// Detective marks (one or two).
    pub marks: Vec<String>,
    /// Cupid's chosen pair.
    pub lovers: Option<(String, String)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeadhunterContract {
    pub hunter_id: String,
    pub target_id: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MajorActionKind {
    Kill,
    Revive,
}

/// A kill or revival that actually landed, kept for the witch's
/// "bet correctly" secondary win.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MajorAction {
    pub actor_id: String,
    pub kind: MajorActionKind,
    pub target_id: String,
}

/// Authoritative state of one match. Owned exclusively by its room entry in
/// the registry; every resolver runs single-threaded against it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    pub room_id: String,
    /// Join order; iteration order is never rule-relevant.
    pub players: Vec<PlayerState>,
    pub phase: GamePhase,
    pub current_night: u32,
    pub current_day: u32,

    pub night_actions: HashMap<String, NightAction>,
    next_action_seq: u64,
    pub day_votes: HashMap<String, String>,
    pub day_skip_votes: HashSet<String>,

    // One-shot flags, each flippable once per match.
    pub decree_used: bool,
    pub decree_active: bool,
    pub sabotage_used: bool,
    pub sabotage_blocked: bool,
    pub fraud_used: bool,
    pub fraud_active: bool,
    pub witch_potion_used: bool,
    pub angel_revive_used: bool,
    pub medium_talk_used: bool,
    pub plague_exterminate_used: bool,
    pub mayor_pardon_used: bool,

    /// Possession this night suppresses the villain aggregate kill.
    pub skip_villain_kill: bool,
    pub lovers: Option<(String, String)>,
    pub headhunter: Option<HeadhunterContract>,
    /// Match outcome deferred until the next night's revival chance.
    pub pending_resolution: bool,

    pub sheriff_shots_fired: u8,
    pub sheriff_shot_this_day: bool,
    pub sheriff_revealed: bool,
    pub showdown: Option<ShowdownStage>,

    pub plague_player_id: Option<String>,
    pub plague_patient_zero_id: Option<String>,
    pub junior_marked_target_id: Option<String>,
    pub gossip_marked_target_id: Option<String>,
    pub gossip_comparisons: HashMap<String, u8>,

    // Same target two nights running is not allowed for these abilities.
    pub last_protected_target: HashMap<String, String>,
    pub last_corrupted_target: HashMap<String, String>,
    pub last_confused_target: HashMap<String, String>,

    pub killers: HashMap<String, Vec<String>>,
    pub death_reasons: HashMap<String, String>,
    pub first_death_id: Option<String>,
    pub successful_major_actions: Vec<MajorAction>,

    /// Bumped whenever a phase transition is forced; a timer carrying a
    /// stale generation is a no-op.
    pub timer_generation: u64,
}

impl Game {
    pub fn new(room_id: String, players: Vec<PlayerState>) -> Self {
        let plague_player_id = players
            .iter()
            .find(|p| p.role == Role::Plague)
            .map(|p| p.id.clone());
        Game {
            room_id,
            players,
            phase: GamePhase::Preparing,
            current_night: 0,
            current_day: 0,
            night_actions: HashMap::new(),
            next_action_seq: 0,
            day_votes: HashMap::new(),
            day_skip_votes: HashSet::new(),
            decree_used: false,
            decree_active: false,
            sabotage_used: false,
            sabotage_blocked: false,
            fraud_used: false,
            fraud_active: false,
            witch_potion_used: false,
            angel_revive_used: false,
            medium_talk_used: false,
            plague_exterminate_used: false,
            mayor_pardon_used: false,
            skip_villain_kill: false,
            lovers: None,
            headhunter: None,
            pending_resolution: false,
            sheriff_shots_fired: 0,
            sheriff_shot_this_day: false,
            sheriff_revealed: false,
            showdown: None,
            plague_player_id,
            plague_patient_zero_id: None,
            junior_marked_target_id: None,
            gossip_marked_target_id: None,
            gossip_comparisons: HashMap::new(),
            last_protected_target: HashMap::new(),
            last_corrupted_target: HashMap::new(),
            last_confused_target: HashMap::new(),
            killers: HashMap::new(),
            death_reasons: HashMap::new(),
            first_death_id: None,
            successful_major_actions: Vec::new(),
            timer_generation: 0,
        }
    }

    pub fn get_player(&self, player_id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn get_player_mut(&mut self, player_id: &str) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(|p| p.is_alive)
    }

    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    pub fn living_villains(&self) -> Vec<&PlayerState> {
        self.alive_players()
            .filter(|p| p.role.faction() == Faction::Villains)
            .collect()
    }

    /// First player holding the given role, dead or alive.
    pub fn find_role(&self, role: Role) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.role == role)
    }

    pub fn is_night(&self) -> bool {
        self.phase == GamePhase::Night
    }

    pub fn is_day_voting(&self) -> bool {
        self.phase == GamePhase::DayVoting
    }

    /// Strict majority of the living.
    pub fn majority_needed(&self) -> usize {
        self.alive_count() / 2 + 1
    }

    pub fn sheriff_max_shots(&self) -> u8 {
        if self.players.len() <= 6 {
            1
        } else {
            2
        }
    }

    /// Upserts the actor's pending night action, keeping at most one live
    /// entry per actor. Assigns the registration sequence used as the
    /// stable tie-break during resolution.
    pub fn register_night_action(&mut self, actor_id: &str, mut action: NightAction) {
        action.seq = self.next_action_seq;
        self.next_action_seq += 1;
        self.night_actions.insert(actor_id.to_string(), action);
    }

    /// Actions sorted by (priority, registration order).
    pub fn sorted_night_actions(&self) -> Vec<(String, NightAction)> {
        let mut actions: Vec<(String, NightAction)> = self
            .night_actions
            .iter()
            .map(|(id, a)| (id.clone(), a.clone()))
            .collect();
        actions.sort_by_key(|(_, a)| (a.priority, a.seq));
        actions
    }

    /// Drains the night queue and clears every night-scoped status.
    /// `protected_by` in particular must never leak into the next night.
    pub fn clear_nightly_states(&mut self) {
        self.night_actions.clear();
        self.skip_villain_kill = false;
        for p in &mut self.players {
            p.clear_nightly_modifiers();
        }
    }

    /// Clears day intents when a new voting window opens.
    pub fn clear_daily_states(&mut self) {
        self.day_votes.clear();
        self.day_skip_votes.clear();
        self.decree_active = false;
        self.fraud_active = false;
        self.sabotage_blocked = false;
    }

    pub fn record_death(&mut self, victim_id: &str, reason: &str, responsible: Vec<String>) {
        self.death_reasons
            .insert(victim_id.to_string(), reason.to_string());
        if !responsible.is_empty() {
            self.killers.insert(victim_id.to_string(), responsible);
        }
        if self.first_death_id.is_none() {
            self.first_death_id = Some(victim_id.to_string());
        }
    }
}
