use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Cause tags carried on every death record.
pub mod cause {
    pub const VILLAIN: &str = "villain";
    pub const WITCH: &str = "witch";
    pub const BODYGUARD_SACRIFICE: &str = "bodyguard_sacrifice";
    pub const LYNCHED: &str = "lynched";
    pub const HEARTBREAK: &str = "heartbreak";
    pub const JUNIOR_CURSE: &str = "junior_curse";
    pub const PLAGUE: &str = "plague";
    pub const SHERIFF_SHOT: &str = "sheriff_shot";
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeathRecord {
    pub victim_id: String,
    pub cause: String,
    /// Who is answerable for the death: a single id or, for the villain
    /// aggregate, every voter behind it.
    pub responsible: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RevivalRecord {
    pub target_id: String,
    pub reviver_id: String,
}

/// Declared winner set, produced exactly once per match.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchOutcome {
    pub title: String,
    pub faction: String,
    pub reason: String,
    pub winner_ids: Vec<String>,
}

/// What one resolver run produced: deaths, revivals, the message fragments
/// the presentation layer forwards, and a terminal outcome when the resolver
/// itself concluded the match.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub deaths: Vec<DeathRecord>,
    pub revivals: Vec<RevivalRecord>,
    pub private_messages: HashMap<String, Vec<String>>,
    pub public_messages: Vec<String>,
    pub plague_kill_count: usize,
    pub match_outcome: Option<MatchOutcome>,
}

impl OutcomeReport {
    pub fn push_private(&mut self, player_id: &str, message: impl Into<String>) {
        self.private_messages
            .entry(player_id.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn push_public(&mut self, message: impl Into<String>) {
        self.public_messages.push(message.into());
    }

    pub fn is_match_over(&self) -> bool {
        self.match_outcome.is_some()
    }
}
