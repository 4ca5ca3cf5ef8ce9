use std::fmt;

use serde::{Deserialize, Serialize};

/// Win-condition grouping. Solo roles each carry their own objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Town,
    Villains,
    Solo,
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Town => write!(f, "Town"),
            Faction::Villains => write!(f, "Villains"),
            Faction::Solo => write!(f, "Solo"),
        }
    }
}

/// The full role catalog. Roles are plain tagged values; the resolvers
/// dispatch on capability predicates, not on per-role behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    // Town
    Mayor,
    Sheriff,
    Bodyguard,
    Angel,
    Medium,
    Detective,
    AuraSeer,
    Villager,
    // Villains
    AlphaAssassin,
    JuniorAssassin,
    Accomplice,
    SimpleAssassin,
    // Solo
    Clown,
    Gossip,
    Witch,
    Cupid,
    Plague,
    Corruptor,
    Headhunter,
}

impl Role {
    pub fn faction(&self) -> Faction {
        match self {
            Role::Mayor
            | Role::Sheriff
            | Role::Bodyguard
            | Role::Angel
            | Role::Medium
            | Role::Detective
            | Role::AuraSeer
            | Role::Villager => Faction::Town,
            Role::AlphaAssassin
            | Role::JuniorAssassin
            | Role::Accomplice
            | Role::SimpleAssassin => Faction::Villains,
            Role::Clown
            | Role::Gossip
            | Role::Witch
            | Role::Cupid
            | Role::Plague
            | Role::Corruptor
            | Role::Headhunter => Faction::Solo,
        }
    }

    pub fn is_villain(&self) -> bool {
        self.faction() == Faction::Villains
    }

    /// Participates in the nightly villain elimination vote.
    pub fn casts_villain_vote(&self) -> bool {
        self.is_villain()
    }

    /// The lead villain's vote counts double.
    pub fn has_weighted_vote(&self) -> bool {
        matches!(self, Role::AlphaAssassin)
    }

    /// Can bring a dead player back (once per match).
    pub fn can_revive(&self) -> bool {
        matches!(self, Role::Angel | Role::Witch)
    }

    /// Survives the first hit taken, from any source.
    pub fn resists_first_hit(&self) -> bool {
        matches!(self, Role::Bodyguard)
    }

    /// Locks a personal target on the first night.
    pub fn picks_first_night_target(&self) -> bool {
        matches!(
            self,
            Role::Accomplice | Role::JuniorAssassin | Role::Gossip | Role::Plague
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Mayor => "Mayor",
            Role::Sheriff => "Sheriff",
            Role::Bodyguard => "Bodyguard",
            Role::Angel => "Angel",
            Role::Medium => "Medium",
            Role::Detective => "Detective",
            Role::AuraSeer => "Aura Seer",
            Role::Villager => "Villager",
            Role::AlphaAssassin => "Alpha Assassin",
            Role::JuniorAssassin => "Junior Assassin",
            Role::Accomplice => "Accomplice",
            Role::SimpleAssassin => "Simple Assassin",
            Role::Clown => "Clown",
            Role::Gossip => "Gossip",
            Role::Witch => "Witch",
            Role::Cupid => "Cupid",
            Role::Plague => "Plague",
            Role::Corruptor => "Corruptor",
            Role::Headhunter => "Headhunter",
        }
    }

    /// One-line ability summary, sent with the role assignment.
    pub fn blurb(&self) -> &'static str {
        match self {
            Role::Mayor => "Leads the Town. Once per match: emergency decree and a lynch pardon.",
            Role::Sheriff => "Shoots a player during the day. Limited bullets.",
            Role::Bodyguard => "Protects one player each night and can absorb one hit.",
            Role::Angel => "Revives one dead player, once per match.",
            Role::Medium => "Binds one dead player to this world as a ghost, once per match.",
            Role::Detective => "Marks players at night and learns about their killers.",
            Role::AuraSeer => "Senses each night whether a player belongs to the Town.",
            Role::Villager => "No special ability. Votes wisely.",
            Role::AlphaAssassin => "Leads the Villains. Double vote, sabotage and possession.",
            Role::JuniorAssassin => "Confuses a player each night; avenges its own death.",
            Role::Accomplice => "Peeks one role on the first night and can rig a vote.",
            Role::SimpleAssassin => "A plain killer, votes with the Villains each night.",
            Role::Clown => "Wins alone by getting lynched.",
            Role::Gossip => "Compares factions and exposes a marked player on death.",
            Role::Witch => "One potion: a kill or a revival. Wins by betting well.",
            Role::Cupid => "Binds two lovers on the first night.",
            Role::Plague => "Infects through contact and can exterminate the infected.",
            Role::Corruptor => "Blocks a player's ability each night. Thrives in chaos.",
            Role::Headhunter => "Wins alone if its contract target is lynched.",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
