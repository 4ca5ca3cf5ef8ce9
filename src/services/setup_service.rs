use log::info;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{
    config::{
        composition, GameSettings, SOLO_EXCLUSIVES, SOLO_POOL, TOWN_ESSENTIALS, TOWN_POOL,
        VILLAIN_ESSENTIALS, VILLAIN_POOL,
    },
    game::{Game, HeadhunterContract},
    outcome::OutcomeReport,
    player::{Player, PlayerState},
    role::Role,
};

use super::game_service::GameError;

/// Deals roles for one match.
///
/// Each faction headcount comes from the composition table. Essentials are
/// dealt first, the optional pools are sampled without replacement, town
/// overflow pads with Villagers, and at most one lynch-win solo (Clown or
/// Headhunter) enters the deck. The final assignment is shuffled so seat
/// order reveals nothing.
pub fn distribute_roles(
    players: &[Player],
    rng: &mut impl Rng,
) -> Result<Vec<PlayerState>, GameError> {
    let settings = GameSettings::default();
    let count = players.len();
    if count < settings.min_players || count > settings.max_players {
        return Err(GameError::BadPlayerCount {
            got: count,
            min: settings.min_players,
            max: settings.max_players,
        });
    }
    let (town_seats, villain_seats, solo_seats) =
        composition(count).ok_or(GameError::BadPlayerCount {
            got: count,
            min: settings.min_players,
            max: settings.max_players,
        })?;

    let mut roles: Vec<Role> = Vec::with_capacity(count);

    roles.extend(TOWN_ESSENTIALS.iter().copied().take(town_seats));
    let mut town_pool = TOWN_POOL.to_vec();
    town_pool.shuffle(rng);
    while roles.len() < town_seats {
        roles.push(town_pool.pop().unwrap_or(Role::Villager));
    }

    roles.extend(VILLAIN_ESSENTIALS.iter().copied().take(villain_seats));
    let mut villain_pool = VILLAIN_POOL.to_vec();
    villain_pool.shuffle(rng);
    while roles.len() < town_seats + villain_seats {
        roles.push(villain_pool.pop().unwrap_or(Role::SimpleAssassin));
    }

    let mut solo_deck = SOLO_POOL.to_vec();
    if let Some(exclusive) = SOLO_EXCLUSIVES.choose(rng) {
        solo_deck.push(*exclusive);
    }
    solo_deck.shuffle(rng);
    roles.extend(solo_deck.into_iter().take(solo_seats));

    debug_assert_eq!(roles.len(), count);
    roles.shuffle(rng);

    Ok(players
        .iter()
        .zip(roles)
        .map(|(p, role)| PlayerState::new(p.id.clone(), p.name.clone(), role))
        .collect())
}

/// Builds the game for a full room: deals roles, draws the headhunter
/// contract, and queues the opening private briefings.
pub fn create_game(
    room_id: &str,
    players: &[Player],
    rng: &mut impl Rng,
) -> Result<(Game, OutcomeReport), GameError> {
    let states = distribute_roles(players, rng)?;
    let mut game = Game::new(room_id.to_string(), states);
    let mut report = OutcomeReport::default();

    for player in &game.players {
        report.push_private(
            &player.id,
            format!("Your role is **{}**. {}", player.role, player.role.blurb()),
        );
    }

    // Villains know each other from the start.
    let villains: Vec<(String, String)> = game
        .players
        .iter()
        .filter(|p| p.role.is_villain())
        .map(|p| (p.id.clone(), p.name.clone()))
        .collect();
    if villains.len() > 1 {
        for (villain_id, _) in &villains {
            let partners: Vec<&str> = villains
                .iter()
                .filter(|(id, _)| id != villain_id)
                .map(|(_, name)| name.as_str())
                .collect();
            report.push_private(
                villain_id,
                format!("Your partners in crime: {}.", partners.join(", ")),
            );
        }
    }

    if let Some(hunter) = game.find_role(Role::Headhunter) {
        let hunter_id = hunter.id.clone();
        let candidates: Vec<(String, String)> = game
            .players
            .iter()
            .filter(|p| p.id != hunter_id)
            .map(|p| (p.id.clone(), p.name.clone()))
            .collect();
        if let Some((target_id, target_name)) = candidates.choose(rng).cloned() {
            report.push_private(
                &hunter_id,
                format!(
                    "Your contract: get **{}** lynched by the town. If they die any other way, you become a common Villager.",
                    target_name
                ),
            );
            game.headhunter = Some(HeadhunterContract {
                hunter_id,
                target_id,
            });
        }
    }

    info!(
        "[game {}] roles dealt for {} players",
        game.room_id,
        game.players.len()
    );
    Ok((game, report))
}
