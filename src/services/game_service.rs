use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    config::GameSettings,
    game::{Game, GamePhase, NightAction, NightActionKind, ShowdownStage},
    outcome::{cause, MatchOutcome, OutcomeReport},
    role::Role,
    room::RoomStatus,
};
use crate::state::AppState;
use crate::utils::config::CONFIG;

use super::{endgame, endgame::EndCheck, endgame::FinalDay, resolver, setup_service};

#[derive(Debug, Error)]
pub enum GameError {
    #[error("room not found")]
    RoomNotFound,
    #[error("no game is running in this room")]
    GameNotFound,
    #[error("the game has already started")]
    GameAlreadyStarted,
    #[error("the game is already over")]
    GameFinished,
    #[error("player not found in this game")]
    PlayerNotFound,
    #[error("dead players cannot do that")]
    NotAlive,
    #[error("only a ghost can do that")]
    NotAGhost,
    #[error("your role cannot do that")]
    WrongRole,
    #[error("wrong phase: {0}")]
    InvalidPhase(String),
    #[error("{0}")]
    AbilityUnavailable(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("needs between {min} and {max} players, got {got}")]
    BadPlayerCount { got: usize, min: usize, max: usize },
}

#[derive(Clone, Debug, Serialize)]
pub struct PhaseAdvance {
    pub phase: GamePhase,
    pub report: OutcomeReport,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitKind {
    Protect,
    Corrupt,
    Confuse,
    VillainVote,
    WitchKill,
    AngelRevive,
    WitchRevive,
    Investigate,
    CupidMatch,
    Possess,
    Exterminate,
    Haunt,
    FirstNightTarget,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NightActionRequest {
    pub player_id: String,
    pub action: SubmitKind,
    pub target_id: Option<String>,
    pub second_target_id: Option<String>,
    pub mark_ids: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    Decree,
    Sabotage,
    Fraud,
    SheriffShot,
    AuraSight,
    GossipCompare,
    MediumLink,
    FinalAttack,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AbilityRequest {
    pub player_id: String,
    pub ability: AbilityKind,
    pub target_id: Option<String>,
    pub second_target_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameView {
    pub room_id: String,
    pub phase: GamePhase,
    pub current_night: u32,
    pub current_day: u32,
    pub showdown: Option<ShowdownStage>,
    pub players: Vec<PlayerView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoleCard {
    pub player_id: String,
    pub role: String,
    pub blurb: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub is_alive: bool,
    /// Only revealed for the dead, or for everyone once the match ends.
    pub role: Option<String>,
}

/// Creates the game for a full room: deals roles and sends every player
/// their private briefing. The match starts in `Preparing`; the first call
/// to `advance_phase` opens night one.
pub async fn start_game(state: AppState, room_id: String) -> Result<OutcomeReport, GameError> {
    let report = {
        let mut rooms = state.rooms.lock().await;
        let room = rooms.get_mut(&room_id).ok_or(GameError::RoomNotFound)?;
        if room.status != RoomStatus::Open {
            return Err(GameError::GameAlreadyStarted);
        }
        let mut games = state.games.lock().await;
        if games.contains_key(&room_id) {
            return Err(GameError::GameAlreadyStarted);
        }
        let (game, report) = {
            let mut rng = rand::thread_rng();
            setup_service::create_game(&room_id, &room.players, &mut rng)?
        };
        room.status = RoomStatus::InProgress;
        games.insert(room_id.clone(), game);
        report
    };
    info!("game started in room {}", room_id);
    state.broadcast_report(&room_id, &report).await;
    Ok(report)
}

/// Drives the phase machine one step forward.
///
/// Every forced transition lands here: the phase timer, an explicit host
/// request, or an in-game trigger like the skip majority. The timer
/// generation is bumped on entry so any timer armed for the previous phase
/// dies quietly.
pub async fn advance_phase(state: AppState, room_id: String) -> Result<PhaseAdvance, GameError> {
    advance_phase_checked(state, room_id, None)
        .await?
        .ok_or(GameError::GameNotFound)
}

/// The stepping core. A timer passes the generation it was armed with;
/// `Ok(None)` means that generation went stale and the step was dropped.
/// The staleness check and the step share one lock acquisition, so a manual
/// advance landing in between cannot produce a double transition.
async fn advance_phase_checked(
    state: AppState,
    room_id: String,
    expected_generation: Option<u64>,
) -> Result<Option<PhaseAdvance>, GameError> {
    let (from, to, report, next_timer) = {
        let mut games = state.games.lock().await;
        let game = match games.get_mut(&room_id) {
            Some(game) => game,
            None if expected_generation.is_some() => return Ok(None),
            None => return Err(GameError::GameNotFound),
        };
        if let Some(generation) = expected_generation {
            if game.timer_generation != generation || game.phase == GamePhase::Finished {
                return Ok(None);
            }
        }
        let from = game.phase;
        game.timer_generation += 1;
        let report = {
            let mut rng = rand::thread_rng();
            step_phase(game, &mut rng)?
        };
        let to = game.phase;
        let timer = phase_duration(game).map(|d| (game.timer_generation, d));
        (from, to, report, timer)
    };

    let _ = state
        .broadcast_phase_change(&room_id, &format!("{:?}", from), &format!("{:?}", to))
        .await;
    state.broadcast_report(&room_id, &report).await;

    if let Some((generation, duration)) = next_timer {
        schedule_phase_timer(state.clone(), room_id, generation, duration);
    }
    Ok(Some(PhaseAdvance { phase: to, report }))
}

fn phase_duration(game: &Game) -> Option<Duration> {
    let secs = match game.phase {
        GamePhase::Night => CONFIG.night_duration_secs,
        GamePhase::DayDiscussion => CONFIG.day_discussion_duration_secs,
        GamePhase::DayVoting => CONFIG.day_voting_duration_secs,
        GamePhase::Showdown => CONFIG.showdown_duration_secs,
        GamePhase::Preparing | GamePhase::Finished => return None,
    };
    Some(Duration::from_secs(secs))
}

fn schedule_phase_timer(state: AppState, room_id: String, generation: u64, duration: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        match advance_phase_checked(state, room_id.clone(), Some(generation)).await {
            Ok(Some(_)) => info!("phase timer expired for room {}", room_id),
            Ok(None) => {}
            Err(e) => warn!("timer-driven advance failed for room {}: {}", room_id, e),
        }
    });
}

fn step_phase(game: &mut Game, rng: &mut impl Rng) -> Result<OutcomeReport, GameError> {
    match game.phase {
        GamePhase::Preparing => {
            let mut report = OutcomeReport::default();
            begin_night(game, &mut report);
            Ok(report)
        }
        GamePhase::Night => Ok(end_night(game, rng)),
        GamePhase::DayDiscussion => {
            game.phase = GamePhase::DayVoting;
            let mut report = OutcomeReport::default();
            report.push_public(format!(
                "The town gathers to vote. A majority of {} votes lynches.",
                game.majority_needed()
            ));
            Ok(report)
        }
        GamePhase::DayVoting => Ok(end_day_voting(game, rng)),
        GamePhase::Showdown => Ok(step_showdown_timeout(game)),
        GamePhase::Finished => Err(GameError::GameFinished),
    }
}

fn begin_night(game: &mut Game, report: &mut OutcomeReport) {
    game.current_night += 1;
    game.phase = GamePhase::Night;
    report.push_public(format!(
        "Night {} falls. The town sleeps...",
        game.current_night
    ));
}

fn begin_day(game: &mut Game, report: &mut OutcomeReport) {
    game.current_day = game.current_night;
    game.phase = GamePhase::DayDiscussion;
    game.clear_daily_states();
    game.sheriff_shot_this_day = false;
    report.push_public(format!("Day {} dawns over the town.", game.current_day));
}

fn end_night(game: &mut Game, rng: &mut impl Rng) -> OutcomeReport {
    let resolving_pending = game.pending_resolution;
    let mut report = resolver::resolve_night_actions(game, rng);
    resolver::record_major_actions(game, &report);

    let night_deaths = report.deaths.clone();

    // Even when this night already decided the match, its deaths still go
    // through the cascade pathway so the death ledger and the final reveal
    // stay truthful.
    if report.match_outcome.is_some() || resolving_pending {
        for death in &night_deaths {
            endgame::process_death(
                game,
                &death.victim_id,
                &death.cause,
                death.responsible.clone(),
                &mut report,
            );
        }
        let outcome = match report.match_outcome.take() {
            Some(outcome) => outcome,
            // The extra night has passed; the deferred verdict comes due.
            None => endgame::resolve_pending_endgame(game),
        };
        finish_match(game, outcome, &mut report);
        return report;
    }

    let mut ended = None;
    for death in &night_deaths {
        endgame::process_death(
            game,
            &death.victim_id,
            &death.cause,
            death.responsible.clone(),
            &mut report,
        );
        match endgame::check_game_end(game, Some(&death.victim_id)) {
            EndCheck::Ended(outcome) => {
                ended = Some(outcome);
                break;
            }
            EndCheck::RevivalNight => game.pending_resolution = true,
            EndCheck::Continue => {}
        }
    }
    // Possession conversions can tip the balance with no death at all.
    if ended.is_none() && !game.pending_resolution {
        match endgame::check_game_end(game, None) {
            EndCheck::Ended(outcome) => ended = Some(outcome),
            EndCheck::RevivalNight => game.pending_resolution = true,
            EndCheck::Continue => {}
        }
    }
    if let Some(outcome) = ended {
        finish_match(game, outcome, &mut report);
        return report;
    }

    if report.deaths.is_empty() {
        report.push_public("The sun rises on a quiet town. No one died tonight.");
    }
    if game.pending_resolution {
        report.push_public(
            "The town senses the end is near, yet a faint hope lingers for one more night.",
        );
        begin_night(game, &mut report);
    } else {
        begin_day(game, &mut report);
    }
    report
}

fn end_day_voting(game: &mut Game, rng: &mut impl Rng) -> OutcomeReport {
    let decision = resolver::process_lynch(game, rng);
    let mut report = decision.report;
    let settings = GameSettings::default();

    let mut ended = None;
    if let Some(victim_id) = decision.lynched {
        let victim_role = game.get_player(&victim_id).map(|p| p.role);
        let victim_name = game
            .get_player(&victim_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        endgame::process_death(game, &victim_id, cause::LYNCHED, vec![], &mut report);
        match endgame::check_game_end(game, Some(&victim_id)) {
            EndCheck::Ended(outcome) => ended = Some(outcome),
            EndCheck::RevivalNight => game.pending_resolution = true,
            EndCheck::Continue => {}
        }
        // The contract outranks the clown, but the clown outranks everything
        // else a lynch can trigger, even a verdict tipped by their own death.
        let contract_won = ended
            .as_ref()
            .is_some_and(|outcome| outcome.faction == "Solo (Headhunter)");
        if victim_role == Some(Role::Clown) && !contract_won {
            game.pending_resolution = false;
            ended = Some(MatchOutcome {
                title: "The last laugh".to_string(),
                faction: "Solo (Clown)".to_string(),
                reason: format!("{} wanted to be lynched all along!", victim_name),
                winner_ids: vec![victim_id],
            });
        }
    }
    game.clear_daily_states();

    if let Some(outcome) = ended {
        finish_match(game, outcome, &mut report);
        return report;
    }

    if game.current_night >= settings.max_game_nights {
        match endgame::final_day_evaluation(game, false) {
            FinalDay::Outcome(outcome) => finish_match(game, outcome, &mut report),
            FinalDay::Confrontation => enter_showdown(game, &mut report),
        }
    } else {
        if game.pending_resolution {
            report.push_public(
                "The town senses the end is near, yet a faint hope lingers for one more night.",
            );
        }
        begin_night(game, &mut report);
    }
    report
}

fn enter_showdown(game: &mut Game, report: &mut OutcomeReport) {
    game.phase = GamePhase::Showdown;
    report.push_public(
        "The last day ends with the Mayor and the villains face to face. Showdown!",
    );
    let sheriff_ready = game
        .find_role(Role::Sheriff)
        .is_some_and(|p| p.is_alive)
        && game.sheriff_shots_fired < game.sheriff_max_shots();
    if sheriff_ready {
        game.showdown = Some(ShowdownStage::SheriffShots);
        report.push_public("The Sheriff has the first move.");
    } else {
        game.showdown = Some(ShowdownStage::VillainAttack);
        announce_final_attacker(game, report);
    }
}

fn announce_final_attacker(game: &Game, report: &mut OutcomeReport) {
    if let Some((_, name)) = designated_attacker(game) {
        report.push_public(format!("{} steps forward for the final attack.", name));
    }
}

/// The alpha leads the final attack; if they fell, the first living villain
/// in seat order takes over.
fn designated_attacker(game: &Game) -> Option<(String, String)> {
    game.alive_players()
        .find(|p| p.role == Role::AlphaAssassin)
        .or_else(|| game.living_villains().first().copied())
        .map(|p| (p.id.clone(), p.name.clone()))
}

fn step_showdown_timeout(game: &mut Game) -> OutcomeReport {
    let mut report = OutcomeReport::default();
    match game.showdown {
        Some(ShowdownStage::SheriffShots) => {
            game.sheriff_shots_fired += 1;
            report.push_public("The Sheriff hesitated and wasted a shot!");
            let sheriff_alive = game
                .find_role(Role::Sheriff)
                .is_some_and(|p| p.is_alive);
            if !sheriff_alive || game.sheriff_shots_fired >= game.sheriff_max_shots() {
                game.showdown = Some(ShowdownStage::VillainAttack);
                announce_final_attacker(game, &mut report);
            }
        }
        Some(ShowdownStage::VillainAttack) | None => {
            let mut outcome = endgame::town_victory(game);
            outcome.reason = "The villains hesitated at the decisive moment.".to_string();
            finish_match(game, outcome, &mut report);
        }
    }
    report
}

fn finish_match(game: &mut Game, mut outcome: MatchOutcome, report: &mut OutcomeReport) {
    endgame::apply_secondary_winners(game, &mut outcome);
    game.phase = GamePhase::Finished;
    game.showdown = None;
    game.timer_generation += 1;

    report.push_public(format!("**{}** {}", outcome.title, outcome.reason));
    let winner_names: Vec<String> = outcome
        .winner_ids
        .iter()
        .filter_map(|id| game.get_player(id).map(|p| p.name.clone()))
        .collect();
    if winner_names.is_empty() {
        report.push_public("No one wins this time.");
    } else {
        report.push_public(format!("Winners: {}.", winner_names.join(", ")));
    }
    let reveal: Vec<String> = game
        .players
        .iter()
        .map(|p| {
            format!(
                "{} was the {} ({})",
                p.name,
                p.role,
                if p.is_alive { "alive" } else { "dead" }
            )
        })
        .collect();
    report.push_public(format!("Final roles:\n{}", reveal.join("\n")));
    report.match_outcome = Some(outcome);
    info!("game over in room {}", game.room_id);
}

fn make_action(kind: NightActionKind, role: Role, target_id: Option<String>) -> NightAction {
    NightAction {
        kind,
        role,
        priority: kind.priority(),
        seq: 0,
        target_id,
        marks: Vec::new(),
        lovers: None,
    }
}

/// Registers one player's night intent. Re-submitting replaces the previous
/// intent; nothing takes effect until the night resolves.
pub async fn submit_night_action(
    state: AppState,
    room_id: String,
    req: NightActionRequest,
) -> Result<SubmitResponse, GameError> {
    let mut games = state.games.lock().await;
    let game = games.get_mut(&room_id).ok_or(GameError::GameNotFound)?;
    if !game.is_night() {
        return Err(GameError::InvalidPhase(
            "night actions are only accepted at night".to_string(),
        ));
    }
    let actor = game
        .get_player(&req.player_id)
        .ok_or(GameError::PlayerNotFound)?
        .clone();
    if req.action == SubmitKind::Haunt {
        if actor.is_alive || !actor.is_ghost {
            return Err(GameError::NotAGhost);
        }
    } else if !actor.is_alive {
        return Err(GameError::NotAlive);
    }

    let settings = GameSettings::default();
    let require_role = |role: Role| -> Result<(), GameError> {
        if actor.role == role {
            Ok(())
        } else {
            Err(GameError::WrongRole)
        }
    };
    let target_id = |req: &NightActionRequest| -> Result<String, GameError> {
        req.target_id
            .clone()
            .ok_or_else(|| GameError::InvalidTarget("a target is required".to_string()))
    };
    let require_alive = |game: &Game, id: &str| -> Result<(), GameError> {
        match game.get_player(id) {
            Some(p) if p.is_alive => Ok(()),
            Some(p) => Err(GameError::InvalidTarget(format!("{} is dead", p.name))),
            None => Err(GameError::InvalidTarget("no such player".to_string())),
        }
    };
    let require_dead = |game: &Game, id: &str| -> Result<(), GameError> {
        match game.get_player(id) {
            Some(p) if !p.is_alive => Ok(()),
            Some(p) => Err(GameError::InvalidTarget(format!("{} is alive", p.name))),
            None => Err(GameError::InvalidTarget("no such player".to_string())),
        }
    };
    let no_self = |id: &str| -> Result<(), GameError> {
        if id == actor.id {
            Err(GameError::InvalidTarget(
                "you cannot target yourself".to_string(),
            ))
        } else {
            Ok(())
        }
    };

    match req.action {
        SubmitKind::Protect => {
            require_role(Role::Bodyguard)?;
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            no_self(&target)?;
            if game.last_protected_target.get(&actor.id) == Some(&target) {
                return Err(GameError::InvalidTarget(
                    "you cannot protect the same player two nights running".to_string(),
                ));
            }
            game.last_protected_target
                .insert(actor.id.clone(), target.clone());
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::Protect, actor.role, Some(target)),
            );
        }
        SubmitKind::Corrupt => {
            require_role(Role::Corruptor)?;
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            if game.last_corrupted_target.get(&actor.id) == Some(&target) {
                return Err(GameError::InvalidTarget(
                    "you cannot corrupt the same player two nights running".to_string(),
                ));
            }
            game.last_corrupted_target
                .insert(actor.id.clone(), target.clone());
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::Corrupt, actor.role, Some(target)),
            );
        }
        SubmitKind::Confuse => {
            require_role(Role::JuniorAssassin)?;
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            no_self(&target)?;
            if game.last_confused_target.get(&actor.id) == Some(&target) {
                return Err(GameError::InvalidTarget(
                    "you cannot confuse the same player two nights running".to_string(),
                ));
            }
            game.last_confused_target
                .insert(actor.id.clone(), target.clone());
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::Confuse, actor.role, Some(target)),
            );
        }
        SubmitKind::VillainVote => {
            if !actor.role.casts_villain_vote() {
                return Err(GameError::WrongRole);
            }
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            no_self(&target)?;
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::VillainVote, actor.role, Some(target)),
            );
        }
        SubmitKind::WitchKill => {
            require_role(Role::Witch)?;
            if game.witch_potion_used {
                return Err(GameError::AbilityUnavailable(
                    "your potion set is already spent".to_string(),
                ));
            }
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            no_self(&target)?;
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::WitchKill, actor.role, Some(target)),
            );
        }
        SubmitKind::AngelRevive => {
            require_role(Role::Angel)?;
            if game.angel_revive_used {
                return Err(GameError::AbilityUnavailable(
                    "your revival has already been used".to_string(),
                ));
            }
            let target = target_id(&req)?;
            require_dead(game, &target)?;
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::AngelRevive, actor.role, Some(target)),
            );
        }
        SubmitKind::WitchRevive => {
            require_role(Role::Witch)?;
            if game.witch_potion_used {
                return Err(GameError::AbilityUnavailable(
                    "your potion set is already spent".to_string(),
                ));
            }
            let target = target_id(&req)?;
            require_dead(game, &target)?;
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::WitchRevive, actor.role, Some(target)),
            );
        }
        SubmitKind::Investigate => {
            require_role(Role::Detective)?;
            let marks = req.mark_ids.clone().unwrap_or_default();
            let expected = if game.players.len() <= settings.detective_single_mark_max {
                1
            } else {
                2
            };
            if marks.len() != expected {
                return Err(GameError::InvalidTarget(format!(
                    "you must watch exactly {} player(s) in this match",
                    expected
                )));
            }
            if expected == 2 && marks[0] == marks[1] {
                return Err(GameError::InvalidTarget(
                    "watch two different players".to_string(),
                ));
            }
            for mark in &marks {
                require_alive(game, mark)?;
                no_self(mark)?;
            }
            let mut action = make_action(NightActionKind::MarkDetective, actor.role, None);
            action.marks = marks;
            game.register_night_action(&actor.id, action);
        }
        SubmitKind::CupidMatch => {
            require_role(Role::Cupid)?;
            if game.current_night != 1 {
                return Err(GameError::AbilityUnavailable(
                    "cupid only strikes on the first night".to_string(),
                ));
            }
            if game.lovers.is_some() {
                return Err(GameError::AbilityUnavailable(
                    "the lovers are already chosen".to_string(),
                ));
            }
            let first = target_id(&req)?;
            let second = req.second_target_id.clone().ok_or_else(|| {
                GameError::InvalidTarget("two targets are required".to_string())
            })?;
            if first == second {
                return Err(GameError::InvalidTarget(
                    "pick two different players".to_string(),
                ));
            }
            require_alive(game, &first)?;
            require_alive(game, &second)?;
            let mut action = make_action(NightActionKind::CupidMatch, actor.role, None);
            action.lovers = Some((first, second));
            game.register_night_action(&actor.id, action);
        }
        SubmitKind::Possess => {
            require_role(Role::AlphaAssassin)?;
            if game.players.len() < settings.possess_min_players {
                return Err(GameError::AbilityUnavailable(format!(
                    "possession is only available in matches of {}+ players",
                    settings.possess_min_players
                )));
            }
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            if game
                .get_player(&target)
                .is_some_and(|p| p.role.is_villain())
            {
                return Err(GameError::InvalidTarget(
                    "a fellow villain cannot be possessed".to_string(),
                ));
            }
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::Possess, actor.role, Some(target)),
            );
        }
        SubmitKind::Exterminate => {
            require_role(Role::Plague)?;
            if game.plague_exterminate_used {
                return Err(GameError::AbilityUnavailable(
                    "the extermination has already been unleashed".to_string(),
                ));
            }
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::PlagueExterminate, actor.role, None),
            );
        }
        SubmitKind::Haunt => {
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            game.register_night_action(
                &actor.id,
                make_action(NightActionKind::Haunt, actor.role, Some(target)),
            );
        }
        SubmitKind::FirstNightTarget => {
            if game.current_night != 1 {
                return Err(GameError::AbilityUnavailable(
                    "that choice is locked after the first night".to_string(),
                ));
            }
            if !actor.role.picks_first_night_target() {
                return Err(GameError::WrongRole);
            }
            let target = target_id(&req)?;
            require_alive(game, &target)?;
            no_self(&target)?;
            match actor.role {
                Role::Accomplice => {
                    // An immediate peek, not a queued action.
                    let peeked = game
                        .get_player(&target)
                        .ok_or(GameError::PlayerNotFound)?;
                    return Ok(SubmitResponse {
                        message: format!("{} is the {}.", peeked.name, peeked.role),
                    });
                }
                Role::Plague => {
                    game.plague_patient_zero_id = Some(target.clone());
                    if let Some(p) = game.get_player_mut(&target) {
                        p.is_infected = true;
                    }
                    game.register_night_action(
                        &actor.id,
                        make_action(NightActionKind::FirstNightTarget, actor.role, Some(target)),
                    );
                }
                Role::JuniorAssassin => {
                    game.junior_marked_target_id = Some(target.clone());
                    game.register_night_action(
                        &actor.id,
                        make_action(NightActionKind::FirstNightTarget, actor.role, Some(target)),
                    );
                }
                Role::Gossip => {
                    game.gossip_marked_target_id = Some(target.clone());
                    game.register_night_action(
                        &actor.id,
                        make_action(NightActionKind::FirstNightTarget, actor.role, Some(target)),
                    );
                }
                _ => return Err(GameError::WrongRole),
            }
        }
    }

    Ok(SubmitResponse {
        message: "Action registered for tonight.".to_string(),
    })
}

/// Casts or changes a lynch vote.
pub async fn day_vote(
    state: AppState,
    room_id: String,
    voter_id: String,
    target_id: String,
) -> Result<SubmitResponse, GameError> {
    let mut games = state.games.lock().await;
    let game = games.get_mut(&room_id).ok_or(GameError::GameNotFound)?;
    if !game.is_day_voting() {
        return Err(GameError::InvalidPhase(
            "votes are only accepted during the voting window".to_string(),
        ));
    }
    if !game.get_player(&voter_id).is_some_and(|p| p.is_alive) {
        return Err(GameError::NotAlive);
    }
    let target_name = match game.get_player(&target_id) {
        Some(p) if p.is_alive => p.name.clone(),
        Some(p) => {
            return Err(GameError::InvalidTarget(format!("{} is dead", p.name)));
        }
        None => return Err(GameError::InvalidTarget("no such player".to_string())),
    };
    game.day_skip_votes.remove(&voter_id);
    game.day_votes.insert(voter_id, target_id);
    Ok(SubmitResponse {
        message: format!("Vote registered against {}.", target_name),
    })
}

/// Votes to skip the lynch. Reaching the skip majority closes the voting
/// window immediately.
pub async fn day_skip(
    state: AppState,
    room_id: String,
    voter_id: String,
) -> Result<SubmitResponse, GameError> {
    let skip_majority = {
        let mut games = state.games.lock().await;
        let game = games.get_mut(&room_id).ok_or(GameError::GameNotFound)?;
        if !game.is_day_voting() {
            return Err(GameError::InvalidPhase(
                "votes are only accepted during the voting window".to_string(),
            ));
        }
        if !game.get_player(&voter_id).is_some_and(|p| p.is_alive) {
            return Err(GameError::NotAlive);
        }
        game.day_votes.remove(&voter_id);
        game.day_skip_votes.insert(voter_id);
        game.day_skip_votes.len() >= game.majority_needed()
    };
    if skip_majority {
        advance_phase(state, room_id).await?;
        return Ok(SubmitResponse {
            message: "The majority chose to skip. The vote is over.".to_string(),
        });
    }
    Ok(SubmitResponse {
        message: "Skip vote registered.".to_string(),
    })
}

/// Immediate abilities: day powers, night information powers and the
/// showdown moves. Each validates its own phase.
pub async fn use_ability(
    state: AppState,
    room_id: String,
    req: AbilityRequest,
) -> Result<SubmitResponse, GameError> {
    let (response, broadcast, next_timer) = {
        let mut games = state.games.lock().await;
        let game = games.get_mut(&room_id).ok_or(GameError::GameNotFound)?;
        let actor = game
            .get_player(&req.player_id)
            .ok_or(GameError::PlayerNotFound)?
            .clone();
        if !actor.is_alive {
            return Err(GameError::NotAlive);
        }
        let phase_before = game.phase;
        let (response, broadcast) = apply_ability(game, &actor.id, actor.role, &req)?;
        // A phase forced from inside an ability (sabotage) still needs its
        // timer armed, same as a stepped transition.
        let timer = (game.phase != phase_before)
            .then(|| phase_duration(game).map(|d| (game.timer_generation, d)))
            .flatten();
        (response, broadcast, timer)
    };
    if let Some(report) = broadcast {
        state.broadcast_report(&room_id, &report).await;
    }
    if let Some((generation, duration)) = next_timer {
        schedule_phase_timer(state.clone(), room_id, generation, duration);
    }
    Ok(response)
}

fn apply_ability(
    game: &mut Game,
    actor_id: &str,
    actor_role: Role,
    req: &AbilityRequest,
) -> Result<(SubmitResponse, Option<OutcomeReport>), GameError> {
    let settings = GameSettings::default();
    let day_phase = matches!(
        game.phase,
        GamePhase::DayDiscussion | GamePhase::DayVoting
    );
    let require_role = |role: Role| -> Result<(), GameError> {
        if actor_role == role {
            Ok(())
        } else {
            Err(GameError::WrongRole)
        }
    };
    let target = |field: &Option<String>| -> Result<String, GameError> {
        field
            .clone()
            .ok_or_else(|| GameError::InvalidTarget("a target is required".to_string()))
    };

    match req.ability {
        AbilityKind::Decree => {
            require_role(Role::Mayor)?;
            if !day_phase {
                return Err(GameError::InvalidPhase(
                    "the decree is a daytime power".to_string(),
                ));
            }
            if game.decree_used {
                return Err(GameError::AbilityUnavailable(
                    "the decree has already been issued".to_string(),
                ));
            }
            game.decree_used = true;
            game.decree_active = true;
            game.sabotage_blocked = true;
            let name = game
                .get_player(actor_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let mut report = OutcomeReport::default();
            report.push_public(format!(
                "{} reveals themselves as the Mayor and issues an emergency decree! Town votes carry extra weight today, and no sabotage can stop the vote.",
                name
            ));
            Ok((
                SubmitResponse {
                    message: "Decree issued.".to_string(),
                },
                Some(report),
            ))
        }
        AbilityKind::Sabotage => {
            require_role(Role::AlphaAssassin)?;
            if !day_phase {
                return Err(GameError::InvalidPhase(
                    "sabotage is a daytime power".to_string(),
                ));
            }
            if game.sabotage_used {
                return Err(GameError::AbilityUnavailable(
                    "the sabotage has already been spent".to_string(),
                ));
            }
            if game.sabotage_blocked {
                return Err(GameError::AbilityUnavailable(
                    "the decree protects today's vote".to_string(),
                ));
            }
            game.sabotage_used = true;
            game.timer_generation += 1;
            game.clear_daily_states();
            let mut report = OutcomeReport::default();
            report.push_public(
                "Chaos erupts in the town square! The day is cut short, there will be no vote.",
            );
            begin_night(game, &mut report);
            Ok((
                SubmitResponse {
                    message: "The day has been sabotaged.".to_string(),
                },
                Some(report),
            ))
        }
        AbilityKind::Fraud => {
            require_role(Role::Accomplice)?;
            if !game.is_day_voting() {
                return Err(GameError::InvalidPhase(
                    "fraud only works during the vote".to_string(),
                ));
            }
            if game.fraud_used {
                return Err(GameError::AbilityUnavailable(
                    "the fraud has already been spent".to_string(),
                ));
            }
            game.fraud_used = true;
            game.fraud_active = true;
            Ok((
                SubmitResponse {
                    message: "The ballots will be... rearranged.".to_string(),
                },
                None,
            ))
        }
        AbilityKind::SheriffShot => {
            require_role(Role::Sheriff)?;
            let in_showdown = game.phase == GamePhase::Showdown;
            if in_showdown {
                if game.showdown != Some(ShowdownStage::SheriffShots) {
                    return Err(GameError::InvalidPhase(
                        "the sheriff's moment has passed".to_string(),
                    ));
                }
            } else if !day_phase {
                return Err(GameError::InvalidPhase(
                    "the sheriff only fires in daylight".to_string(),
                ));
            } else if game.sheriff_shot_this_day {
                return Err(GameError::AbilityUnavailable(
                    "you already fired today".to_string(),
                ));
            }
            if game.sheriff_shots_fired >= game.sheriff_max_shots() {
                return Err(GameError::AbilityUnavailable(
                    "no bullets left".to_string(),
                ));
            }
            let target_id = target(&req.target_id)?;
            if target_id == actor_id {
                return Err(GameError::InvalidTarget(
                    "you cannot shoot yourself".to_string(),
                ));
            }
            let target_player = match game.get_player(&target_id) {
                Some(p) if p.is_alive => p.clone(),
                Some(p) => {
                    return Err(GameError::InvalidTarget(format!("{} is dead", p.name)));
                }
                None => return Err(GameError::InvalidTarget("no such player".to_string())),
            };
            let report = fire_sheriff_shot(game, actor_id, &target_player.id, in_showdown);
            Ok((
                SubmitResponse {
                    message: format!("You fired at {}.", target_player.name),
                },
                Some(report),
            ))
        }
        AbilityKind::AuraSight => {
            require_role(Role::AuraSeer)?;
            if !game.is_night() {
                return Err(GameError::InvalidPhase(
                    "auras are only visible at night".to_string(),
                ));
            }
            let target_id = target(&req.target_id)?;
            if target_id == actor_id {
                return Err(GameError::InvalidTarget(
                    "you cannot read your own aura".to_string(),
                ));
            }
            let target_player = game
                .get_player(&target_id)
                .filter(|p| p.is_alive)
                .ok_or_else(|| GameError::InvalidTarget("no such living player".to_string()))?;
            let message = if target_player.role.faction() == crate::models::role::Faction::Town {
                format!("{} radiates a calm aura. They belong to the Town.", target_player.name)
            } else {
                format!("{} gives off a murky aura. They do NOT belong to the Town.", target_player.name)
            };
            Ok((SubmitResponse { message }, None))
        }
        AbilityKind::GossipCompare => {
            require_role(Role::Gossip)?;
            if !game.is_night() {
                return Err(GameError::InvalidPhase(
                    "gossip is gathered at night".to_string(),
                ));
            }
            let used = *game.gossip_comparisons.get(actor_id).unwrap_or(&0);
            if used >= settings.gossip_max_comparisons {
                return Err(GameError::AbilityUnavailable(
                    "you have no comparisons left".to_string(),
                ));
            }
            let first = target(&req.target_id)?;
            let second = target(&req.second_target_id)?;
            if first == second {
                return Err(GameError::InvalidTarget(
                    "pick two different players".to_string(),
                ));
            }
            let (p1, p2) = match (game.get_player(&first), game.get_player(&second)) {
                (Some(p1), Some(p2)) if p1.is_alive && p2.is_alive => (p1.clone(), p2.clone()),
                _ => {
                    return Err(GameError::InvalidTarget(
                        "both targets must be alive".to_string(),
                    ))
                }
            };
            game.gossip_comparisons
                .insert(actor_id.to_string(), used + 1);
            let same = p1.role.faction() == p2.role.faction();
            let message = if same {
                format!("{} and {} serve the same side.", p1.name, p2.name)
            } else {
                format!("{} and {} serve different sides.", p1.name, p2.name)
            };
            Ok((SubmitResponse { message }, None))
        }
        AbilityKind::MediumLink => {
            require_role(Role::Medium)?;
            if !game.is_night() {
                return Err(GameError::InvalidPhase(
                    "the dead only answer at night".to_string(),
                ));
            }
            if game.medium_talk_used {
                return Err(GameError::AbilityUnavailable(
                    "your link to the beyond is spent".to_string(),
                ));
            }
            let target_id = target(&req.target_id)?;
            let target_player = game
                .get_player(&target_id)
                .ok_or_else(|| GameError::InvalidTarget("no such player".to_string()))?;
            if target_player.is_alive {
                return Err(GameError::InvalidTarget(format!(
                    "{} is still alive",
                    target_player.name
                )));
            }
            if target_player.is_ghost {
                return Err(GameError::InvalidTarget(
                    "that spirit is already bound".to_string(),
                ));
            }
            let target_name = target_player.name.clone();
            game.medium_talk_used = true;
            let medium_id = actor_id.to_string();
            if let Some(p) = game.get_player_mut(&target_id) {
                p.is_ghost = true;
                p.ghost_master_id = Some(medium_id);
            }
            let mut report = OutcomeReport::default();
            report.push_private(
                &target_id,
                "A medium reached out to you. You may haunt one living player each night and report what you see.",
            );
            Ok((
                SubmitResponse {
                    message: format!("You bound the spirit of {}.", target_name),
                },
                Some(report),
            ))
        }
        AbilityKind::FinalAttack => {
            if game.phase != GamePhase::Showdown
                || game.showdown != Some(ShowdownStage::VillainAttack)
            {
                return Err(GameError::InvalidPhase(
                    "it is not time for the final attack".to_string(),
                ));
            }
            let attacker = designated_attacker(game)
                .ok_or_else(|| GameError::AbilityUnavailable("no villain stands".to_string()))?;
            if attacker.0 != actor_id {
                return Err(GameError::AbilityUnavailable(
                    "only the leading villain delivers the final attack".to_string(),
                ));
            }
            let target_id = target(&req.target_id)?;
            let target_player = game
                .get_player(&target_id)
                .filter(|p| p.is_alive)
                .ok_or_else(|| GameError::InvalidTarget("no such living player".to_string()))?;
            let target_name = target_player.name.clone();
            let mut report = OutcomeReport::default();
            report.push_public(format!(
                "{} lunges at {} for the final blow!",
                attacker.1, target_name
            ));
            let outcome = endgame::resolve_final_attack(game, &target_id);
            finish_match(game, outcome, &mut report);
            Ok((
                SubmitResponse {
                    message: format!("You struck {}.", target_name),
                },
                Some(report),
            ))
        }
    }
}

/// A day shot kills outright; a showdown shot can decide the match on the
/// spot when it finds the alpha or, catastrophically, the mayor.
fn fire_sheriff_shot(
    game: &mut Game,
    sheriff_id: &str,
    target_id: &str,
    in_showdown: bool,
) -> OutcomeReport {
    let mut report = OutcomeReport::default();
    game.sheriff_shots_fired += 1;
    if !in_showdown {
        game.sheriff_shot_this_day = true;
    }
    let sheriff_name = game
        .get_player(sheriff_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let target_name = game
        .get_player(target_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    if !game.sheriff_revealed {
        game.sheriff_revealed = true;
        report.push_public(format!("{} is the Sheriff!", sheriff_name));
    }
    report.push_public(format!("BANG! The Sheriff opens fire on {}!", target_name));

    let target_role = game.get_player(target_id).map(|p| p.role);
    if in_showdown {
        match target_role {
            Some(Role::AlphaAssassin) => {
                let mut outcome = endgame::town_victory(game);
                outcome.reason =
                    "The Sheriff's bullet found the Alpha Assassin's heart.".to_string();
                finish_match(game, outcome, &mut report);
                return report;
            }
            Some(Role::Mayor) => {
                let mut outcome = endgame::villain_victory(game);
                outcome.reason = "The Sheriff shot the Mayor in the showdown.".to_string();
                finish_match(game, outcome, &mut report);
                return report;
            }
            _ => {}
        }
    }

    endgame::process_death(
        game,
        target_id,
        cause::SHERIFF_SHOT,
        vec![sheriff_id.to_string()],
        &mut report,
    );
    match endgame::check_game_end(game, Some(target_id)) {
        EndCheck::Ended(outcome) => finish_match(game, outcome, &mut report),
        EndCheck::RevivalNight => game.pending_resolution = true,
        EndCheck::Continue => {}
    }

    if in_showdown
        && game.phase == GamePhase::Showdown
        && (game.sheriff_shots_fired >= game.sheriff_max_shots()
            || !game.find_role(Role::Sheriff).is_some_and(|p| p.is_alive))
    {
        game.showdown = Some(ShowdownStage::VillainAttack);
        announce_final_attacker(game, &mut report);
    }
    report
}

/// Snapshot for clients. Roles stay hidden for the living until the match
/// is over.
pub async fn get_game_view(state: AppState, room_id: String) -> Result<GameView, GameError> {
    let games = state.games.lock().await;
    let game = games.get(&room_id).ok_or(GameError::GameNotFound)?;
    let finished = game.phase == GamePhase::Finished;
    Ok(GameView {
        room_id: game.room_id.clone(),
        phase: game.phase,
        current_night: game.current_night,
        current_day: game.current_day,
        showdown: game.showdown,
        players: game
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id.clone(),
                name: p.name.clone(),
                is_alive: p.is_alive,
                role: (finished || !p.is_alive).then(|| p.role.to_string()),
            })
            .collect(),
    })
}

/// Roster of everyone still standing, roles redacted.
pub async fn get_living_players(
    state: AppState,
    room_id: String,
) -> Result<Vec<PlayerView>, GameError> {
    let games = state.games.lock().await;
    let game = games.get(&room_id).ok_or(GameError::GameNotFound)?;
    Ok(game
        .players
        .iter()
        .filter(|p| p.is_alive)
        .map(|p| PlayerView {
            id: p.id.clone(),
            name: p.name.clone(),
            is_alive: true,
            role: None,
        })
        .collect())
}

/// A player's own role card, used by clients to re-fetch the briefing.
pub async fn get_player_role(
    state: AppState,
    room_id: String,
    player_id: String,
) -> Result<RoleCard, GameError> {
    let games = state.games.lock().await;
    let game = games.get(&room_id).ok_or(GameError::GameNotFound)?;
    let player = game
        .players
        .iter()
        .find(|p| p.id == player_id)
        .ok_or(GameError::PlayerNotFound)?;
    Ok(RoleCard {
        player_id: player.id.clone(),
        role: player.role.display_name().to_string(),
        blurb: player.role.blurb().to_string(),
    })
}
