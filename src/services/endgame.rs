use std::collections::VecDeque;

use log::info;

use crate::models::{
    game::{Game, HeadhunterContract, MajorActionKind},
    outcome::{cause, MatchOutcome, OutcomeReport},
    role::{Faction, Role},
};

/// Result of a win-condition check after a death batch.
#[derive(Clone, Debug)]
pub enum EndCheck {
    Continue,
    Ended(MatchOutcome),
    /// The town side would lose, but a revival one-shot is still live: the
    /// match gets one extra night before the verdict.
    RevivalNight,
}

/// Result of the last-day evaluation.
#[derive(Clone, Debug)]
pub enum FinalDay {
    Outcome(MatchOutcome),
    /// Mayor and villains are both standing: the match moves to the showdown.
    Confrontation,
}

/// Applies one death and every effect chained to it, in order: the victim
/// dies, the gossip's secret is shouted, the junior's curse fires, the
/// surviving lover dies of heartbreak, and an unfulfilled headhunter
/// contract is voided. Chained deaths go through the same pathway.
pub fn process_death(
    game: &mut Game,
    victim_id: &str,
    death_cause: &str,
    responsible: Vec<String>,
    report: &mut OutcomeReport,
) {
    let mut queue: VecDeque<(String, String, Vec<String>)> = VecDeque::new();
    queue.push_back((victim_id.to_string(), death_cause.to_string(), responsible));

    while let Some((vid, reason, resp)) = queue.pop_front() {
        let Some(victim) = game.get_player(&vid) else {
            continue;
        };
        if !victim.is_alive {
            continue;
        }
        let victim_name = victim.name.clone();
        let victim_role = victim.role;
        info!(
            "[game {}] {} ({}) died: {}",
            game.room_id, victim_name, victim_role, reason
        );

        if let Some(p) = game.get_player_mut(&vid) {
            p.kill();
        }
        game.record_death(&vid, &reason, resp);
        if vid != victim_id && !report.deaths.iter().any(|d| d.victim_id == vid) {
            report.deaths.push(crate::models::outcome::DeathRecord {
                victim_id: vid.clone(),
                cause: reason.clone(),
                responsible: game.killers.get(&vid).cloned().unwrap_or_default(),
            });
        }
        report.push_public(format!("{} was the {}.", victim_name, victim_role));

        if victim_role == Role::Gossip {
            if let Some(marked_id) = game.gossip_marked_target_id.clone() {
                if let Some(marked) = game.get_player(&marked_id) {
                    report.push_public(format!(
                        "With a dying breath, {} spills the secret: {} is the {}!",
                        victim_name, marked.name, marked.role
                    ));
                }
            }
        }

        if victim_role == Role::JuniorAssassin {
            if let Some(marked_id) = game.junior_marked_target_id.clone() {
                if let Some(marked) = game.get_player(&marked_id).filter(|p| p.is_alive) {
                    report.push_public(format!(
                        "{}'s dying curse strikes down {}!",
                        victim_name, marked.name
                    ));
                    queue.push_back((marked_id, cause::JUNIOR_CURSE.to_string(), vec![vid.clone()]));
                }
            }
        }

        if let Some((lover1, lover2)) = game.lovers.clone() {
            let other = if lover1 == vid {
                Some(lover2)
            } else if lover2 == vid {
                Some(lover1)
            } else {
                None
            };
            if let Some(other_id) = other {
                if let Some(other) = game.get_player(&other_id).filter(|p| p.is_alive) {
                    report.push_public(format!(
                        "{} cannot live without {} and dies of a broken heart.",
                        other.name, victim_name
                    ));
                    queue.push_back((other_id, cause::HEARTBREAK.to_string(), vec![vid.clone()]));
                }
            }
        }

        if let Some(HeadhunterContract { hunter_id, target_id }) = game.headhunter.clone() {
            if target_id == vid && reason != cause::LYNCHED {
                game.headhunter = None;
                if let Some(hunter) = game.get_player_mut(&hunter_id) {
                    if hunter.is_alive {
                        hunter.role = Role::Villager;
                        report.push_private(
                            &hunter_id,
                            "Your contract died without a lynch. The deal is off: you are now a common Villager of the Town.",
                        );
                    }
                }
            }
        }
    }
}

/// Evaluates the win conditions after a death batch. `last_victim` is the
/// player whose death triggered the check, used for the headhunter contract.
pub fn check_game_end(game: &mut Game, last_victim: Option<&str>) -> EndCheck {
    if let (Some(victim_id), Some(contract)) = (last_victim, game.headhunter.clone()) {
        let hunter_alive = game
            .get_player(&contract.hunter_id)
            .is_some_and(|p| p.is_alive);
        let lynched = game
            .death_reasons
            .get(victim_id)
            .is_some_and(|r| r == cause::LYNCHED);
        if hunter_alive && contract.target_id == victim_id && lynched {
            let hunter_name = game
                .get_player(&contract.hunter_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            return EndCheck::Ended(MatchOutcome {
                title: "Contract fulfilled!".to_string(),
                faction: "Solo (Headhunter)".to_string(),
                reason: format!("{} got their mark lynched by the town itself.", hunter_name),
                winner_ids: vec![contract.hunter_id],
            });
        }
    }

    if game.alive_count() == 0 {
        return EndCheck::Ended(MatchOutcome {
            title: "Total wipeout".to_string(),
            faction: "No one".to_string(),
            reason: "Everyone is dead. No one wins.".to_string(),
            winner_ids: vec![],
        });
    }

    let villains_alive = game.living_villains().len();
    if villains_alive == 0 {
        let mayor_alive = game
            .find_role(Role::Mayor)
            .is_some_and(|p| p.is_alive);
        if mayor_alive {
            return EndCheck::Ended(town_victory(game));
        }
        if revival_still_possible(game) {
            return EndCheck::RevivalNight;
        }
        return match final_day_evaluation(game, true) {
            FinalDay::Outcome(outcome) => EndCheck::Ended(outcome),
            FinalDay::Confrontation => unreachable!("resolution never confronts"),
        };
    }

    let non_villains_alive = game.alive_count() - villains_alive;
    if villains_alive >= non_villains_alive {
        return EndCheck::Ended(villain_victory(game));
    }

    EndCheck::Continue
}

/// When the queued verdict comes due after the extra night.
pub fn resolve_pending_endgame(game: &mut Game) -> MatchOutcome {
    game.pending_resolution = false;
    let mayor_alive = game.find_role(Role::Mayor).is_some_and(|p| p.is_alive);
    if mayor_alive {
        return town_victory(game);
    }
    match final_day_evaluation(game, true) {
        FinalDay::Outcome(outcome) => outcome,
        FinalDay::Confrontation => unreachable!("resolution never confronts"),
    }
}

/// The last-day verdict. Outside resolution mode a standing mayor facing
/// standing villains forces the showdown instead of a verdict.
pub fn final_day_evaluation(game: &Game, is_resolution: bool) -> FinalDay {
    let mayor_alive = game.find_role(Role::Mayor).is_some_and(|p| p.is_alive);
    let villains_alive = !game.living_villains().is_empty();
    if mayor_alive && villains_alive && !is_resolution {
        return FinalDay::Confrontation;
    }

    if let Some((lover1, lover2)) = &game.lovers {
        let both_alive = game.get_player(lover1).is_some_and(|p| p.is_alive)
            && game.get_player(lover2).is_some_and(|p| p.is_alive);
        if both_alive {
            let mut winner_ids = vec![lover1.clone(), lover2.clone()];
            if let Some(cupid) = game.find_role(Role::Cupid) {
                winner_ids.push(cupid.id.clone());
            }
            return FinalDay::Outcome(MatchOutcome {
                title: "Love conquers all".to_string(),
                faction: "Lovers".to_string(),
                reason: "Against all odds, the lovers survived to the end.".to_string(),
                winner_ids,
            });
        }
    }

    if let Some(corruptor) = game.find_role(Role::Corruptor) {
        if corruptor.is_alive {
            return FinalDay::Outcome(MatchOutcome {
                title: "Corruption wins".to_string(),
                faction: "Solo (Corruptor)".to_string(),
                reason: format!("{} outlasted the chaos they sowed.", corruptor.name),
                winner_ids: vec![corruptor.id.clone()],
            });
        }
    }

    let town_alive = game
        .alive_players()
        .any(|p| p.role.faction() == Faction::Town);
    if town_alive {
        return FinalDay::Outcome(MatchOutcome {
            title: "The town endures".to_string(),
            faction: Faction::Town.to_string(),
            reason: "The survivors held out to the last day.".to_string(),
            winner_ids: game
                .alive_players()
                .filter(|p| p.role.faction() == Faction::Town)
                .map(|p| p.id.clone())
                .collect(),
        });
    }

    FinalDay::Outcome(MatchOutcome {
        title: "Impasse".to_string(),
        faction: "No one".to_string(),
        reason: "No side could claim the town.".to_string(),
        winner_ids: vec![],
    })
}

/// The showdown's villain final attack: hitting the mayor wins the match
/// for the villains, anything else hands it to the town.
pub fn resolve_final_attack(game: &Game, target_id: &str) -> MatchOutcome {
    let hit_mayor = game
        .get_player(target_id)
        .is_some_and(|p| p.role == Role::Mayor);
    if hit_mayor {
        villain_victory(game)
    } else {
        town_victory(game)
    }
}

pub(crate) fn town_victory(game: &Game) -> MatchOutcome {
    MatchOutcome {
        title: "The town sleeps in peace".to_string(),
        faction: Faction::Town.to_string(),
        reason: "The villains were rooted out.".to_string(),
        winner_ids: game
            .players
            .iter()
            .filter(|p| p.role.faction() == Faction::Town)
            .map(|p| p.id.clone())
            .collect(),
    }
}

pub(crate) fn villain_victory(game: &Game) -> MatchOutcome {
    MatchOutcome {
        title: "The villains take the town".to_string(),
        faction: Faction::Villains.to_string(),
        reason: "The town could no longer resist.".to_string(),
        winner_ids: game.living_villains().iter().map(|p| p.id.clone()).collect(),
    }
}

fn revival_still_possible(game: &Game) -> bool {
    game.alive_players().any(|p| {
        p.role.can_revive()
            && match p.role {
                Role::Angel => !game.angel_revive_used,
                Role::Witch => !game.witch_potion_used,
                _ => false,
            }
    })
}

/// Grafts the opportunistic winners onto a primary outcome: the witch whose
/// bet landed, the second lover and cupid, and a surviving gossip.
pub fn apply_secondary_winners(game: &Game, outcome: &mut MatchOutcome) {
    let mut extra: Vec<String> = Vec::new();

    if let Some(witch) = game.find_role(Role::Witch) {
        if witch.is_alive {
            let bet_won = game.successful_major_actions.iter().any(|major| {
                if major.actor_id != witch.id {
                    return false;
                }
                let Some(target) = game.get_player(&major.target_id) else {
                    return false;
                };
                match major.kind {
                    MajorActionKind::Kill => {
                        (target.role == Role::Mayor
                            && outcome.faction == Faction::Villains.to_string())
                            || (target.role == Role::AlphaAssassin
                                && outcome.faction == Faction::Town.to_string())
                    }
                    MajorActionKind::Revive => {
                        target.role.faction().to_string() == outcome.faction
                    }
                }
            });
            if bet_won && !outcome.winner_ids.contains(&witch.id) {
                extra.push(witch.id.clone());
            }
        }
    }

    if let Some((lover1, lover2)) = &game.lovers {
        let one_won =
            outcome.winner_ids.contains(lover1) || outcome.winner_ids.contains(lover2);
        if one_won {
            for lover_id in [lover1, lover2] {
                let alive = game.get_player(lover_id).is_some_and(|p| p.is_alive);
                if alive && !outcome.winner_ids.contains(lover_id) {
                    extra.push(lover_id.clone());
                }
            }
            if let Some(cupid) = game.find_role(Role::Cupid) {
                if !outcome.winner_ids.contains(&cupid.id) {
                    extra.push(cupid.id.clone());
                }
            }
        }
    }

    if let Some(gossip) = game.find_role(Role::Gossip) {
        let faction_match = outcome.faction == Faction::Town.to_string()
            || outcome.faction == Faction::Villains.to_string();
        if gossip.is_alive && faction_match && !outcome.winner_ids.contains(&gossip.id) {
            extra.push(gossip.id.clone());
        }
    }

    for id in extra {
        if !outcome.winner_ids.contains(&id) {
            outcome.winner_ids.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::MajorAction;
    use crate::models::player::PlayerState;

    fn player(id: &str, role: Role) -> PlayerState {
        PlayerState::new(id.to_string(), format!("Player {}", id), role)
    }

    #[test]
    fn heartbreak_chains_through_the_lovers_pair() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("a", Role::Villager),
                player("b", Role::Sheriff),
                player("c", Role::AlphaAssassin),
            ],
        );
        game.lovers = Some(("a".into(), "b".into()));
        let mut report = OutcomeReport::default();
        process_death(&mut game, "a", cause::VILLAIN, vec!["c".into()], &mut report);
        assert!(!game.get_player("a").unwrap().is_alive);
        assert!(!game.get_player("b").unwrap().is_alive);
        assert_eq!(game.death_reasons["b"], cause::HEARTBREAK);
    }

    #[test]
    fn junior_curse_then_heartbreak_cascade() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("junior", Role::JuniorAssassin),
                player("cursed", Role::Villager),
                player("lover", Role::Villager),
                player("other", Role::Villager),
            ],
        );
        game.junior_marked_target_id = Some("cursed".into());
        game.lovers = Some(("cursed".into(), "lover".into()));
        let mut report = OutcomeReport::default();
        process_death(&mut game, "junior", cause::LYNCHED, vec![], &mut report);
        assert!(!game.get_player("cursed").unwrap().is_alive);
        assert!(!game.get_player("lover").unwrap().is_alive);
        assert_eq!(game.death_reasons["cursed"], cause::JUNIOR_CURSE);
        assert_eq!(game.death_reasons["lover"], cause::HEARTBREAK);
    }

    #[test]
    fn contract_death_outside_lynch_voids_the_headhunter() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("hunter", Role::Headhunter),
                player("mark", Role::Villager),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.headhunter = Some(HeadhunterContract {
            hunter_id: "hunter".into(),
            target_id: "mark".into(),
        });
        let mut report = OutcomeReport::default();
        process_death(&mut game, "mark", cause::VILLAIN, vec!["alpha".into()], &mut report);
        assert!(game.headhunter.is_none());
        assert_eq!(game.get_player("hunter").unwrap().role, Role::Villager);
    }

    #[test]
    fn contract_lynch_wins_for_the_headhunter() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("hunter", Role::Headhunter),
                player("mark", Role::Villager),
                player("alpha", Role::AlphaAssassin),
                player("extra", Role::Villager),
            ],
        );
        game.headhunter = Some(HeadhunterContract {
            hunter_id: "hunter".into(),
            target_id: "mark".into(),
        });
        let mut report = OutcomeReport::default();
        process_death(&mut game, "mark", cause::LYNCHED, vec![], &mut report);
        match check_game_end(&mut game, Some("mark")) {
            EndCheck::Ended(outcome) => {
                assert_eq!(outcome.winner_ids, vec!["hunter".to_string()]);
            }
            other => panic!("expected headhunter win, got {:?}", other),
        }
    }

    #[test]
    fn town_wins_when_villains_fall_and_mayor_stands() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("villager", Role::Villager),
                player("witch", Role::Witch),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        let mut report = OutcomeReport::default();
        process_death(&mut game, "alpha", cause::LYNCHED, vec![], &mut report);
        match check_game_end(&mut game, Some("alpha")) {
            EndCheck::Ended(outcome) => {
                assert_eq!(outcome.faction, "Town");
                // Every town member shares the victory, dead or alive.
                assert!(outcome.winner_ids.contains(&"mayor".to_string()));
                assert!(outcome.winner_ids.contains(&"villager".to_string()));
                assert!(!outcome.winner_ids.contains(&"witch".to_string()));
            }
            other => panic!("expected town win, got {:?}", other),
        }
    }

    #[test]
    fn dead_mayor_with_live_angel_queues_a_revival_night() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("angel", Role::Angel),
                player("villager", Role::Villager),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.get_player_mut("mayor").unwrap().kill();
        game.get_player_mut("alpha").unwrap().kill();
        assert!(matches!(
            check_game_end(&mut game, None),
            EndCheck::RevivalNight
        ));
    }

    #[test]
    fn dead_mayor_without_revival_goes_to_evaluation() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("angel", Role::Angel),
                player("corruptor", Role::Corruptor),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.angel_revive_used = true;
        game.get_player_mut("mayor").unwrap().kill();
        game.get_player_mut("alpha").unwrap().kill();
        match check_game_end(&mut game, None) {
            EndCheck::Ended(outcome) => assert_eq!(outcome.faction, "Solo (Corruptor)"),
            other => panic!("expected corruptor verdict, got {:?}", other),
        }
    }

    #[test]
    fn villains_win_at_parity() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("villager", Role::Villager),
                player("alpha", Role::AlphaAssassin),
                player("simple", Role::SimpleAssassin),
            ],
        );
        game.get_player_mut("villager").unwrap().kill();
        match check_game_end(&mut game, None) {
            EndCheck::Ended(outcome) => {
                assert_eq!(outcome.faction, "Villains");
                assert_eq!(outcome.winner_ids.len(), 2);
            }
            other => panic!("expected villain win, got {:?}", other),
        }
    }

    #[test]
    fn seventh_day_with_mayor_and_villains_forces_showdown() {
        let game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("villager", Role::Villager),
                player("villager2", Role::Villager),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        assert!(matches!(
            final_day_evaluation(&game, false),
            FinalDay::Confrontation
        ));
    }

    #[test]
    fn surviving_lovers_take_the_last_day() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("lover", Role::Villager),
                player("cupid", Role::Cupid),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.lovers = Some(("mayor".into(), "lover".into()));
        game.get_player_mut("alpha").unwrap().kill();
        // No villains left, so no confrontation even with the mayor alive is
        // moot; force the evaluation path directly.
        match final_day_evaluation(&game, false) {
            FinalDay::Outcome(outcome) => {
                assert_eq!(outcome.faction, "Lovers");
                assert_eq!(
                    outcome.winner_ids,
                    vec!["mayor".to_string(), "lover".to_string(), "cupid".to_string()]
                );
            }
            other => panic!("expected lovers win, got {:?}", other),
        }
    }

    #[test]
    fn final_attack_on_mayor_hands_the_town_to_villains() {
        let game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        let outcome = resolve_final_attack(&game, "mayor");
        assert_eq!(outcome.faction, "Villains");
        let outcome = resolve_final_attack(&game, "alpha");
        assert_eq!(outcome.faction, "Town");
    }

    #[test]
    fn witch_bet_on_the_alpha_joins_a_town_win() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("witch", Role::Witch),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.successful_major_actions.push(MajorAction {
            actor_id: "witch".into(),
            kind: MajorActionKind::Kill,
            target_id: "alpha".into(),
        });
        let mut outcome = town_victory(&game);
        apply_secondary_winners(&game, &mut outcome);
        assert!(outcome.winner_ids.contains(&"witch".to_string()));
    }

    #[test]
    fn surviving_gossip_joins_a_faction_win() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("gossip", Role::Gossip),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        let mut outcome = town_victory(&game);
        apply_secondary_winners(&game, &mut outcome);
        assert!(outcome.winner_ids.contains(&"gossip".to_string()));

        game.get_player_mut("gossip").unwrap().kill();
        let mut outcome = town_victory(&game);
        apply_secondary_winners(&game, &mut outcome);
        assert!(!outcome.winner_ids.contains(&"gossip".to_string()));
    }
}
