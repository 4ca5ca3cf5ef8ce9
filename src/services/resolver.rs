use std::collections::{HashMap, HashSet};

use log::info;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{
    game::{Game, MajorActionKind, NightAction, NightActionKind},
    outcome::{cause, DeathRecord, MatchOutcome, OutcomeReport, RevivalRecord},
    role::{Faction, Role},
};

/// Who launched a kill attempt. Protection only absorbs the villain
/// aggregate; a witch kill goes through it.
#[derive(Clone, Debug, PartialEq)]
enum KillSource {
    Villain,
    Witch,
}

#[derive(Clone, Debug)]
struct KillAttempt {
    target_id: String,
    source: KillSource,
    responsible: Vec<String>,
}

#[derive(Clone, Debug, Default)]
struct NightVisits {
    visited_by: Vec<String>,
    visited: Vec<String>,
}

/// Result of the day-vote tally. The lynched player is reported, not yet
/// killed: the caller routes it through the shared death pathway.
#[derive(Clone, Debug, Default)]
pub struct LynchDecision {
    pub report: OutcomeReport,
    pub lynched: Option<String>,
}

/// Resolves every submitted night action into one outcome report.
///
/// Six-stage pipeline over the queue sorted by (priority, registration
/// order): status effects, unique actions, kill gathering, deaths,
/// revivals, then information and plague effects. Deaths are
/// *reported*, not applied; the phase machine routes each through the
/// death pathway so chained effects fire. Revivals are applied here.
/// The queue is always drained on exit.
pub fn resolve_night_actions(game: &mut Game, rng: &mut impl Rng) -> OutcomeReport {
    info!("[game {}] resolving night actions", game.room_id);
    let mut report = OutcomeReport::default();

    // Visits are derived from the declared targets, before confusion
    // rewrites them.
    let sorted = game.sorted_night_actions();
    let mut visits: HashMap<String, NightVisits> = game
        .players
        .iter()
        .map(|p| (p.id.clone(), NightVisits::default()))
        .collect();
    for (actor_id, action) in &sorted {
        if let Some(target_id) = &action.target_id {
            if let Some(v) = visits.get_mut(target_id) {
                v.visited_by.push(actor_id.clone());
            }
            if let Some(v) = visits.get_mut(actor_id) {
                v.visited.push(target_id.clone());
            }
        }
    }

    apply_status_effects(game, rng, &mut report);
    // Redirects may have rewritten targets; later stages read the queue fresh.
    let sorted = game.sorted_night_actions();

    resolve_unique_actions(game, &sorted, &mut report);

    let kill_attempts = gather_kill_attempts(game, &sorted);
    let deaths = resolve_deaths(game, &kill_attempts, &mut report);
    let revived = resolve_revivals(game, &sorted, &deaths, &mut report);

    let mut final_deaths: Vec<DeathRecord> = deaths
        .into_iter()
        .filter(|d| !revived.iter().any(|r| r.target_id == d.victim_id))
        .collect();

    resolve_information_and_plague(game, &sorted, &mut final_deaths, &visits, rng, &mut report);

    report.deaths = final_deaths;
    report.revivals = revived;

    game.clear_nightly_states();
    info!("[game {}] night resolution complete", game.room_id);
    report
}

/// Stage 1: confusion first, then target redirects for confused actors,
/// then corruption and protection.
fn apply_status_effects(game: &mut Game, rng: &mut impl Rng, report: &mut OutcomeReport) {
    let sorted = game.sorted_night_actions();
    for (_, action) in &sorted {
        if action.kind == NightActionKind::Confuse {
            if let Some(target_id) = &action.target_id {
                if let Some(target) = game.get_player_mut(target_id) {
                    target.is_confused = true;
                }
            }
        }
    }

    // Every already-registered targeted action of a confused actor is
    // redirected uniformly among the legal alternates. An empty pool
    // clears the target: the declared one is never honored.
    let mut confused_actors: Vec<String> = game
        .night_actions
        .iter()
        .filter(|(actor_id, action)| {
            action.target_id.is_some()
                && game.get_player(actor_id).is_some_and(|p| p.is_confused)
        })
        .map(|(actor_id, _)| actor_id.clone())
        .collect();
    confused_actors.sort_by_key(|id| game.night_actions[id].seq);

    for actor_id in confused_actors {
        let (original_target, is_revive) = {
            let action = &game.night_actions[&actor_id];
            match &action.target_id {
                Some(t) => (t.clone(), action.kind.is_revive()),
                None => continue,
            }
        };
        let pool: Vec<String> = game
            .players
            .iter()
            .filter(|p| if is_revive { !p.is_alive } else { p.is_alive })
            .filter(|p| p.id != actor_id && p.id != original_target)
            .map(|p| p.id.clone())
            .collect();
        let new_target = pool.choose(rng).cloned();
        if let Some(action) = game.night_actions.get_mut(&actor_id) {
            action.target_id = new_target;
        }
        report.push_private(&actor_id, "Your head spins... your action went all wrong.");
    }

    let sorted = game.sorted_night_actions();
    for (actor_id, action) in &sorted {
        match action.kind {
            NightActionKind::Corrupt => {
                if let Some(target_id) = &action.target_id {
                    if let Some(target) = game.get_player_mut(target_id) {
                        target.is_corrupted = true;
                        report.push_private(
                            target_id,
                            "Your mind was invaded! You cannot use your ability tonight.",
                        );
                    }
                }
            }
            NightActionKind::Protect => {
                let corrupted = game.get_player(actor_id).is_some_and(|p| p.is_corrupted);
                if corrupted {
                    continue;
                }
                if let Some(target_id) = &action.target_id {
                    if let Some(target) = game.get_player_mut(target_id) {
                        target.protected_by = Some(actor_id.clone());
                    }
                }
            }
            _ => {}
        }
    }
}

/// Stage 2: possession and the cupid pairing.
fn resolve_unique_actions(
    game: &mut Game,
    sorted: &[(String, NightAction)],
    report: &mut OutcomeReport,
) {
    for (actor_id, action) in sorted {
        let Some(actor) = game.get_player(actor_id) else {
            continue;
        };
        if actor.is_corrupted {
            continue;
        }

        match action.kind {
            NightActionKind::Possess => {
                // Suppresses the villain aggregate kill for this night only.
                game.skip_villain_kill = true;
                let Some(target_id) = action.target_id.clone() else {
                    continue;
                };
                let Some(target) = game.get_player_mut(&target_id) else {
                    continue;
                };
                target.possession_points = (target.possession_points + 1).min(3);
                let points = target.possession_points;
                let target_name = target.name.clone();
                report.push_private(
                    actor_id,
                    format!(
                        "You added +1 possession point to {}. Total: {}/3.",
                        target_name, points
                    ),
                );
                if points >= 3 {
                    target.role = Role::SimpleAssassin;
                    report.push_private(
                        &target_id,
                        "Your mind has been broken! You are now a Simple Assassin.",
                    );
                    let villains: Vec<String> = game
                        .alive_players()
                        .filter(|p| p.role.is_villain())
                        .map(|p| p.name.clone())
                        .collect();
                    report.push_private(
                        &target_id,
                        format!("Your new partners are: {}.", villains.join(", ")),
                    );
                    let villain_ids: Vec<String> = game
                        .alive_players()
                        .filter(|p| p.role.is_villain() && p.id != target_id)
                        .map(|p| p.id.clone())
                        .collect();
                    for villain_id in villain_ids {
                        report.push_private(
                            &villain_id,
                            format!(
                                "{} was corrupted and is now a Simple Assassin.",
                                target_name
                            ),
                        );
                    }
                }
            }
            NightActionKind::CupidMatch => {
                // The pair is fixed once and immutable for the match.
                if game.lovers.is_some() {
                    continue;
                }
                let Some((lover1, lover2)) = action.lovers.clone() else {
                    continue;
                };
                game.lovers = Some((lover1.clone(), lover2.clone()));
                if let (Some(p1), Some(p2)) = (game.get_player(&lover1), game.get_player(&lover2))
                {
                    let (n1, n2) = (p1.name.clone(), p2.name.clone());
                    report.push_private(
                        &lover1,
                        format!(
                            "Cupid struck you! Your one true love is {}. If one of you dies, the other follows.",
                            n2
                        ),
                    );
                    report.push_private(
                        &lover2,
                        format!(
                            "Cupid struck you! Your one true love is {}. If one of you dies, the other follows.",
                            n1
                        ),
                    );
                }
            }
            _ => {}
        }
    }
}

/// Stage 3: the weighted villain aggregate plus any independent witch kill.
fn gather_kill_attempts(game: &mut Game, sorted: &[(String, NightAction)]) -> Vec<KillAttempt> {
    let mut attempts = Vec::new();
    // target -> (weight tally, earliest vote seq)
    let mut villain_votes: HashMap<String, (u32, u64)> = HashMap::new();

    for (actor_id, action) in sorted {
        let corrupted = game.get_player(actor_id).is_none_or(|p| p.is_corrupted);
        if corrupted {
            continue;
        }
        match action.kind {
            NightActionKind::VillainVote => {
                if let Some(target_id) = &action.target_id {
                    let weight = if action.role.has_weighted_vote() { 2 } else { 1 };
                    let entry = villain_votes
                        .entry(target_id.clone())
                        .or_insert((0, action.seq));
                    entry.0 += weight;
                }
            }
            NightActionKind::WitchKill => {
                if let Some(target_id) = &action.target_id {
                    attempts.push(KillAttempt {
                        target_id: target_id.clone(),
                        source: KillSource::Witch,
                        responsible: vec![actor_id.clone()],
                    });
                    game.witch_potion_used = true;
                }
            }
            _ => {}
        }
    }

    // Highest aggregate wins; ties fall to the earliest-registered vote.
    let villain_target = (!game.skip_villain_kill)
        .then(|| {
            villain_votes
                .iter()
                .max_by(|(_, (w1, s1)), (_, (w2, s2))| w1.cmp(w2).then(s2.cmp(s1)))
                .map(|(t, _)| t.clone())
        })
        .flatten();
    if let Some(target_id) = villain_target {
        let voters: Vec<String> = sorted
            .iter()
            .filter(|(_, a)| {
                a.kind == NightActionKind::VillainVote && a.target_id.as_deref() == Some(&target_id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        attempts.push(KillAttempt {
            target_id,
            source: KillSource::Villain,
            responsible: voters,
        });
    }

    attempts
}

/// Stage 4: protection, innate resistance, then death records.
fn resolve_deaths(
    game: &mut Game,
    attempts: &[KillAttempt],
    report: &mut OutcomeReport,
) -> Vec<DeathRecord> {
    let mut deaths: Vec<DeathRecord> = Vec::new();
    let mut seen_targets: HashSet<String> = HashSet::new();

    for attempt in attempts {
        // Only the first attempt per target counts.
        if !seen_targets.insert(attempt.target_id.clone()) {
            continue;
        }
        let Some(target) = game.get_player(&attempt.target_id) else {
            continue;
        };
        if !target.is_alive {
            continue;
        }

        let protector_id = target.protected_by.clone();
        if let (Some(protector_id), KillSource::Villain) = (protector_id, &attempt.source) {
            // An earlier attempt this night may already have claimed the
            // protector; the absorb still shields the charge, but the first
            // death record stands.
            let already_dying = deaths.iter().any(|d| d.victim_id == protector_id);
            if let Some(protector) = game.get_player_mut(&protector_id) {
                protector.bodyguard_hits_survived += 1;
                if already_dying {
                    // Nothing more to record.
                } else if protector.bodyguard_hits_survived == 1 {
                    report.push_private(
                        &protector_id,
                        "You stepped in front of an attack to shield your charge, and survived!",
                    );
                    report.push_private(
                        &attempt.target_id,
                        "You were attacked, but a protective force saved you tonight.",
                    );
                } else {
                    // The second absorbed hit is fatal; the original target
                    // is kept as context.
                    deaths.push(DeathRecord {
                        victim_id: protector_id.clone(),
                        cause: cause::BODYGUARD_SACRIFICE.to_string(),
                        responsible: vec![attempt.target_id.clone()],
                    });
                }
            }
            continue;
        }

        if target.role.resists_first_hit() {
            let target_id = attempt.target_id.clone();
            if let Some(target) = game.get_player_mut(&target_id) {
                target.bodyguard_hits_survived += 1;
                if target.bodyguard_hits_survived == 1 {
                    report.push_private(
                        &target_id,
                        "You were attacked, but your toughness saved you this time!",
                    );
                    continue;
                }
            }
        }

        let tag = match attempt.source {
            KillSource::Villain => cause::VILLAIN,
            KillSource::Witch => cause::WITCH,
        };
        deaths.push(DeathRecord {
            victim_id: attempt.target_id.clone(),
            cause: tag.to_string(),
            responsible: attempt.responsible.clone(),
        });
    }

    deaths
}

/// Stage 5: angel/witch revivals. A target dying in this same batch is not
/// revived; the death takes precedence.
fn resolve_revivals(
    game: &mut Game,
    sorted: &[(String, NightAction)],
    deaths: &[DeathRecord],
    report: &mut OutcomeReport,
) -> Vec<RevivalRecord> {
    let mut revived = Vec::new();
    for (actor_id, action) in sorted {
        if !action.kind.is_revive() {
            continue;
        }
        let corrupted = game.get_player(actor_id).is_none_or(|p| p.is_corrupted);
        if corrupted {
            continue;
        }
        let Some(target_id) = action.target_id.clone() else {
            continue;
        };
        let dying_now = deaths.iter().any(|d| d.victim_id == target_id);
        let Some(target) = game.get_player(&target_id) else {
            continue;
        };
        if target.is_alive || dying_now {
            continue;
        }

        match action.kind {
            NightActionKind::WitchRevive => game.witch_potion_used = true,
            NightActionKind::AngelRevive => game.angel_revive_used = true,
            _ => {}
        }

        // A revived Mayor restores the medium's spent link. Checked before
        // the ghost state is wiped.
        let restore_medium = game
            .get_player(&target_id)
            .filter(|t| t.role == Role::Mayor)
            .and_then(|t| t.ghost_master_id.clone());

        let Some(target) = game.get_player_mut(&target_id) else {
            continue;
        };
        target.revive();
        target.is_ghost = false;
        target.ghost_master_id = None;
        target.possession_points = 0;
        target.clear_nightly_modifiers();

        if let Some(medium_id) = restore_medium {
            game.medium_talk_used = false;
            report.push_private(&medium_id, "The Mayor was revived! Your power is restored.");
        }

        revived.push(RevivalRecord {
            target_id,
            reviver_id: actor_id.clone(),
        });
    }
    revived
}

/// Stage 6: detective clues, the haunt report, plague extermination and
/// infection spread. Runs after deaths are final for the night.
fn resolve_information_and_plague(
    game: &mut Game,
    sorted: &[(String, NightAction)],
    final_deaths: &mut Vec<DeathRecord>,
    visits: &HashMap<String, NightVisits>,
    rng: &mut impl Rng,
    report: &mut OutcomeReport,
) {
    for (actor_id, action) in sorted {
        let corrupted = game.get_player(actor_id).is_none_or(|p| p.is_corrupted);
        if corrupted || action.kind != NightActionKind::MarkDetective {
            continue;
        }

        let marked_death = final_deaths
            .iter()
            .find(|d| action.marks.contains(&d.victim_id));
        let Some(death) = marked_death else {
            report.push_private(actor_id, "A quiet watch. None of your marks died.");
            continue;
        };
        let victim_id = &death.victim_id;
        let victim_name = game
            .get_player(victim_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let Some(killer_id) = death.responsible.choose(rng).cloned() else {
            report.push_private(
                actor_id,
                format!("{} was killed, but the killer is a mystery.", victim_name),
            );
            continue;
        };
        let killer_name = game
            .get_player(&killer_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let innocent_pool: Vec<String> = game
            .alive_players()
            .filter(|p| p.id != *actor_id && &p.id != victim_id && p.id != killer_id)
            .map(|p| p.name.clone())
            .collect();
        let message = if let Some(innocent) = innocent_pool.choose(rng) {
            let mut clue = vec![killer_name, innocent.clone()];
            clue.shuffle(rng);
            format!(
                "{} was killed. One of these is involved: {}.",
                victim_name,
                clue.join(", ")
            )
        } else {
            // No innocent candidate left: the sole clue is the killer.
            format!(
                "{} was killed. Your only lead points straight at {}.",
                victim_name, killer_name
            )
        };
        report.push_private(actor_id, message);
    }

    // The ghost's haunt report goes to the ghost and its medium.
    if let Some((ghost_id, action)) = sorted
        .iter()
        .find(|(_, a)| a.kind == NightActionKind::Haunt)
    {
        let medium_id = game
            .get_player(ghost_id)
            .and_then(|p| p.ghost_master_id.clone());
        if let (Some(medium_id), Some(target_id)) = (medium_id, &action.target_id) {
            let target_name = game
                .get_player(target_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let empty = NightVisits::default();
            let v = visits.get(target_id).unwrap_or(&empty);
            let name_of = |id: &String| {
                game.get_player(id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default()
            };
            let visited_by: Vec<String> = v
                .visited_by
                .iter()
                .filter(|id| *id != ghost_id)
                .map(name_of)
                .collect();
            let visited: Vec<String> = v.visited.iter().map(name_of).collect();
            let fmt_names = |names: Vec<String>| {
                if names.is_empty() {
                    "no one".to_string()
                } else {
                    names.join(", ")
                }
            };
            let haunt_report = format!(
                "Haunting report on {}:\n- Was visited by: {}\n- Visited: {}",
                target_name,
                fmt_names(visited_by),
                fmt_names(visited)
            );
            report.push_private(ghost_id, haunt_report.clone());
            report.push_private(&medium_id, haunt_report);
        }
    }

    // Plague extermination: an immediate solo win at the threshold,
    // otherwise every living infected dies tonight.
    let exterminate = sorted.iter().find(|(actor_id, a)| {
        a.kind == NightActionKind::PlagueExterminate
            && game.get_player(actor_id).is_some_and(|p| !p.is_corrupted)
    });
    if let Some((plague_id, _)) = exterminate {
        if !game.plague_exterminate_used {
            game.plague_exterminate_used = true;
            let infected: Vec<String> = game
                .alive_players()
                .filter(|p| p.is_infected)
                .map(|p| p.id.clone())
                .collect();
            let settings = crate::models::config::GameSettings::default();
            if infected.len() >= settings.plague_min_infected {
                report.match_outcome = Some(MatchOutcome {
                    title: "Plague victory!".to_string(),
                    faction: "Solo (Plague)".to_string(),
                    reason: format!("The Plague wiped out {} players!", infected.len()),
                    winner_ids: vec![plague_id.clone()],
                });
                return;
            }
            report.plague_kill_count = infected.len();
            for infected_id in infected {
                final_deaths.push(DeathRecord {
                    victim_id: infected_id,
                    cause: cause::PLAGUE.to_string(),
                    responsible: vec![plague_id.clone()],
                });
            }
        }
    }

    // Infection spreads around a living patient zero: whoever targeted them
    // tonight, and whoever they themselves targeted.
    let patient_zero = game.plague_patient_zero_id.clone();
    if let Some(pz_id) = patient_zero {
        let pz_alive = game.get_player(&pz_id).is_some_and(|p| p.is_alive);
        if pz_alive {
            let mut exposed: Vec<String> = game
                .night_actions
                .iter()
                .filter(|(_, a)| a.target_id.as_deref() == Some(&pz_id))
                .map(|(actor_id, _)| actor_id.clone())
                .collect();
            if let Some(pz_target) = game
                .night_actions
                .get(&pz_id)
                .and_then(|a| a.target_id.clone())
            {
                exposed.push(pz_target);
            }
            for exposed_id in exposed {
                if Some(&exposed_id) == game.plague_player_id.as_ref() {
                    continue;
                }
                if let Some(p) = game.get_player_mut(&exposed_id) {
                    if !p.is_infected {
                        p.is_infected = true;
                        report.push_private(
                            &exposed_id,
                            "You feel feverish... the Plague has infected you!",
                        );
                    }
                }
            }
        }
    }
}

/// Tallies the day votes into a lynch decision.
///
/// Skip majority voids the vote; fraud shuffles the vote multiset among the
/// voters once; the emergency decree triples the mayor's vote and doubles
/// the rest of the town; the leader must still reach a strict majority of
/// the living, and an exact tie voids the lynch. The mayor survives one
/// otherwise-successful lynch per match.
pub fn process_lynch(game: &mut Game, rng: &mut impl Rng) -> LynchDecision {
    let mut decision = LynchDecision::default();
    let majority_needed = game.majority_needed();

    if game.day_skip_votes.len() >= majority_needed {
        decision
            .report
            .push_public("The majority decided to skip the vote.");
        return decision;
    }
    if game.day_votes.is_empty() {
        decision.report.push_public("No one was lynched.");
        return decision;
    }

    let mut votes: Vec<(String, String)> = game
        .day_votes
        .iter()
        .map(|(v, t)| (v.clone(), t.clone()))
        .collect();
    votes.sort_by(|(a, _), (b, _)| a.cmp(b));

    if game.fraud_active {
        info!("[game {}] fraud active, shuffling votes", game.room_id);
        let mut targets: Vec<String> = votes.iter().map(|(_, t)| t.clone()).collect();
        targets.shuffle(rng);
        for ((_, t), new_t) in votes.iter_mut().zip(targets) {
            *t = new_t;
        }
        decision
            .report
            .push_public("The vote results look... strange.");
    }

    let mut tallies: HashMap<String, usize> = HashMap::new();
    for (voter_id, target_id) in &votes {
        let mut weight = 1;
        if game.decree_active {
            if let Some(voter) = game.get_player(voter_id) {
                if voter.role == Role::Mayor {
                    weight = 3;
                } else if voter.role.faction() == Faction::Town {
                    weight = 2;
                }
            }
        }
        *tallies.entry(target_id.clone()).or_insert(0) += weight;
    }

    if game.decree_active {
        let mut details: Vec<String> = tallies
            .iter()
            .map(|(target_id, count)| {
                let name = game
                    .get_player(target_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                format!("{} ({} votes)", name, count)
            })
            .collect();
        details.sort();
        decision.report.push_public(format!(
            "Under the decree, the final tally was: {}.",
            details.join(", ")
        ));
    }

    let max_votes = tallies.values().copied().max().unwrap_or(0);
    if max_votes < majority_needed {
        decision.report.push_public(format!(
            "The vote did not reach the majority of {} votes.",
            majority_needed
        ));
        return decision;
    }
    let leaders: Vec<&String> = tallies
        .iter()
        .filter(|(_, count)| **count == max_votes)
        .map(|(t, _)| t)
        .collect();
    if leaders.len() != 1 {
        decision.report.push_public("The vote ended in a tie.");
        return decision;
    }

    let lynched_id = leaders[0].clone();
    let (lynched_name, lynched_role) = match game.get_player(&lynched_id) {
        Some(p) => (p.name.clone(), p.role),
        None => return decision,
    };

    if lynched_role == Role::Mayor && !game.mayor_pardon_used {
        game.mayor_pardon_used = true;
        decision.report.push_public(format!(
            "The vote to lynch {} was overwhelming! And yet, the town reconsidered.",
            lynched_name
        ));
        return decision;
    }

    decision.report.push_public(format!(
        "With {} votes, {} was lynched!",
        max_votes, lynched_name
    ));
    decision.lynched = Some(lynched_id);
    decision
}

/// Records the kills and revivals that actually landed, consumed later by
/// the witch's secondary-win scan.
pub fn record_major_actions(game: &mut Game, report: &OutcomeReport) {
    for death in &report.deaths {
        if death.cause == cause::WITCH {
            if let Some(actor_id) = death.responsible.first() {
                game.successful_major_actions.push(
                    crate::models::game::MajorAction {
                        actor_id: actor_id.clone(),
                        kind: MajorActionKind::Kill,
                        target_id: death.victim_id.clone(),
                    },
                );
            }
        }
    }
    for revival in &report.revivals {
        game.successful_major_actions
            .push(crate::models::game::MajorAction {
                actor_id: revival.reviver_id.clone(),
                kind: MajorActionKind::Revive,
                target_id: revival.target_id.clone(),
            });
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::models::player::PlayerState;

    fn player(id: &str, role: Role) -> PlayerState {
        PlayerState::new(id.to_string(), format!("Player {}", id), role)
    }

    fn action(kind: NightActionKind, role: Role, target: Option<&str>) -> NightAction {
        NightAction {
            kind,
            role,
            priority: kind.priority(),
            seq: 0,
            target_id: target.map(|t| t.to_string()),
            marks: vec![],
            lovers: None,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn villain_kill_lands_without_protection() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("1", Role::AlphaAssassin),
                player("2", Role::Villager),
                player("3", Role::Villager),
                player("4", Role::Villager),
                player("5", Role::Villager),
            ],
        );
        game.register_night_action(
            "1",
            action(NightActionKind::VillainVote, Role::AlphaAssassin, Some("2")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert_eq!(report.deaths.len(), 1);
        assert_eq!(report.deaths[0].victim_id, "2");
        assert_eq!(report.deaths[0].cause, cause::VILLAIN);
        assert_eq!(report.deaths[0].responsible, vec!["1".to_string()]);
        assert!(game.night_actions.is_empty());
    }

    #[test]
    fn first_absorbed_hit_saves_both_protector_and_target() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("guard", Role::Bodyguard),
                player("mayor", Role::Mayor),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.register_night_action(
            "guard",
            action(NightActionKind::Protect, Role::Bodyguard, Some("mayor")),
        );
        game.register_night_action(
            "alpha",
            action(NightActionKind::VillainVote, Role::AlphaAssassin, Some("mayor")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert!(report.deaths.is_empty());
        assert_eq!(game.get_player("guard").unwrap().bodyguard_hits_survived, 1);
    }

    #[test]
    fn second_absorbed_hit_is_a_bodyguard_sacrifice() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("guard", Role::Bodyguard),
                player("mayor", Role::Mayor),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.get_player_mut("guard").unwrap().bodyguard_hits_survived = 1;
        game.register_night_action(
            "guard",
            action(NightActionKind::Protect, Role::Bodyguard, Some("mayor")),
        );
        game.register_night_action(
            "alpha",
            action(NightActionKind::VillainVote, Role::AlphaAssassin, Some("mayor")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert_eq!(report.deaths.len(), 1);
        let death = &report.deaths[0];
        assert_eq!(death.victim_id, "guard");
        assert_eq!(death.cause, cause::BODYGUARD_SACRIFICE);
        assert_eq!(death.responsible, vec!["mayor".to_string()]);
        assert!(game.get_player("mayor").unwrap().is_alive);
    }

    #[test]
    fn protection_does_not_stop_a_witch_kill() {
        // Scenario B: the mayor is guarded but killed by a witch, a
        // non-villain source the protection does not cover.
        let mut game = Game::new(
            "room".into(),
            vec![
                player("guard", Role::Bodyguard),
                player("mayor", Role::Mayor),
                player("witch", Role::Witch),
            ],
        );
        game.register_night_action(
            "guard",
            action(NightActionKind::Protect, Role::Bodyguard, Some("mayor")),
        );
        game.register_night_action(
            "witch",
            action(NightActionKind::WitchKill, Role::Witch, Some("mayor")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert_eq!(report.deaths.len(), 1);
        assert_eq!(report.deaths[0].victim_id, "mayor");
        assert_eq!(report.deaths[0].cause, cause::WITCH);
        assert!(game.witch_potion_used);
    }

    #[test]
    fn bodyguard_sacrifice_outranks_witch_attack_on_guard() {
        // Regression case: the guard protects the mayor, the
        // villains hit the mayor and the witch hits the guard. The guard has
        // already absorbed one hit, so the absorbed villain hit kills them
        // as a sacrifice, and that first attempt on the guard wins.
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("guard", Role::Bodyguard),
                player("alpha", Role::AlphaAssassin),
                player("witch", Role::Witch),
                player("det", Role::Detective),
            ],
        );
        game.get_player_mut("guard").unwrap().bodyguard_hits_survived = 1;
        game.register_night_action(
            "guard",
            action(NightActionKind::Protect, Role::Bodyguard, Some("mayor")),
        );
        game.register_night_action(
            "alpha",
            action(NightActionKind::VillainVote, Role::AlphaAssassin, Some("mayor")),
        );
        game.register_night_action(
            "witch",
            action(NightActionKind::WitchKill, Role::Witch, Some("guard")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert_eq!(report.deaths.len(), 1);
        let death = &report.deaths[0];
        assert_eq!(death.victim_id, "guard");
        assert_eq!(death.cause, cause::WITCH);
    }

    #[test]
    fn confused_actor_never_hits_declared_target() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("junior", Role::JuniorAssassin),
                player("witch", Role::Witch),
                player("a", Role::Villager),
                player("b", Role::Villager),
            ],
        );
        game.register_night_action(
            "junior",
            action(NightActionKind::Confuse, Role::JuniorAssassin, Some("witch")),
        );
        game.register_night_action(
            "witch",
            action(NightActionKind::WitchKill, Role::Witch, Some("a")),
        );
        for seed in 0..20 {
            let mut g = game.clone();
            let mut rng = StdRng::seed_from_u64(seed);
            let report = resolve_night_actions(&mut g, &mut rng);
            for death in &report.deaths {
                assert_ne!(death.victim_id, "a", "declared target was honored");
            }
        }
    }

    #[test]
    fn confusion_with_empty_pool_becomes_a_no_op() {
        // Two players: the witch's only alternate targets are itself and the
        // declared one, both excluded, so the kill must fizzle.
        let mut game = Game::new(
            "room".into(),
            vec![
                player("junior", Role::JuniorAssassin),
                player("witch", Role::Witch),
            ],
        );
        game.register_night_action(
            "junior",
            action(NightActionKind::Confuse, Role::JuniorAssassin, Some("witch")),
        );
        game.register_night_action(
            "witch",
            action(NightActionKind::WitchKill, Role::Witch, Some("junior")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert!(report.deaths.is_empty());
    }

    #[test]
    fn corrupted_protector_grants_no_protection() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("corruptor", Role::Corruptor),
                player("guard", Role::Bodyguard),
                player("mayor", Role::Mayor),
                player("alpha", Role::AlphaAssassin),
            ],
        );
        game.register_night_action(
            "corruptor",
            action(NightActionKind::Corrupt, Role::Corruptor, Some("guard")),
        );
        game.register_night_action(
            "guard",
            action(NightActionKind::Protect, Role::Bodyguard, Some("mayor")),
        );
        game.register_night_action(
            "alpha",
            action(NightActionKind::VillainVote, Role::AlphaAssassin, Some("mayor")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert_eq!(report.deaths.len(), 1);
        assert_eq!(report.deaths[0].victim_id, "mayor");
    }

    #[test]
    fn possession_suppresses_villain_kill_and_converts_at_three() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("alpha", Role::AlphaAssassin),
                player("simple", Role::SimpleAssassin),
                player("target", Role::Villager),
                player("bystander", Role::Villager),
            ],
        );
        game.get_player_mut("target").unwrap().possession_points = 2;
        game.register_night_action(
            "alpha",
            action(NightActionKind::Possess, Role::AlphaAssassin, Some("target")),
        );
        // The other villain's vote is suppressed for this night.
        game.register_night_action(
            "simple",
            action(NightActionKind::VillainVote, Role::SimpleAssassin, Some("bystander")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert!(report.deaths.is_empty());
        assert_eq!(game.get_player("target").unwrap().role, Role::SimpleAssassin);
    }

    #[test]
    fn dying_target_is_not_revived_in_same_batch() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("alpha", Role::AlphaAssassin),
                player("angel", Role::Angel),
                player("victim", Role::Villager),
                player("bystander", Role::Villager),
            ],
        );
        game.register_night_action(
            "alpha",
            action(NightActionKind::VillainVote, Role::AlphaAssassin, Some("victim")),
        );
        game.register_night_action(
            "angel",
            action(NightActionKind::AngelRevive, Role::Angel, Some("victim")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert_eq!(report.deaths.len(), 1);
        assert!(report.revivals.is_empty());
        // The attempt targeted someone alive, so the one-shot is not spent.
        assert!(!game.angel_revive_used);
    }

    #[test]
    fn revival_applies_and_consumes_the_one_shot() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("angel", Role::Angel),
                player("dead", Role::Villager),
                player("bystander", Role::Villager),
            ],
        );
        game.get_player_mut("dead").unwrap().kill();
        game.register_night_action(
            "angel",
            action(NightActionKind::AngelRevive, Role::Angel, Some("dead")),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert_eq!(
            report.revivals,
            vec![RevivalRecord {
                target_id: "dead".to_string(),
                reviver_id: "angel".to_string()
            }]
        );
        assert!(game.get_player("dead").unwrap().is_alive);
        assert!(game.angel_revive_used);
    }

    #[test]
    fn plague_exterminate_below_threshold_kills_infected() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("plague", Role::Plague),
                player("a", Role::Villager),
                player("b", Role::Villager),
                player("c", Role::Villager),
            ],
        );
        game.plague_player_id = Some("plague".to_string());
        game.get_player_mut("a").unwrap().is_infected = true;
        game.get_player_mut("b").unwrap().is_infected = true;
        game.register_night_action(
            "plague",
            action(NightActionKind::PlagueExterminate, Role::Plague, None),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        assert!(report.match_outcome.is_none());
        assert_eq!(report.plague_kill_count, 2);
        let victims: HashSet<&str> = report
            .deaths
            .iter()
            .map(|d| d.victim_id.as_str())
            .collect();
        assert_eq!(victims, HashSet::from(["a", "b"]));
        assert!(game.plague_exterminate_used);
    }

    #[test]
    fn plague_exterminate_at_threshold_ends_the_match() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("plague", Role::Plague),
                player("a", Role::Villager),
                player("b", Role::Villager),
                player("c", Role::Villager),
                player("d", Role::Villager),
            ],
        );
        game.plague_player_id = Some("plague".to_string());
        for id in ["a", "b", "c", "d"] {
            game.get_player_mut(id).unwrap().is_infected = true;
        }
        game.register_night_action(
            "plague",
            action(NightActionKind::PlagueExterminate, Role::Plague, None),
        );
        let report = resolve_night_actions(&mut game, &mut rng());
        let outcome = report.match_outcome.expect("match should end");
        assert_eq!(outcome.winner_ids, vec!["plague".to_string()]);
    }

    #[test]
    fn infection_spreads_through_contact_with_patient_zero() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("plague", Role::Plague),
                player("zero", Role::Villager),
                player("visitor", Role::Bodyguard),
                player("touched", Role::Villager),
            ],
        );
        game.plague_player_id = Some("plague".to_string());
        game.plague_patient_zero_id = Some("zero".to_string());
        game.register_night_action(
            "visitor",
            action(NightActionKind::Protect, Role::Bodyguard, Some("zero")),
        );
        game.register_night_action(
            "zero",
            action(NightActionKind::Protect, Role::Bodyguard, Some("touched")),
        );
        resolve_night_actions(&mut game, &mut rng());
        assert!(game.get_player("visitor").unwrap().is_infected);
        assert!(game.get_player("touched").unwrap().is_infected);
        assert!(!game.get_player("plague").unwrap().is_infected);
    }

    #[test]
    fn lynch_needs_strict_majority() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("1", Role::Villager),
                player("2", Role::Villager),
                player("3", Role::Villager),
                player("4", Role::Villager),
                player("5", Role::AlphaAssassin),
            ],
        );
        game.day_votes.insert("1".into(), "5".into());
        game.day_votes.insert("2".into(), "5".into());
        let decision = process_lynch(&mut game, &mut rng());
        assert!(decision.lynched.is_none());
    }

    #[test]
    fn skip_majority_voids_the_vote() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("1", Role::Villager),
                player("2", Role::Villager),
                player("3", Role::Villager),
                player("4", Role::AlphaAssassin),
            ],
        );
        for id in ["1", "2", "3"] {
            game.day_skip_votes.insert(id.to_string());
        }
        // Even a unanimous-looking vote map is ignored.
        game.day_votes.insert("4".into(), "1".into());
        let decision = process_lynch(&mut game, &mut rng());
        assert!(decision.lynched.is_none());
    }

    #[test]
    fn exact_tie_voids_the_lynch() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("1", Role::Villager),
                player("2", Role::Villager),
                player("3", Role::Villager),
                player("4", Role::Villager),
                player("5", Role::Villager),
                player("6", Role::AlphaAssassin),
            ],
        );
        // Six alive, majority 4. Decree weights push both leaders to exactly
        // four votes, and the tie voids the lynch.
        game.decree_active = true;
        game.day_votes.insert("1".into(), "6".into());
        game.day_votes.insert("2".into(), "6".into());
        game.day_votes.insert("3".into(), "5".into());
        game.day_votes.insert("4".into(), "5".into());
        let decision = process_lynch(&mut game, &mut rng());
        assert!(decision.lynched.is_none());
    }

    #[test]
    fn decree_weights_carry_the_lynch() {
        // Scenario D: four town voters at weight 2, the mayor at weight 3,
        // one villain elsewhere at weight 1. 11 vs 1 with majority 6.
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("t1", Role::Villager),
                player("t2", Role::Villager),
                player("t3", Role::Villager),
                player("t4", Role::Villager),
                player("villain", Role::AlphaAssassin),
                player("y", Role::Witch),
                player("other", Role::Villager),
                player("extra1", Role::Villager),
                player("extra2", Role::Villager),
                player("extra3", Role::Villager),
            ],
        );
        game.decree_active = true;
        for voter in ["mayor", "t1", "t2", "t3", "t4"] {
            game.day_votes.insert(voter.into(), "y".into());
        }
        game.day_votes.insert("villain".into(), "other".into());
        let decision = process_lynch(&mut game, &mut rng());
        assert_eq!(decision.lynched, Some("y".to_string()));
    }

    #[test]
    fn mayor_pardon_survives_one_lynch() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("mayor", Role::Mayor),
                player("1", Role::Villager),
                player("2", Role::Villager),
            ],
        );
        game.day_votes.insert("1".into(), "mayor".into());
        game.day_votes.insert("2".into(), "mayor".into());
        let decision = process_lynch(&mut game, &mut rng());
        assert!(decision.lynched.is_none());
        assert!(game.mayor_pardon_used);

        game.day_votes.insert("1".into(), "mayor".into());
        game.day_votes.insert("2".into(), "mayor".into());
        let decision = process_lynch(&mut game, &mut rng());
        assert_eq!(decision.lynched, Some("mayor".to_string()));
    }

    #[test]
    fn fraud_preserves_the_vote_multiset() {
        let mut game = Game::new(
            "room".into(),
            vec![
                player("1", Role::Villager),
                player("2", Role::Villager),
                player("3", Role::Villager),
            ],
        );
        game.fraud_active = true;
        game.day_votes.insert("1".into(), "3".into());
        game.day_votes.insert("2".into(), "3".into());
        game.day_votes.insert("3".into(), "1".into());
        // Whatever the shuffle, 3 still holds two of the three votes and
        // majority is 2, so either 3 is lynched or the shuffle moved its
        // votes apart; with a 2/1 split the leader always has 2 votes.
        let decision = process_lynch(&mut game, &mut rng());
        assert!(decision.lynched.is_some());
    }
}
