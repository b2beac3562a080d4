//! Deterrence behaviour: decides whether and where a nation launches a MIRV.
//!
//! Embedded in the nation controller; never scheduled on its own.

use serde::{Deserialize, Serialize};
use sim_schema::{Difficulty, EmojiTarget, ExecutionRequest, GameMode, PlayerId, Team, TileRef, UnitKind};

use crate::{config::MirvCooldownModel, fixed, game::Game, rng::PseudoRandom};

/// Troop strength above which extra troops count logarithmically.
pub const TROOP_DIMINISHING_LIMIT: u64 = 500_000;
pub const MAX_PROXIMITY_BONUS: f64 = 2.5;
const BORDER_SAMPLE_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Probability of skipping a launch opportunity.
    pub hesitation: f64,
    pub team_threshold: f64,
    pub individual_threshold: f64,
    pub steamroll_min_cities: u32,
    pub steamroll_lead: f64,
}

impl DifficultyProfile {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let (hesitation, team_threshold, individual_threshold, steamroll_min_cities, steamroll_lead) =
            match difficulty {
                Difficulty::Easy => (0.9, 0.9, 0.75, 15, 1.5),
                Difficulty::Medium => (0.7, 0.8, 0.65, 12, 1.35),
                Difficulty::Hard => (0.5, 0.7, 0.5, 10, 1.25),
                Difficulty::Impossible => (0.3, 0.6, 0.4, 8, 1.15),
            };
        Self {
            hesitation,
            team_threshold,
            individual_threshold,
            steamroll_min_cities,
            steamroll_lead,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirvReason {
    CounterStrike,
    VictoryDenial,
    Steamroll,
}

impl MirvReason {
    pub fn as_str(self) -> &'static str {
        match self {
            MirvReason::CounterStrike => "counter_strike",
            MirvReason::VictoryDenial => "victory_denial",
            MirvReason::Steamroll => "steamroll",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirvDecision {
    pub target: PlayerId,
    pub tile: TileRef,
    pub reason: MirvReason,
}

/// Stateless: the cooldown reads launches the resolver actually accepted, so a
/// rejected request never starts the window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirvBehavior;

impl MirvBehavior {
    pub fn last_launch_tick(&self, game: &Game, player: PlayerId) -> Option<u64> {
        game.stats().last_mirv_launch.get(&player).copied()
    }

    fn cooling_down(&self, game: &Game, player: PlayerId) -> bool {
        match game.config.mirv.cooldown_model {
            MirvCooldownModel::FixedWindow => self
                .last_launch_tick(game, player)
                .is_some_and(|tick| game.ticks() < tick + game.config.mirv.cooldown_ticks),
            MirvCooldownModel::NonePending => {
                !game
                    .units_of(player, &[UnitKind::Mirv, UnitKind::MirvWarhead])
                    .is_empty()
            }
        }
    }

    /// Runs the gate checks and target priority; on success submits the
    /// launch and the global signal.
    pub fn consider(
        &self,
        game: &mut Game,
        player: PlayerId,
        rng: &mut PseudoRandom,
    ) -> Option<MirvDecision> {
        if game.unit_count(player, UnitKind::MissileSilo) == 0
            || !game.can_afford(player, UnitKind::Mirv)
            || self.cooling_down(game, player)
        {
            return None;
        }
        let profile = DifficultyProfile::for_difficulty(game.config.difficulty);
        if rng.next_float() < profile.hesitation {
            return None;
        }

        let (target, reason) = counter_strike_target(game, player)
            .map(|t| (t, MirvReason::CounterStrike))
            .or_else(|| victory_denial_target(game, player, &profile).map(|t| (t, MirvReason::VictoryDenial)))
            .or_else(|| steamroll_target(game, player, &profile).map(|t| (t, MirvReason::Steamroll)))?;
        let tile = game.territory_center(target)?;
        game.can_build(player, UnitKind::Mirv, tile)?;

        game.submit(ExecutionRequest::LaunchMirv { player, target: tile });
        game.send_emoji(player, EmojiTarget::All, "☢️");
        tracing::info!(
            target: "frontline::mirv",
            player = %player,
            target_player = %target,
            tile = %tile,
            reason = reason.as_str(),
            "mirv.launched"
        );
        Some(MirvDecision {
            target,
            tile,
            reason,
        })
    }
}

/// Alive, landed, not the launcher, not a teammate or ally, and outside the
/// launcher's vassal hierarchy.
pub fn is_valid_target(game: &Game, player: PlayerId, other: PlayerId) -> bool {
    if player == other || game.is_friendly(player, other) || game.shares_hierarchy(player, other) {
        return false;
    }
    game.player(other)
        .is_some_and(|p| p.is_alive() && p.num_tiles_owned() > 0)
}

/// Own troops plus overlord support, counted logarithmically above the limit.
pub fn effective_troops(game: &Game, player: PlayerId) -> f64 {
    let Some(p) = game.player(player) else {
        return 0.0;
    };
    let mut troops = p.troops();
    if let Some(overlord) = p.overlord() {
        if let Some(lord) = game.player(overlord.player) {
            troops += (lord.troops() as f64 * overlord.support_ratio) as u64;
        }
    }
    if troops <= TROOP_DIMINISHING_LIMIT {
        return troops as f64;
    }
    let limit = u128::from(TROOP_DIMINISHING_LIMIT);
    let bonus = (limit * fixed::ln_ratio(troops, TROOP_DIMINISHING_LIMIT)) >> fixed::FRAC_BITS;
    (limit + bonus) as f64
}

fn sample_border(game: &Game, members: &[PlayerId]) -> Vec<TileRef> {
    let tiles: Vec<TileRef> = members
        .iter()
        .filter_map(|&id| game.player(id))
        .flat_map(|p| p.border_tiles().iter().copied())
        .collect();
    let stride = (tiles.len() / BORDER_SAMPLE_LIMIT).max(1);
    tiles.into_iter().step_by(stride).collect()
}

/// Shortest distance between the two players' hierarchies; zero when any
/// members border each other.
pub fn hierarchy_distance(game: &Game, a: PlayerId, b: PlayerId) -> Option<u32> {
    let ours = game.hierarchy_members(game.hierarchy_root(a));
    let theirs = game.hierarchy_members(game.hierarchy_root(b));
    let bordering = ours
        .iter()
        .any(|&x| theirs.iter().any(|&y| game.shares_border(x, y)));
    if bordering {
        return Some(0);
    }
    let from = sample_border(game, &ours);
    let to = sample_border(game, &theirs);
    let map = game.map();
    map.closest_two_tiles(&from, &to)
        .map(|(x, y)| map.manhattan(x, y))
}

/// Multiplier in [1, 1 + MAX_PROXIMITY_BONUS], largest for bordering enemies.
pub fn proximity_multiplier(distance: Option<u32>, falloff: f64) -> f64 {
    match distance {
        Some(d) => 1.0 + MAX_PROXIMITY_BONUS * (1.0 - f64::from(d) / falloff.max(1.0)).max(0.0),
        None => 1.0,
    }
}

pub fn threat(game: &Game, player: PlayerId, other: PlayerId) -> f64 {
    let distance = hierarchy_distance(game, player, other);
    effective_troops(game, other) * proximity_multiplier(distance, game.config.mirv.proximity_falloff)
}

fn most_threatening(game: &Game, player: PlayerId, candidates: impl Iterator<Item = PlayerId>) -> Option<PlayerId> {
    let mut best: Option<(PlayerId, f64)> = None;
    for candidate in candidates {
        let score = threat(game, player, candidate);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(id, _)| id)
}

/// Enemies whose own MIRVs are aimed at our territory.
pub fn counter_strike_target(game: &Game, player: PlayerId) -> Option<PlayerId> {
    let mut attackers: Vec<PlayerId> = game
        .units_by_kind(&[UnitKind::Mirv, UnitKind::MirvWarhead])
        .into_iter()
        .filter(|unit| {
            unit.target_tile()
                .is_some_and(|tile| game.owner(tile) == Some(player))
        })
        .map(|unit| unit.owner())
        .filter(|&owner| is_valid_target(game, player, owner))
        .collect();
    attackers.sort();
    attackers.dedup();
    most_threatening(game, player, attackers.into_iter())
}

fn land_for_victory(game: &Game) -> f64 {
    let map = game.map();
    map.num_land_tiles().saturating_sub(map.num_fallout_tiles()).max(1) as f64
}

/// Teams or individuals approaching the win condition.
pub fn victory_denial_target(
    game: &Game,
    player: PlayerId,
    profile: &DifficultyProfile,
) -> Option<PlayerId> {
    let land = land_for_victory(game);
    let own_team = game.player(player).and_then(|p| p.team());
    let mut best: Option<(PlayerId, f64, f64)> = None;
    let mut offer = |candidate: PlayerId, severity: f64| {
        let danger = threat(game, player, candidate);
        let better = best.map_or(true, |(_, s, t)| severity > s || (severity == s && danger > t));
        if better {
            best = Some((candidate, severity, danger));
        }
    };

    if game.config.game_mode == GameMode::Team {
        let mut teams: Vec<Team> = game
            .active_players()
            .filter_map(|p| p.team())
            .filter(|&team| team != Team::Bot && Some(team) != own_team)
            .collect();
        teams.sort();
        teams.dedup();
        for team in teams {
            let members: Vec<PlayerId> = game
                .active_players()
                .filter(|p| p.team() == Some(team))
                .map(|p| p.id())
                .collect();
            let share = members
                .iter()
                .filter_map(|&id| game.player(id))
                .map(|p| p.num_tiles_owned())
                .sum::<usize>() as f64
                / land;
            if share < profile.team_threshold {
                continue;
            }
            let leader = members
                .iter()
                .copied()
                .filter(|&id| is_valid_target(game, player, id))
                .max_by_key(|&id| {
                    (
                        game.player(id).map_or(0, |p| p.num_tiles_owned()),
                        std::cmp::Reverse(id),
                    )
                });
            if let Some(leader) = leader {
                offer(leader, share / profile.team_threshold);
            }
        }
    }

    let individuals: Vec<(PlayerId, f64)> = game
        .active_players()
        .filter(|p| is_valid_target(game, player, p.id()))
        .map(|p| (p.id(), p.num_tiles_owned() as f64 / land))
        .filter(|&(_, share)| share >= profile.individual_threshold)
        .collect();
    for (id, share) in individuals {
        offer(id, share / profile.individual_threshold);
    }
    best.map(|(id, _, _)| id)
}

/// City-count leader running away from the runner-up.
pub fn steamroll_target(
    game: &Game,
    player: PlayerId,
    profile: &DifficultyProfile,
) -> Option<PlayerId> {
    let mut cities: Vec<(u32, PlayerId)> = game
        .active_players()
        .map(|p| (game.unit_levels(p.id(), UnitKind::City), p.id()))
        .collect();
    cities.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    let &(leader_cities, leader) = cities.first()?;
    let runner_up = cities.get(1).map_or(0, |&(count, _)| count);
    if leader_cities < profile.steamroll_min_cities {
        return None;
    }
    if f64::from(leader_cities) < f64::from(runner_up) * profile.steamroll_lead {
        return None;
    }
    is_valid_target(game, player, leader).then_some(leader)
}
