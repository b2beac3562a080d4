//! Tactical nuke placement against the enemy a nation is currently fighting.

use serde::{Deserialize, Serialize};
use sim_schema::{ExecutionRequest, PlayerId, TileRef, UnitKind};

use crate::{game::Game, rng::PseudoRandom};

pub const TERRITORY_SAMPLES: usize = 10;
pub const STRUCTURE_VALUE_RADIUS: u32 = 25;
pub const SAM_PENALTY_RADIUS: u32 = 50;
pub const SAM_PENALTY: i64 = 50_000;
pub const SILO_DISTANCE_PENALTY: i64 = 30;
pub const RECENT_STRIKE_RADIUS: u32 = 25;
pub const RECENT_STRIKE_PENALTY: i64 = 1_000_000;

pub fn structure_value(kind: UnitKind) -> i64 {
    match kind {
        UnitKind::City => 25_000,
        UnitKind::MissileSilo => 50_000,
        UnitKind::Port => 10_000,
        UnitKind::DefensePost => 5_000,
        _ => 0,
    }
}

/// Tiles this nation struck recently, with the tick each strike was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeLog {
    strikes: Vec<(TileRef, u64)>,
}

impl StrikeLog {
    /// Forgets strikes older than `window` ticks.
    pub fn prune(&mut self, now: u64, window: u64) {
        self.strikes.retain(|&(_, sent)| sent + window >= now);
    }

    pub fn record(&mut self, tile: TileRef, now: u64) {
        self.strikes.push((tile, now));
    }

    pub fn contains(&self, tile: TileRef) -> bool {
        self.strikes.iter().any(|&(struck, _)| struck == tile)
    }

    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    fn near(&self, game: &Game, tile: TileRef, radius: u32) -> i64 {
        let radius_sq = u64::from(radius) * u64::from(radius);
        self.strikes
            .iter()
            .filter(|&&(struck, _)| game.map().euclidean_sq(struck, tile) <= radius_sq)
            .count() as i64
    }
}

/// Heaviest bomb the player can pay for.
pub fn affordable_bomb(game: &Game, player: PlayerId) -> Option<UnitKind> {
    [UnitKind::HydrogenBomb, UnitKind::AtomBomb]
        .into_iter()
        .find(|&kind| game.can_afford(player, kind))
}

/// Whether every tile within half the blast radius belongs to `enemy`.
pub fn blast_stays_inside(game: &Game, enemy: PlayerId, kind: UnitKind, tile: TileRef) -> bool {
    let radius = game.config.nuke_magnitude(kind).outer / 2;
    game.map()
        .tiles_within_manhattan(tile, radius)
        .into_iter()
        .all(|t| game.owner(t) == Some(enemy))
}

pub fn score_target(
    game: &Game,
    player: PlayerId,
    enemy: PlayerId,
    tile: TileRef,
    strikes: &StrikeLog,
) -> i64 {
    let map = game.map();
    let structures: i64 = game
        .nearby_units(tile, STRUCTURE_VALUE_RADIUS, &UnitKind::STRUCTURES)
        .iter()
        .filter(|unit| unit.owner() == enemy)
        .map(|unit| structure_value(unit.kind()))
        .sum();
    let sams = game
        .nearby_units(tile, SAM_PENALTY_RADIUS, &[UnitKind::SamLauncher])
        .iter()
        .filter(|unit| unit.owner() == enemy)
        .count() as i64;
    let silo_distance = game
        .units_of(player, &[UnitKind::MissileSilo])
        .iter()
        .map(|silo| i64::from(map.manhattan(silo.tile(), tile)))
        .min()
        .unwrap_or(0);

    structures
        - SAM_PENALTY * sams
        - SILO_DISTANCE_PENALTY * silo_distance
        - RECENT_STRIKE_PENALTY * strikes.near(game, tile, RECENT_STRIKE_RADIUS)
}

/// Evaluates a strike on `enemy` and submits it when a candidate scores above
/// zero. Returns the struck tile.
pub fn maybe_send_nuke(
    game: &mut Game,
    player: PlayerId,
    enemy: PlayerId,
    rng: &mut PseudoRandom,
    strikes: &mut StrikeLog,
) -> Option<TileRef> {
    if game.unit_count(player, UnitKind::MissileSilo) == 0 {
        return None;
    }
    let kind = affordable_bomb(game, player)?;
    let now = game.ticks();
    strikes.prune(now, game.config.nation.nuke_dedup_window_ticks);

    let enemy_tiles: Vec<TileRef> = game.player(enemy)?.tiles().iter().copied().collect();
    if enemy_tiles.is_empty() {
        return None;
    }
    let mut candidates = Vec::with_capacity(TERRITORY_SAMPLES);
    for _ in 0..TERRITORY_SAMPLES {
        if let Some(&tile) = rng.rand_element(&enemy_tiles) {
            candidates.push(tile);
        }
    }
    candidates.extend(
        game.units_of(enemy, &UnitKind::STRUCTURES)
            .iter()
            .map(|unit| unit.tile()),
    );

    let mut best: Option<(TileRef, i64)> = None;
    for tile in candidates {
        if strikes.contains(tile)
            || !blast_stays_inside(game, enemy, kind, tile)
            || game.can_build(player, kind, tile).is_none()
        {
            continue;
        }
        let score = score_target(game, player, enemy, tile, strikes);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((tile, score));
        }
    }

    let (target, score) = best.filter(|&(_, score)| score > 0)?;
    strikes.record(target, now);
    game.submit(ExecutionRequest::LaunchNuke {
        player,
        kind,
        target,
    });
    tracing::info!(
        target: "frontline::nation",
        player = %player,
        enemy = %enemy,
        kind = %kind,
        tile = %target,
        score,
        "nation.nuke_sent"
    );
    Some(target)
}
