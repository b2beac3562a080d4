//! Tile-value heuristics for choosing where a nation builds a structure.
//!
//! [`structure_tile_value`] is a pure factory: it snapshots the relevant
//! structures of the world once and returns a scoring closure. Legality is
//! not checked here; callers filter candidates through `Game::can_build`.

use sim_schema::{PlayerId, Relation, TileRef, UnitKind};

use crate::{game::Game, map::GameMap};

const ELEVATION_WEIGHT: f64 = 10.0;
const SILO_ELEVATION_WEIGHT: f64 = 20.0;
const BORDER_WEIGHT: f64 = 0.5;
const SILO_BORDER_WEIGHT: f64 = 1.0;
const SIBLING_WEIGHT: f64 = 0.25;
const CLUSTER_WEIGHT: f64 = 30.0;
const DEFENSE_HOSTILITY_WEIGHT: f64 = 15.0;

pub const SAM_GOLDILOCKS_MAX: f64 = 20.0;
pub const SAM_GOLDILOCKS_MIN: f64 = -10.0;
pub const SAM_COVERAGE_BONUS: f64 = 40.0;

/// Near/ideal/far band for the complementary-cluster term, as fractions of
/// the spacing constant.
#[derive(Debug, Clone, Copy)]
struct ClusterBand {
    near: f64,
    ideal: f64,
    far: f64,
}

impl ClusterBand {
    fn scaled(self, spacing: f64) -> Self {
        Self {
            near: self.near * spacing,
            ideal: self.ideal * spacing,
            far: self.far * spacing,
        }
    }

    /// Penalty inside `near`, peak at `ideal`, zero beyond `far`.
    fn score(self, distance: f64) -> f64 {
        if distance < self.near {
            -CLUSTER_WEIGHT * (self.near - distance) / self.near.max(1.0)
        } else if distance > self.far {
            0.0
        } else {
            let width = (self.far - self.near).max(1.0);
            CLUSTER_WEIGHT * (1.0 - (distance - self.ideal).abs() / width).max(0.0)
        }
    }
}

const ECONOMIC_BAND: ClusterBand = ClusterBand {
    near: 0.1,
    ideal: 0.25,
    far: 0.6,
};

const SILO_BAND: ClusterBand = ClusterBand {
    near: 0.3,
    ideal: 0.6,
    far: 1.2,
};

/// Hostility of a foreign neighbour as seen by a defense-post planner.
pub fn hostility_weight(relation: Relation, allied: bool) -> f64 {
    if allied {
        return -1.0;
    }
    match relation {
        Relation::Hostile => 3.0,
        Relation::Distrustful => 2.0,
        Relation::Neutral => 1.0,
        Relation::Friendly => 0.0,
    }
}

/// Goldilocks reward of a SAM site relative to one protected structure:
/// peaks at half the range, falls to zero at the launcher and at the range
/// edge, negative beyond the range.
pub fn sam_goldilocks(distance: f64, range: f64) -> f64 {
    let ideal = range / 2.0;
    if distance <= range {
        SAM_GOLDILOCKS_MAX * (1.0 - (distance - ideal).abs() / ideal.max(1.0))
    } else {
        SAM_GOLDILOCKS_MIN * ((distance - range) / range.max(1.0)).min(1.0)
    }
}

fn complements(kind: UnitKind) -> &'static [UnitKind] {
    match kind {
        UnitKind::City => &[UnitKind::Port, UnitKind::Factory],
        UnitKind::Port => &[UnitKind::City, UnitKind::Factory],
        UnitKind::Factory => &[UnitKind::City, UnitKind::Port],
        UnitKind::MissileSilo => &[UnitKind::City, UnitKind::Port, UnitKind::Factory],
        UnitKind::SamLauncher => &[
            UnitKind::City,
            UnitKind::Port,
            UnitKind::Factory,
            UnitKind::MissileSilo,
        ],
        _ => &[],
    }
}

fn nearest(map: &GameMap, tile: TileRef, others: &[TileRef]) -> Option<f64> {
    others
        .iter()
        .map(|&other| map.euclidean_sq(tile, other))
        .min()
        .map(|sq| (sq as f64).sqrt())
}

/// Returns a tile scoring function for `kind` built by `player`.
pub fn structure_tile_value<'a>(
    game: &'a Game,
    player: PlayerId,
    kind: UnitKind,
) -> impl Fn(TileRef) -> f64 + 'a {
    let map = game.map();
    let spacing = f64::from(game.config.heaviest_outer_radius().max(1));
    let sam_range = f64::from(game.config.sam.range);
    let border: Vec<TileRef> = game
        .player(player)
        .map(|p| p.border_tiles().iter().copied().collect())
        .unwrap_or_default();
    let siblings: Vec<TileRef> = game
        .units_of(player, &[kind])
        .iter()
        .map(|unit| unit.tile())
        .collect();
    let related: Vec<TileRef> = game
        .units_of(player, complements(kind))
        .iter()
        .map(|unit| unit.tile())
        .collect();

    move |tile: TileRef| {
        let elevation = f64::from(map.elevation(tile)) / 255.0;
        let border_point = map.closest_tile(border.iter().copied(), tile);
        let border_distance = border_point
            .map(|(_, d)| f64::from(d))
            .unwrap_or(spacing)
            .min(spacing);
        let sibling_distance = nearest(map, tile, &siblings)
            .unwrap_or(2.0 * spacing)
            .min(2.0 * spacing);

        let mut score = SIBLING_WEIGHT * sibling_distance;
        match kind {
            UnitKind::City | UnitKind::Port | UnitKind::Factory => {
                score += ELEVATION_WEIGHT * elevation + BORDER_WEIGHT * border_distance;
                if let Some(distance) = nearest(map, tile, &related) {
                    score += ECONOMIC_BAND.scaled(spacing).score(distance);
                }
            }
            UnitKind::MissileSilo => {
                score += SILO_ELEVATION_WEIGHT * elevation + SILO_BORDER_WEIGHT * border_distance;
                if let Some(distance) = nearest(map, tile, &related) {
                    score += SILO_BAND.scaled(spacing).score(distance);
                }
            }
            UnitKind::SamLauncher => {
                score += ELEVATION_WEIGHT * elevation + BORDER_WEIGHT * border_distance;
                let distances: Vec<f64> = related
                    .iter()
                    .map(|&protected| map.euclidean(tile, protected))
                    .collect();
                let goldilocks = if distances.is_empty() {
                    0.0
                } else {
                    distances
                        .iter()
                        .map(|&d| sam_goldilocks(d, sam_range))
                        .sum::<f64>()
                        / distances.len() as f64
                };
                score += goldilocks.clamp(SAM_GOLDILOCKS_MIN, SAM_GOLDILOCKS_MAX);
                let covers_any = distances.iter().any(|&d| d <= sam_range);
                score += if covers_any {
                    SAM_COVERAGE_BONUS
                } else {
                    -SAM_COVERAGE_BONUS
                };
            }
            UnitKind::DefensePost => {
                score += ELEVATION_WEIGHT * elevation + BORDER_WEIGHT * (spacing - border_distance);
                let hostility = border_point
                    .map(|(point, _)| {
                        map.neighbors(point)
                            .filter_map(|n| map.owner(n))
                            .filter(|&owner| owner != player)
                            .map(|owner| {
                                let (relation, allied) = game
                                    .player(player)
                                    .map(|p| (p.relation(owner), p.is_allied_with(owner)))
                                    .unwrap_or((Relation::Neutral, false));
                                hostility_weight(relation, allied)
                            })
                            .fold(f64::NEG_INFINITY, f64::max)
                    })
                    .filter(|h| h.is_finite())
                    .unwrap_or(0.0);
                score += DEFENSE_HOSTILITY_WEIGHT * hostility;
            }
            _ => {}
        }
        score
    }
}
