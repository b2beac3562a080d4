//! Interception geometry: when and where a SAM missile can meet a projectile
//! flying along a precomputed trajectory.
//!
//! Timing convention: a projectile at trajectory index `i` during tick `t`
//! sits at index `i + k` during tick `t + k`, and detonates before the tick in
//! which it would occupy its last trajectory tile. An interception must
//! therefore resolve on a tick strictly earlier than that impact tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sim_schema::{TileRef, UnitId, UnitKind};

use crate::{map::GameMap, unit::Unit};

/// Ticks allowed between projectile arrival and missile arrival.
pub const ARRIVAL_TOLERANCE_TICKS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptionPlan {
    pub projectile: UnitId,
    pub tile: TileRef,
    pub trajectory_index: usize,
    /// Tick the launcher should fire on.
    pub fire_tick: u64,
    /// Tick the missile reaches `tile`.
    pub arrival_tick: u64,
    /// First tick on which the projectile is no longer interceptable.
    pub impact_tick: u64,
}

impl InterceptionPlan {
    pub fn ticks_until_fire(&self, now: u64) -> u64 {
        self.fire_tick.saturating_sub(now)
    }
}

/// Flight time of a SAM missile between two tiles, never less than one tick.
pub fn missile_travel_ticks(map: &GameMap, from: TileRef, to: TileRef, speed: u32) -> u64 {
    let distance = u64::from(map.manhattan(from, to));
    let speed = u64::from(speed.max(1));
    distance.div_ceil(speed).max(1)
}

/// Earliest point on the projectile's remaining path that a missile fired
/// from `launcher` no earlier than `now` can reach in time.
///
/// A point qualifies when it is flagged targetable, lies within `range`
/// (euclidean) of the launcher, the missile arrives within
/// [`ARRIVAL_TOLERANCE_TICKS`] of the projectile, and that arrival is strictly
/// before impact.
pub fn plan_interception(
    map: &GameMap,
    launcher: TileRef,
    range: u32,
    missile_speed: u32,
    projectile: &Unit,
    now: u64,
) -> Option<InterceptionPlan> {
    let trajectory = projectile.trajectory();
    let current = projectile.trajectory_index();
    let impact_tick = now + projectile.ticks_to_impact() as u64;
    let range_sq = u64::from(range) * u64::from(range);

    for (index, point) in trajectory.iter().enumerate().skip(current + 1) {
        if !point.targetable || map.euclidean_sq(launcher, point.tile) > range_sq {
            continue;
        }
        let projectile_tick = now + (index - current) as u64;
        let travel = missile_travel_ticks(map, launcher, point.tile, missile_speed);
        let fire_tick = projectile_tick.saturating_sub(travel).max(now);
        let arrival_tick = fire_tick + travel;
        if arrival_tick > projectile_tick + ARRIVAL_TOLERANCE_TICKS {
            continue;
        }
        if arrival_tick >= impact_tick {
            // Later points only move closer to impact.
            break;
        }
        return Some(InterceptionPlan {
            projectile: projectile.id(),
            tile: point.tile,
            trajectory_index: index,
            fire_tick,
            arrival_tick,
            impact_tick,
        });
    }
    None
}

/// Per-launcher cache of interception plans. A plan is computed once per
/// projectile and reused until its firing tick has passed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamTargeting {
    plans: BTreeMap<UnitId, Option<InterceptionPlan>>,
}

impl SamTargeting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_plan(&self, projectile: UnitId) -> Option<&InterceptionPlan> {
        self.plans.get(&projectile).and_then(Option::as_ref)
    }

    /// Drops cached entries for projectiles that are gone or already engaged.
    pub fn retain_projectiles<F>(&mut self, mut keep: F)
    where
        F: FnMut(UnitId) -> bool,
    {
        self.plans.retain(|id, _| keep(*id));
    }

    fn plan_for(
        &mut self,
        map: &GameMap,
        launcher: TileRef,
        range: u32,
        missile_speed: u32,
        projectile: &Unit,
        now: u64,
    ) -> Option<InterceptionPlan> {
        let stale = match self.plans.get(&projectile.id()) {
            Some(Some(plan)) => plan.fire_tick < now,
            Some(None) => false,
            None => true,
        };
        if stale {
            let plan = plan_interception(map, launcher, range, missile_speed, projectile, now);
            self.plans.insert(projectile.id(), plan);
        }
        self.plans.get(&projectile.id()).copied().flatten()
    }

    /// Picks the projectile to engage this tick, if any. Candidates must be
    /// due (planned firing tick at most one tick away). Hydrogen bombs come
    /// first, then the earliest interception, then the lowest id.
    pub fn select_target(
        &mut self,
        map: &GameMap,
        launcher: TileRef,
        range: u32,
        missile_speed: u32,
        candidates: &[&Unit],
        now: u64,
    ) -> Option<InterceptionPlan> {
        let mut best: Option<(bool, InterceptionPlan)> = None;
        for projectile in candidates {
            if projectile.targeted_by_sam() {
                continue;
            }
            let Some(plan) =
                self.plan_for(map, launcher, range, missile_speed, projectile, now)
            else {
                continue;
            };
            if plan.ticks_until_fire(now) > 1 {
                continue;
            }
            let hydrogen = projectile.kind() == UnitKind::HydrogenBomb;
            let better = match &best {
                None => true,
                Some((best_hydrogen, best_plan)) => {
                    (hydrogen, std::cmp::Reverse(plan.arrival_tick), std::cmp::Reverse(plan.projectile))
                        > (
                            *best_hydrogen,
                            std::cmp::Reverse(best_plan.arrival_tick),
                            std::cmp::Reverse(best_plan.projectile),
                        )
                }
            };
            if better {
                best = Some((hydrogen, plan));
            }
        }
        best.map(|(_, plan)| {
            // Firing now: arrival follows from the current tick.
            let travel = missile_travel_ticks(map, launcher, plan.tile, missile_speed);
            InterceptionPlan {
                fire_tick: now,
                arrival_tick: now + travel,
                ..plan
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::TrajectoryTile;
    use sim_schema::PlayerId;

    fn straight_line(map: &GameMap, y: i64, from_x: i64, to_x: i64) -> Vec<TrajectoryTile> {
        (from_x..=to_x)
            .filter_map(|x| map.ref_at(x, y))
            .map(|tile| TrajectoryTile {
                tile,
                targetable: true,
            })
            .collect()
    }

    fn bomb(map: &GameMap, id: u32, kind: UnitKind, y: i64) -> Unit {
        let path = straight_line(map, y, 0, 99);
        let target = path.last().map(|p| p.tile).unwrap_or(TileRef(0));
        Unit::new(UnitId(id), kind, PlayerId(1), TileRef(0)).with_trajectory(path, target)
    }

    #[test]
    fn planned_arrival_is_strictly_before_impact_and_within_tolerance() {
        let map = GameMap::plains(100, 100);
        let launcher = map.ref_at(60, 40).expect("tile");
        let projectile = bomb(&map, 7, UnitKind::AtomBomb, 50);
        for now in 0..20u64 {
            let plan = plan_interception(&map, launcher, 70, 12, &projectile, now)
                .expect("projectile passes within range");
            assert!(plan.arrival_tick < plan.impact_tick);
            let projectile_tick = now + (plan.trajectory_index - projectile.trajectory_index()) as u64;
            assert!(plan.arrival_tick + ARRIVAL_TOLERANCE_TICKS >= projectile_tick);
            assert!(plan.arrival_tick <= projectile_tick + ARRIVAL_TOLERANCE_TICKS);
            assert!(plan.fire_tick >= now);
        }
    }

    #[test]
    fn untargetable_and_out_of_range_points_are_skipped() {
        let map = GameMap::plains(100, 100);
        let launcher = map.ref_at(50, 10).expect("tile");
        let mut path = straight_line(&map, 50, 0, 99);
        for point in path.iter_mut().take(60) {
            point.targetable = false;
        }
        let target = path.last().map(|p| p.tile).expect("path");
        let projectile =
            Unit::new(UnitId(3), UnitKind::AtomBomb, PlayerId(1), TileRef(0)).with_trajectory(path, target);
        let plan = plan_interception(&map, launcher, 45, 12, &projectile, 0).expect("plan");
        assert!(plan.trajectory_index >= 60);
        assert!(map.euclidean_sq(launcher, plan.tile) <= 45 * 45);

        assert!(plan_interception(&map, launcher, 30, 12, &projectile, 0).is_none());
    }

    #[test]
    fn projectile_too_close_to_impact_is_not_engaged() {
        let map = GameMap::plains(100, 100);
        let launcher = map.ref_at(0, 0).expect("tile");
        let path = straight_line(&map, 60, 55, 60);
        let target = path.last().map(|p| p.tile).expect("path");
        let projectile =
            Unit::new(UnitId(4), UnitKind::AtomBomb, PlayerId(1), TileRef(0)).with_trajectory(path, target);
        assert!(plan_interception(&map, launcher, 200, 12, &projectile, 0).is_none());
    }

    #[test]
    fn hydrogen_bombs_are_preferred_when_both_are_due() {
        let map = GameMap::plains(100, 100);
        let launcher = map.ref_at(20, 45).expect("tile");
        let atom = bomb(&map, 1, UnitKind::AtomBomb, 44);
        let hydrogen = bomb(&map, 2, UnitKind::HydrogenBomb, 46);
        let mut targeting = SamTargeting::new();
        let candidates = [&atom, &hydrogen];
        let mut chosen = None;
        for now in 0..10 {
            chosen = targeting.select_target(&map, launcher, 70, 12, &candidates, now);
            if chosen.is_some() {
                break;
            }
        }
        let chosen = chosen.expect("a due target");
        assert_eq!(chosen.projectile, UnitId(2));
        assert!(chosen.arrival_tick < chosen.impact_tick);
    }

    #[test]
    fn engaged_projectiles_are_ignored() {
        let map = GameMap::plains(100, 100);
        let launcher = map.ref_at(20, 45).expect("tile");
        let mut atom = bomb(&map, 1, UnitKind::AtomBomb, 44);
        atom.set_targeted_by_sam(true);
        let mut targeting = SamTargeting::new();
        for now in 0..30 {
            assert!(targeting
                .select_target(&map, launcher, 70, 12, &[&atom], now)
                .is_none());
        }
    }

    #[test]
    fn cached_plan_is_reused_until_its_fire_tick_passes() {
        let map = GameMap::plains(100, 100);
        let launcher = map.ref_at(90, 45).expect("tile");
        let atom = bomb(&map, 1, UnitKind::AtomBomb, 44);
        let mut targeting = SamTargeting::new();
        assert!(targeting.cached_plan(UnitId(1)).is_none());

        assert!(targeting
            .select_target(&map, launcher, 70, 12, &[&atom], 0)
            .is_none());
        let first = *targeting.cached_plan(UnitId(1)).expect("planned at tick 0");
        assert!(first.fire_tick > 5);

        targeting.select_target(&map, launcher, 70, 12, &[&atom], 5);
        assert_eq!(targeting.cached_plan(UnitId(1)), Some(&first));
        let fresh = plan_interception(&map, launcher, 70, 12, &atom, 5).expect("plan");
        assert_ne!(fresh, first);

        let later = first.fire_tick + 1;
        targeting.select_target(&map, launcher, 70, 12, &[&atom], later);
        assert_eq!(
            targeting.cached_plan(UnitId(1)).copied(),
            plan_interception(&map, launcher, 70, 12, &atom, later)
        );
    }
}
