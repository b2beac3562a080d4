use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use sim_schema::{PlayerId, TileRef, UnitId, UnitKind};

/// One tick of a projectile's flight path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryTile {
    pub tile: TileRef,
    /// Whether interceptors may engage the projectile at this point.
    pub targetable: bool,
}

/// Structure or projectile owned by a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    kind: UnitKind,
    owner: PlayerId,
    tile: TileRef,
    active: bool,
    level: u32,
    trajectory: Vec<TrajectoryTile>,
    trajectory_index: usize,
    target_tile: Option<TileRef>,
    targeted_by_sam: bool,
    missile_timers: VecDeque<u64>,
}

impl Unit {
    pub(crate) fn new(id: UnitId, kind: UnitKind, owner: PlayerId, tile: TileRef) -> Self {
        Self {
            id,
            kind,
            owner,
            tile,
            active: true,
            level: 1,
            trajectory: Vec::new(),
            trajectory_index: 0,
            target_tile: None,
            targeted_by_sam: false,
            missile_timers: VecDeque::new(),
        }
    }

    pub(crate) fn with_trajectory(mut self, trajectory: Vec<TrajectoryTile>, target: TileRef) -> Self {
        if let Some(first) = trajectory.first() {
            self.tile = first.tile;
        }
        self.trajectory = trajectory;
        self.target_tile = Some(target);
        self
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn tile(&self) -> TileRef {
        self.tile
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn trajectory(&self) -> &[TrajectoryTile] {
        &self.trajectory
    }

    pub fn trajectory_index(&self) -> usize {
        self.trajectory_index
    }

    pub fn target_tile(&self) -> Option<TileRef> {
        self.target_tile
    }

    pub fn targeted_by_sam(&self) -> bool {
        self.targeted_by_sam
    }

    /// Ticks until the projectile reaches the last tile of its trajectory.
    pub fn ticks_to_impact(&self) -> usize {
        self.trajectory
            .len()
            .saturating_sub(1)
            .saturating_sub(self.trajectory_index)
    }

    pub fn missile_timers(&self) -> &VecDeque<u64> {
        &self.missile_timers
    }

    /// Loaded missiles: one per level, minus those still reloading.
    pub fn missiles_ready(&self) -> u32 {
        self.level.saturating_sub(self.missile_timers.len() as u32)
    }

    pub fn is_in_cooldown(&self) -> bool {
        self.missiles_ready() == 0
    }

    pub(crate) fn assign_id(&mut self, id: UnitId) {
        self.id = id;
    }

    pub(crate) fn set_targeted_by_sam(&mut self, targeted: bool) {
        self.targeted_by_sam = targeted;
    }

    /// Consumes one loaded missile, recording the launch tick for reload.
    pub(crate) fn launch(&mut self, tick: u64) -> bool {
        if self.is_in_cooldown() {
            return false;
        }
        self.missile_timers.push_back(tick);
        true
    }

    pub(crate) fn reload_missile(&mut self) {
        self.missile_timers.pop_front();
    }

    pub(crate) fn increase_level(&mut self) {
        self.level += 1;
    }

    pub(crate) fn set_owner(&mut self, owner: PlayerId) {
        self.owner = owner;
    }

    /// Moves the projectile one step along its trajectory. Returns `true` once
    /// the last tile has been reached.
    pub(crate) fn advance(&mut self) -> bool {
        if self.trajectory_index + 1 < self.trajectory.len() {
            self.trajectory_index += 1;
            self.tile = self.trajectory[self.trajectory_index].tile;
        }
        self.trajectory_index + 1 >= self.trajectory.len()
    }
}
