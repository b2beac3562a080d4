//! SAM launcher: builds itself, then engages enemy projectiles using the
//! interception planner, and SAM missile: the hit-resolution sub-execution.

use serde::{Deserialize, Serialize};
use sim_schema::{MessageKind, PlayerId, TileRef, UnitId, UnitKind};

use crate::{
    execution::{ExecutionContext, ExecutionError},
    game::Game,
    hashing::unit_seed,
    interception::SamTargeting,
    rng::PseudoRandom,
};

const LABEL: &str = "sam_launcher";
const MISSILE_LABEL: &str = "sam_missile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamState {
    Unbuilt,
    Active { unit: UnitId },
    Destroyed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamLauncherExecution {
    owner: PlayerId,
    tile: TileRef,
    state: SamState,
    initialized: bool,
    rng: Option<PseudoRandom>,
    targeting: SamTargeting,
}

impl SamLauncherExecution {
    /// Launcher that still has to be constructed at `tile`.
    pub fn new(owner: PlayerId, tile: TileRef) -> Self {
        Self {
            owner,
            tile,
            state: SamState::Unbuilt,
            initialized: false,
            rng: None,
            targeting: SamTargeting::new(),
        }
    }

    /// Launcher driving an already placed structure.
    pub fn for_unit(owner: PlayerId, unit: UnitId, tile: TileRef) -> Self {
        Self {
            state: SamState::Active { unit },
            rng: Some(PseudoRandom::new(unit_seed(unit))),
            ..Self::new(owner, tile)
        }
    }

    pub fn state(&self) -> SamState {
        self.state
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn init(&mut self, _ctx: &mut ExecutionContext<'_>) {
        self.initialized = true;
    }

    pub fn validate(&self, game: &Game) -> Result<(), ExecutionError> {
        if !self.initialized {
            return Err(ExecutionError::NotInitialized { execution: LABEL });
        }
        if game.player(self.owner).is_none() {
            return Err(ExecutionError::MissingOwner {
                execution: LABEL,
                player: self.owner,
            });
        }
        if let SamState::Active { unit } = self.state {
            if !game.unit_allocated(unit) {
                return Err(ExecutionError::UnknownUnit {
                    execution: LABEL,
                    unit,
                });
            }
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state != SamState::Destroyed
    }

    pub fn tick(&mut self, ctx: &mut ExecutionContext<'_>) {
        match self.state {
            SamState::Destroyed => {}
            SamState::Unbuilt => self.construct(ctx),
            SamState::Active { unit } => self.engage(ctx, unit),
        }
    }

    fn construct(&mut self, ctx: &mut ExecutionContext<'_>) {
        match ctx.game.build_unit(self.owner, UnitKind::SamLauncher, self.tile) {
            Some(unit) => {
                self.state = SamState::Active { unit };
                self.rng = Some(PseudoRandom::new(unit_seed(unit)));
                tracing::debug!(
                    target: "frontline::sam",
                    owner = %self.owner,
                    unit = %unit,
                    tile = %self.tile,
                    "sam.constructed"
                );
            }
            None => {
                tracing::warn!(
                    target: "frontline::sam",
                    owner = %self.owner,
                    tile = %self.tile,
                    "sam.construction_denied"
                );
                ctx.game.display_message(
                    MessageKind::Warn,
                    format!("Cannot build SAM launcher at {}", self.tile),
                    Some(self.owner),
                );
                self.state = SamState::Destroyed;
            }
        }
    }

    fn engage(&mut self, ctx: &mut ExecutionContext<'_>, unit: UnitId) {
        let now = ctx.tick();
        let Some(launcher) = ctx.game.unit(unit) else {
            tracing::debug!(target: "frontline::sam", unit = %unit, "sam.destroyed");
            self.state = SamState::Destroyed;
            return;
        };
        self.owner = launcher.owner();
        self.tile = launcher.tile();

        let cooldown = ctx.game.config.sam.cooldown_ticks;
        if let Some(launcher) = ctx.game.unit_mut(unit) {
            while launcher
                .missile_timers()
                .front()
                .is_some_and(|&launched| now.saturating_sub(launched) >= cooldown)
            {
                launcher.reload_missile();
            }
        }
        if ctx.game.unit(unit).map_or(true, |u| u.missiles_ready() == 0) {
            return;
        }

        if self.intercept_warheads(ctx, unit, now) {
            return;
        }
        self.intercept_bomb(ctx, unit, now);
    }

    /// MIRV tier: every hostile warhead aimed near this launcher is engaged as
    /// one batch with a single missile.
    fn intercept_warheads(&mut self, ctx: &mut ExecutionContext<'_>, unit: UnitId, now: u64) -> bool {
        let sam = &ctx.game.config.sam;
        let (search, protection, hit_chance) =
            (sam.mirv_search_radius, sam.mirv_protection_radius, sam.warhead_hit_chance);
        let map = ctx.game.map();
        let warheads: Vec<UnitId> = ctx
            .game
            .units_by_kind(&[UnitKind::MirvWarhead])
            .into_iter()
            .filter(|warhead| {
                !ctx.game.is_friendly(self.owner, warhead.owner())
                    && map.manhattan(warhead.tile(), self.tile) <= search
                    && warhead
                        .target_tile()
                        .is_some_and(|target| map.manhattan(target, self.tile) <= protection)
            })
            .map(|warhead| warhead.id())
            .collect();
        if warheads.is_empty() {
            return false;
        }
        if !self.launch(ctx, unit, now) {
            return false;
        }

        let hit = self.roll(hit_chance);
        if hit {
            for warhead in &warheads {
                ctx.game.delete_unit(*warhead);
            }
            ctx.game
                .record_intercept(self.owner, UnitKind::MirvWarhead, warheads.len() as u32);
            ctx.game.display_message(
                MessageKind::SamHit,
                format!("Intercepted {} MIRV warheads", warheads.len()),
                Some(self.owner),
            );
        } else {
            ctx.game.display_message(
                MessageKind::SamMiss,
                "Missile missed".to_string(),
                Some(self.owner),
            );
        }
        tracing::debug!(
            target: "frontline::sam",
            unit = %unit,
            warheads = warheads.len(),
            hit,
            "sam.mirv_batch"
        );
        true
    }

    fn intercept_bomb(&mut self, ctx: &mut ExecutionContext<'_>, unit: UnitId, now: u64) {
        let (range, speed, hit_chance) = {
            let sam = &ctx.game.config.sam;
            (sam.range, sam.missile_speed, sam.hit_chance)
        };
        let game = &*ctx.game;
        self.targeting
            .retain_projectiles(|id| game.unit(id).is_some_and(|u| !u.targeted_by_sam()));
        let candidates: Vec<_> = game
            .units_by_kind(&[UnitKind::AtomBomb, UnitKind::HydrogenBomb])
            .into_iter()
            .filter(|bomb| !game.is_friendly(self.owner, bomb.owner()))
            .collect();
        let Some(plan) =
            self.targeting
                .select_target(game.map(), self.tile, range, speed, &candidates, now)
        else {
            return;
        };
        let Some(kind) = game.unit(plan.projectile).map(|u| u.kind()) else {
            return;
        };
        if !self.launch(ctx, unit, now) {
            return;
        }
        ctx.game.set_targeted_by_sam(plan.projectile, true);
        let hit = match kind {
            UnitKind::AtomBomb => true,
            _ => self.roll(hit_chance),
        };
        tracing::debug!(
            target: "frontline::sam",
            unit = %unit,
            projectile = %plan.projectile,
            arrival_tick = plan.arrival_tick,
            impact_tick = plan.impact_tick,
            "sam.missile_launched"
        );
        ctx.spawn(
            SamMissileExecution {
                owner: self.owner,
                target: plan.projectile,
                target_kind: kind,
                arrival_tick: plan.arrival_tick,
                hit,
                initialized: false,
                active: true,
            }
            .into(),
        );
    }

    fn launch(&mut self, ctx: &mut ExecutionContext<'_>, unit: UnitId, now: u64) -> bool {
        let launched = ctx
            .game
            .unit_mut(unit)
            .map(|launcher| launcher.launch(now))
            .unwrap_or(false);
        if launched {
            ctx.game.record_sam_launch(self.owner);
        }
        launched
    }

    fn roll(&mut self, chance: f64) -> bool {
        match self.rng.as_mut() {
            Some(rng) => rng.next_float() < chance,
            None => false,
        }
    }
}

/// In-flight SAM missile. The outcome is rolled at launch and applied when
/// the missile reaches the interception point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamMissileExecution {
    owner: PlayerId,
    target: UnitId,
    target_kind: UnitKind,
    arrival_tick: u64,
    hit: bool,
    initialized: bool,
    active: bool,
}

impl SamMissileExecution {
    pub fn target(&self) -> UnitId {
        self.target
    }

    pub fn arrival_tick(&self) -> u64 {
        self.arrival_tick
    }

    pub fn init(&mut self, _ctx: &mut ExecutionContext<'_>) {
        self.initialized = true;
    }

    pub fn validate(&self, game: &Game) -> Result<(), ExecutionError> {
        if !self.initialized {
            return Err(ExecutionError::NotInitialized {
                execution: MISSILE_LABEL,
            });
        }
        if game.player(self.owner).is_none() {
            return Err(ExecutionError::MissingOwner {
                execution: MISSILE_LABEL,
                player: self.owner,
            });
        }
        if !game.unit_allocated(self.target) {
            return Err(ExecutionError::UnknownUnit {
                execution: MISSILE_LABEL,
                unit: self.target,
            });
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tick(&mut self, ctx: &mut ExecutionContext<'_>) {
        if ctx.tick() < self.arrival_tick {
            return;
        }
        self.active = false;
        if ctx.game.unit(self.target).is_none() {
            return;
        }
        if self.hit {
            ctx.game.delete_unit(self.target);
            ctx.game.record_intercept(self.owner, self.target_kind, 1);
            ctx.game.display_message(
                MessageKind::SamHit,
                format!("Intercepted {}", self.target_kind),
                Some(self.owner),
            );
        } else {
            ctx.game.set_targeted_by_sam(self.target, false);
            ctx.game.display_message(
                MessageKind::SamMiss,
                "Missile missed".to_string(),
                Some(self.owner),
            );
        }
    }
}
