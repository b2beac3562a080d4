//! Reference request resolver.
//!
//! Applies the requests the decision core submits so scenarios run end to
//! end: spawning, construction, land and naval attacks, weapon launches,
//! projectile flight and detonation, and per-tick growth. Runs after the
//! executions and before the clock advances.

use std::collections::BTreeSet;

use bevy::prelude::ResMut;
use sim_schema::{ExecutionRequest, PlayerId, TileRef, UnitId, UnitKind};

use crate::{
    execution::ExecutionRunner,
    game::{ActiveAttack, Game},
    hashing::unit_seed,
    map::GameMap,
    rng::PseudoRandom,
    sam::SamLauncherExecution,
    unit::TrajectoryTile,
};

/// Share of the starting territory's troop cap granted on spawn.
const SPAWN_TROOP_SHARE: f64 = 0.5;
/// Relation lost by a player whose land a detonation scorched.
const NUKE_RELATION_PENALTY: i32 = 50;

const PROJECTILES: [UnitKind; 4] = [
    UnitKind::AtomBomb,
    UnitKind::HydrogenBomb,
    UnitKind::Mirv,
    UnitKind::MirvWarhead,
];

pub fn resolve_requests(mut game: ResMut<Game>, mut runner: ResMut<ExecutionRunner>) {
    resolve_tick(&mut game, &mut runner);
}

/// One resolver pass: apply queued requests, then advance the world.
pub fn resolve_tick(game: &mut Game, runner: &mut ExecutionRunner) {
    for request in game.take_requests() {
        apply_request(game, runner, request);
    }
    advance_attacks(game);
    advance_projectiles(game);
    reload_silos(game);
    grow_players(game);
    retire_landless(game);
}

pub fn apply_request(game: &mut Game, runner: &mut ExecutionRunner, request: ExecutionRequest) {
    match request {
        ExecutionRequest::Spawn { player, tile } => spawn(game, player, tile),
        ExecutionRequest::Construct { player, kind, tile } => {
            if kind == UnitKind::SamLauncher {
                runner.spawn(SamLauncherExecution::new(player, tile));
            } else if game.build_unit(player, kind, tile).is_none() {
                tracing::debug!(
                    target: "frontline::sandbox",
                    player = %player,
                    kind = %kind,
                    tile = %tile,
                    "sandbox.construct_denied"
                );
            }
        }
        ExecutionRequest::Upgrade { player, unit } => {
            if !game.upgrade_unit(player, unit) {
                tracing::debug!(
                    target: "frontline::sandbox",
                    player = %player,
                    unit = %unit,
                    "sandbox.upgrade_denied"
                );
            }
        }
        ExecutionRequest::LaunchNuke {
            player,
            kind,
            target,
        } => launch_weapon(game, player, kind, target),
        ExecutionRequest::LaunchMirv { player, target } => {
            launch_weapon(game, player, UnitKind::Mirv, target)
        }
        ExecutionRequest::Attack {
            player,
            target,
            troops,
        } => start_attack(game, player, target, troops),
        ExecutionRequest::TransportShip {
            player,
            target,
            destination,
            troops,
        } => land_transport(game, player, target, destination, troops),
        ExecutionRequest::AllianceRequest { from, to } => {
            let already_allied = game.player(from).is_some_and(|p| p.is_allied_with(to));
            if from == to || already_allied {
                return;
            }
            let mutual = game
                .player(from)
                .is_some_and(|p| p.alliance_requests().contains(&to));
            if mutual {
                game.accept_alliance_request(from, to);
            } else {
                game.deliver_alliance_request(from, to);
            }
        }
    }
}

fn spawn(game: &mut Game, player: PlayerId, tile: TileRef) {
    let eligible = game
        .player(player)
        .is_some_and(|p| p.is_alive() && !p.has_spawned());
    let free = game.map().is_land(tile) && !game.map().has_owner(tile);
    if !game.in_spawn_phase() || !eligible || !free {
        return;
    }
    let radius = game.config.sandbox.spawn_radius;
    let claim: Vec<TileRef> = game
        .map()
        .tiles_within_manhattan(tile, radius)
        .into_iter()
        .filter(|&t| game.map().is_land(t) && !game.map().has_owner(t))
        .collect();
    for &t in &claim {
        game.conquer(player, t);
    }
    let troops = (game.config.max_troops(claim.len(), 0) as f64 * SPAWN_TROOP_SHARE) as u64;
    if let Some(p) = game.player_mut(player) {
        p.mark_spawned();
        p.add_troops(troops);
    }
    tracing::info!(
        target: "frontline::sandbox",
        player = %player,
        tile = %tile,
        claimed = claim.len(),
        "sandbox.spawned"
    );
}

fn start_attack(game: &mut Game, player: PlayerId, target: Option<PlayerId>, troops: u64) {
    if target.is_some_and(|t| game.is_friendly(player, t)) {
        return;
    }
    let Some(attacker) = game.player_mut(player) else {
        return;
    };
    let committed = attacker.remove_troops(troops);
    if committed == 0 {
        return;
    }
    game.register_attack(ActiveAttack {
        attacker: player,
        target,
        troops: committed,
    });
}

/// Lands a beach-head at `destination` and pushes the survivors inland as a
/// regular attack.
fn land_transport(
    game: &mut Game,
    player: PlayerId,
    target: Option<PlayerId>,
    destination: TileRef,
    troops: u64,
) {
    let map = game.map();
    if (destination.0 as usize) >= map.tile_count() {
        return;
    }
    let coastal = game
        .player(player)
        .is_some_and(|p| p.border_tiles().iter().any(|&t| map.is_ocean_shore(t)));
    let landing_ok = map.is_land(destination)
        && map.is_ocean_shore(destination)
        && map.owner(destination) == target
        && target != Some(player);
    if !coastal || !landing_ok || target.is_some_and(|t| game.is_friendly(player, t)) {
        return;
    }
    let mut beach: Vec<TileRef> = vec![destination];
    beach.extend(
        map.neighbors(destination)
            .filter(|&n| map.is_land(n) && map.owner(n) == target),
    );

    let Some(mut remaining) = game.player_mut(player).map(|p| p.remove_troops(troops)) else {
        return;
    };
    let cost = game.config.sandbox.troops_per_tile.max(1);
    let mut landed = 0;
    for tile in beach {
        if remaining < cost {
            break;
        }
        conquer_contested(game, player, target, tile, cost);
        remaining -= cost;
        landed += 1;
    }
    tracing::debug!(
        target: "frontline::sandbox",
        player = %player,
        destination = %destination,
        landed,
        "sandbox.transport_landed"
    );
    if landed > 0 && target.is_some() && remaining >= cost {
        game.register_attack(ActiveAttack {
            attacker: player,
            target,
            troops: remaining,
        });
    } else if let Some(p) = game.player_mut(player) {
        p.add_troops(remaining);
    }
}

fn conquer_contested(
    game: &mut Game,
    player: PlayerId,
    target: Option<PlayerId>,
    tile: TileRef,
    cost: u64,
) {
    game.conquer(player, tile);
    if let Some(defender) = target.and_then(|t| game.player_mut(t)) {
        defender.remove_troops(cost / 2);
    }
}

fn advance_attacks(game: &mut Game) {
    let attacks = std::mem::take(game.attacks_mut());
    let mut ongoing = Vec::with_capacity(attacks.len());
    for attack in attacks {
        if let Some(attack) = advance_attack(game, attack) {
            ongoing.push(attack);
        }
    }
    game.attacks_mut().extend(ongoing);
}

/// Conquers up to `tiles_per_attack_tick` frontier tiles. Returns the attack
/// if it continues; otherwise the surviving troops go home.
fn advance_attack(game: &mut Game, mut attack: ActiveAttack) -> Option<ActiveAttack> {
    let alive = game
        .player(attack.attacker)
        .is_some_and(|p| p.is_alive());
    if !alive {
        return None;
    }
    let cost = game.config.sandbox.troops_per_tile.max(1);
    let allied_now = attack
        .target
        .is_some_and(|t| game.is_friendly(attack.attacker, t));

    let mut conquered = 0;
    if !allied_now {
        let frontier = frontier_tiles(game, attack.attacker, attack.target);
        let per_tick = game.config.sandbox.tiles_per_attack_tick as usize;
        for tile in frontier.into_iter().take(per_tick) {
            if attack.troops < cost {
                break;
            }
            conquer_contested(game, attack.attacker, attack.target, tile, cost);
            attack.troops -= cost;
            conquered += 1;
        }
    }

    if conquered > 0 && attack.troops >= cost {
        return Some(attack);
    }
    tracing::debug!(
        target: "frontline::sandbox",
        attacker = %attack.attacker,
        returned = attack.troops,
        "sandbox.attack_finished"
    );
    if let Some(p) = game.player_mut(attack.attacker) {
        p.add_troops(attack.troops);
    }
    None
}

/// Land tiles owned by `target` (or unowned) adjacent to the attacker's border.
fn frontier_tiles(game: &Game, attacker: PlayerId, target: Option<PlayerId>) -> BTreeSet<TileRef> {
    let map = game.map();
    let Some(player) = game.player(attacker) else {
        return BTreeSet::new();
    };
    player
        .border_tiles()
        .iter()
        .flat_map(|&tile| map.neighbors(tile))
        .filter(|&n| map.is_land(n) && map.owner(n) == target)
        .collect()
}

/// Straight flight from `from` to `to`, one entry per tick at `speed` tiles
/// per tick. Points within `targetable_range` of either end are targetable.
pub fn straight_trajectory(
    map: &GameMap,
    from: TileRef,
    to: TileRef,
    speed: u32,
    targetable_range: u32,
) -> Vec<TrajectoryTile> {
    let distance = map.manhattan(from, to);
    let steps = distance.div_ceil(speed.max(1)).max(1);
    let (x0, y0) = (f64::from(map.x(from)), f64::from(map.y(from)));
    let (x1, y1) = (f64::from(map.x(to)), f64::from(map.y(to)));
    (0..=steps)
        .filter_map(|step| {
            let t = f64::from(step) / f64::from(steps);
            let x = (x0 + (x1 - x0) * t).round() as i64;
            let y = (y0 + (y1 - y0) * t).round() as i64;
            map.ref_at(x, y)
        })
        .map(|tile| TrajectoryTile {
            tile,
            targetable: map.manhattan(tile, from) <= targetable_range
                || map.manhattan(tile, to) <= targetable_range,
        })
        .collect()
}

fn launch_weapon(game: &mut Game, player: PlayerId, kind: UnitKind, target: TileRef) {
    let Some(silo_tile) = game.can_build(player, kind, target) else {
        tracing::debug!(
            target: "frontline::sandbox",
            player = %player,
            kind = %kind,
            tile = %target,
            "sandbox.launch_denied"
        );
        return;
    };
    let Some(silo) = game
        .units_of(player, &[UnitKind::MissileSilo])
        .into_iter()
        .find(|silo| silo.tile() == silo_tile && !silo.is_in_cooldown())
        .map(|silo| silo.id())
    else {
        return;
    };
    let Some(cost) = game.cost(player, kind) else {
        return;
    };
    let paid = game.player_mut(player).is_some_and(|p| p.spend_gold(cost));
    if !paid {
        return;
    }
    let now = game.ticks();
    if let Some(unit) = game.unit_mut(silo) {
        unit.launch(now);
    }
    let sandbox = &game.config.sandbox;
    let trajectory = straight_trajectory(
        game.map(),
        silo_tile,
        target,
        sandbox.nuke_speed,
        sandbox.nuke_targetable_range,
    );
    let Some(projectile) = game.spawn_projectile(player, kind, trajectory, target) else {
        return;
    };
    game.record_nuke_launch(player, kind);
    tracing::info!(
        target: "frontline::sandbox",
        player = %player,
        kind = %kind,
        unit = %projectile,
        tile = %target,
        "sandbox.weapon_launched"
    );
}

fn advance_projectiles(game: &mut Game) {
    let in_flight: Vec<UnitId> = game
        .units_by_kind(&PROJECTILES)
        .iter()
        .map(|unit| unit.id())
        .collect();
    for id in in_flight {
        let arrived = game.unit_mut(id).is_some_and(|unit| unit.advance());
        if !arrived {
            continue;
        }
        match game.unit(id).map(|unit| unit.kind()) {
            Some(UnitKind::Mirv) => split_mirv(game, id),
            Some(_) => detonate(game, id),
            None => {}
        }
    }
}

/// Replaces a MIRV at its target with warheads scattered around it.
fn split_mirv(game: &mut Game, id: UnitId) {
    let Some((owner, center)) = game
        .unit(id)
        .map(|unit| (unit.owner(), unit.target_tile().unwrap_or(unit.tile())))
    else {
        return;
    };
    game.delete_unit(id);
    let mirv = game.config.mirv.clone();
    let speed = game.config.sandbox.nuke_speed;
    let spread = i64::from(mirv.warhead_spread);
    let mut rng = PseudoRandom::new(unit_seed(id));
    let cx = i64::from(game.map().x(center));
    let cy = i64::from(game.map().y(center));
    let mut spawned = 0;
    for _ in 0..mirv.warhead_count {
        let x = cx + rng.next_int(-spread, spread + 1);
        let y = cy + rng.next_int(-spread, spread + 1);
        let Some(aim) = game.map().ref_at(x, y).filter(|&t| game.map().is_land(t)) else {
            continue;
        };
        let trajectory = straight_trajectory(game.map(), center, aim, speed, u32::MAX);
        if game
            .spawn_projectile(owner, UnitKind::MirvWarhead, trajectory, aim)
            .is_some()
        {
            spawned += 1;
        }
    }
    tracing::info!(
        target: "frontline::sandbox",
        player = %owner,
        unit = %id,
        warheads = spawned,
        "sandbox.mirv_split"
    );
}

/// Scorches the inner blast radius: fallout, loss of ownership, and every
/// structure inside destroyed.
fn detonate(game: &mut Game, id: UnitId) {
    let Some((owner, kind, tile)) = game
        .unit(id)
        .map(|unit| (unit.owner(), unit.kind(), unit.tile()))
    else {
        return;
    };
    game.delete_unit(id);
    let inner = game.config.nuke_magnitude(kind).inner;
    let mut victims: BTreeSet<PlayerId> = BTreeSet::new();
    for t in game.map().tiles_within_manhattan(tile, inner) {
        if !game.map().is_land(t) {
            continue;
        }
        if let Some(victim) = game.owner(t) {
            victims.insert(victim);
            game.relinquish(t);
        }
        game.set_fallout(t);
    }
    let destroyed: Vec<UnitId> = game
        .nearby_units(tile, inner, &UnitKind::STRUCTURES)
        .iter()
        .map(|unit| unit.id())
        .collect();
    for structure in &destroyed {
        game.delete_unit(*structure);
    }
    for victim in victims.iter().filter(|&&v| v != owner) {
        game.update_relation(*victim, owner, -NUKE_RELATION_PENALTY);
    }
    game.record_detonation();
    tracing::info!(
        target: "frontline::sandbox",
        player = %owner,
        kind = %kind,
        tile = %tile,
        destroyed = destroyed.len(),
        "sandbox.detonated"
    );
}

fn reload_silos(game: &mut Game) {
    let now = game.ticks();
    let cooldown = game.config.sandbox.silo_cooldown_ticks;
    let silos: Vec<UnitId> = game
        .units_by_kind(&[UnitKind::MissileSilo])
        .iter()
        .map(|unit| unit.id())
        .collect();
    for id in silos {
        if let Some(silo) = game.unit_mut(id) {
            while silo
                .missile_timers()
                .front()
                .is_some_and(|&fired| now >= fired + cooldown)
            {
                silo.reload_missile();
            }
        }
    }
}

/// Gold per owned tile and troop growth toward the population cap.
fn grow_players(game: &mut Game) {
    let gold_per_tile = game.config.sandbox.gold_per_tile;
    let ratio = game.config.sandbox.troop_growth_ratio;
    let growth: Vec<(PlayerId, u64, u64)> = game
        .active_players()
        .map(|p| {
            let cap = game
                .config
                .max_troops(p.num_tiles_owned(), game.unit_levels(p.id(), UnitKind::City));
            let gap = cap.saturating_sub(p.troops());
            let troops = ((gap as f64 * ratio).ceil() as u64).min(gap);
            (p.id(), gold_per_tile * p.num_tiles_owned() as u64, troops)
        })
        .collect();
    for (id, gold, troops) in growth {
        if let Some(p) = game.player_mut(id) {
            p.add_gold(gold);
            p.add_troops(troops);
        }
    }
}

fn retire_landless(game: &mut Game) {
    if game.in_spawn_phase() {
        return;
    }
    let landless: Vec<PlayerId> = game
        .players()
        .filter(|p| p.is_alive() && p.num_tiles_owned() == 0)
        .map(|p| p.id())
        .collect();
    for id in landless {
        game.kill_player(id);
        tracing::info!(target: "frontline::sandbox", player = %id, "sandbox.player_eliminated");
    }
}
