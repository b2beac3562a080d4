//! Economic pass of a nation: urgency scoring per structure category and the
//! bounded build/upgrade queue derived from it.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sim_schema::{ExecutionRequest, PlayerId, Relation, TileRef, UnitId, UnitKind};

use crate::{game::Game, placement::structure_tile_value, rng::PseudoRandom};

pub const MAX_URGENCY: u8 = 3;
const MAX_ACTIONS_PER_TICK: u64 = 3;
const TILES_PER_CITY: usize = 1_500;
const TILES_PER_PORT: usize = 3_000;
const SILO_TERRITORY_THRESHOLD: usize = 5_000;
const POPULATION_PRESSURE_RATIO: f64 = 0.85;
const WARSHIP_SITE_SAMPLES: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructureCategory {
    GroundDefense,
    AirDefense,
    Population,
    Economy,
    Production,
    Missile,
    Naval,
}

impl StructureCategory {
    pub const ALL: [StructureCategory; 7] = [
        StructureCategory::GroundDefense,
        StructureCategory::AirDefense,
        StructureCategory::Population,
        StructureCategory::Economy,
        StructureCategory::Production,
        StructureCategory::Missile,
        StructureCategory::Naval,
    ];

    pub fn unit_kind(self) -> UnitKind {
        match self {
            StructureCategory::GroundDefense => UnitKind::DefensePost,
            StructureCategory::AirDefense => UnitKind::SamLauncher,
            StructureCategory::Population => UnitKind::City,
            StructureCategory::Economy => UnitKind::Port,
            StructureCategory::Production => UnitKind::Factory,
            StructureCategory::Missile => UnitKind::MissileSilo,
            StructureCategory::Naval => UnitKind::Warship,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StructureCategory::GroundDefense => "ground_defense",
            StructureCategory::AirDefense => "air_defense",
            StructureCategory::Population => "population",
            StructureCategory::Economy => "economy",
            StructureCategory::Production => "production",
            StructureCategory::Missile => "missile",
            StructureCategory::Naval => "naval",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrgencyTable {
    scores: [u8; 7],
}

impl UrgencyTable {
    pub fn get(&self, category: StructureCategory) -> u8 {
        self.scores[category.index()]
    }

    fn set(&mut self, category: StructureCategory, score: u8) {
        self.scores[category.index()] = score.min(MAX_URGENCY);
    }

    pub fn iter(&self) -> impl Iterator<Item = (StructureCategory, u8)> + '_ {
        StructureCategory::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (category, score) in self.iter() {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{}={}", category.as_str(), score);
        }
        out
    }
}

/// Pressure inputs the urgency table is computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PressureSignals {
    pub incoming_attacks: usize,
    /// Some bordering enemy has more troops per border tile than we do.
    pub outmatched_on_border: bool,
    pub enemy_silos: usize,
    pub enemy_warships: usize,
    pub own_silos: usize,
    pub own_warships: usize,
    pub troops: u64,
    pub max_troops: u64,
    pub tiles: usize,
    pub city_levels: u32,
    pub ports: usize,
    pub factories: usize,
    pub coastal: bool,
}

/// Non-friendly players bordering `player` or hostile towards it, in id order.
pub fn rival_players(game: &Game, player: PlayerId) -> Vec<PlayerId> {
    let Some(me) = game.player(player) else {
        return Vec::new();
    };
    game.active_players()
        .filter(|other| other.id() != player && !me.is_friendly(other))
        .filter(|other| {
            me.relation(other.id()) == Relation::Hostile || game.shares_border(player, other.id())
        })
        .map(|other| other.id())
        .collect()
}

pub fn gather_signals(game: &Game, player: PlayerId) -> PressureSignals {
    let Some(me) = game.player(player) else {
        return PressureSignals::default();
    };
    let rivals = rival_players(game, player);
    let ratio = |troops: u64, border: usize| troops as f64 / border.max(1) as f64;
    let my_ratio = ratio(me.troops(), me.border_tiles().len());
    let outmatched_on_border = rivals.iter().filter_map(|&id| game.player(id)).any(|rival| {
        game.shares_border(player, rival.id())
            && ratio(rival.troops(), rival.border_tiles().len()) > my_ratio
    });
    let count_for = |kind: UnitKind| -> usize {
        rivals
            .iter()
            .map(|&rival| game.unit_count(rival, kind))
            .sum()
    };
    let city_levels = game.unit_levels(player, UnitKind::City);
    let map = game.map();
    PressureSignals {
        incoming_attacks: game.incoming_attacks(player).len(),
        outmatched_on_border,
        enemy_silos: count_for(UnitKind::MissileSilo),
        enemy_warships: count_for(UnitKind::Warship),
        own_silos: game.unit_count(player, UnitKind::MissileSilo),
        own_warships: game.unit_count(player, UnitKind::Warship),
        troops: me.troops(),
        max_troops: game.config.max_troops(me.num_tiles_owned(), city_levels),
        tiles: me.num_tiles_owned(),
        city_levels,
        ports: game.unit_count(player, UnitKind::Port),
        factories: game.unit_count(player, UnitKind::Factory),
        coastal: me.border_tiles().iter().any(|&tile| map.is_ocean_shore(tile)),
    }
}

pub fn urgency_from_signals(signals: &PressureSignals) -> UrgencyTable {
    let mut table = UrgencyTable::default();
    let flag = |b: bool| u8::from(b);

    let ground = signals.incoming_attacks.min(2) as u8 + flag(signals.outmatched_on_border);
    table.set(StructureCategory::GroundDefense, ground);

    let air = if ground == 0 {
        0
    } else {
        1 + flag(signals.enemy_silos > 0) + flag(signals.enemy_warships > 0)
    };
    table.set(StructureCategory::AirDefense, air);

    let troop_ratio = signals.troops as f64 / signals.max_troops.max(1) as f64;
    let population = flag(troop_ratio >= POPULATION_PRESSURE_RATIO)
        + flag(signals.tiles > signals.city_levels as usize * TILES_PER_CITY)
        + flag(signals.city_levels == 0);
    table.set(StructureCategory::Population, population);

    let economy = if signals.coastal {
        2 * flag(signals.ports == 0) + flag(signals.tiles > signals.ports * TILES_PER_PORT)
    } else {
        0
    };
    table.set(StructureCategory::Economy, economy);

    let production = match (signals.ports, signals.factories) {
        (0, _) => 0,
        (ports, 0) if ports >= 3 => 3,
        (_, 0) => 2,
        (ports, factories) if factories < ports => 1,
        _ => 0,
    };
    table.set(StructureCategory::Production, production);

    let missile = match (signals.enemy_silos, signals.own_silos) {
        (0, own) => flag(own == 0 && signals.tiles > SILO_TERRITORY_THRESHOLD),
        (_, 0) => 3,
        (enemy, own) if enemy > own => 2,
        _ => 0,
    };
    table.set(StructureCategory::Missile, missile);

    let naval = if signals.ports == 0 {
        0
    } else {
        signals.enemy_warships.saturating_sub(signals.own_warships).min(3) as u8
    };
    table.set(StructureCategory::Naval, naval);

    table
}

/// Queue of categories to act on: forced naval slots first, then the rest by
/// descending urgency with random tie breaks.
pub fn action_queue(table: &UrgencyTable, rng: &mut PseudoRandom) -> Vec<StructureCategory> {
    let mut queue = Vec::new();
    let naval = table.get(StructureCategory::Naval);
    if naval > 0 {
        queue.push(StructureCategory::Naval);
    }
    if naval >= MAX_URGENCY {
        queue.push(StructureCategory::Naval);
    }

    let mut ranked: Vec<(StructureCategory, u8)> = table
        .iter()
        .filter(|&(category, score)| category != StructureCategory::Naval && score > 0)
        .collect();
    rng.shuffle(&mut ranked);
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    queue.extend(ranked.into_iter().map(|(category, _)| category));
    queue
}

/// Actions allowed this tick: affordable multiples of the cheapest baseline
/// structure, between 1 and 3.
pub fn action_budget(game: &Game, gold: u64) -> u64 {
    let cheapest = UnitKind::STRUCTURES
        .iter()
        .filter_map(|&kind| game.config.unit_cost(kind, 0))
        .min()
        .unwrap_or(1)
        .max(1);
    (gold / cheapest).clamp(1, MAX_ACTIONS_PER_TICK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureAction {
    Build { kind: UnitKind, tile: TileRef },
    Upgrade { kind: UnitKind, unit: UnitId },
}

/// Runs the economic pass for `player`, submitting construct and upgrade
/// requests. Returns the actions taken, in order.
pub fn run_economic_pass(
    game: &mut Game,
    player: PlayerId,
    rng: &mut PseudoRandom,
) -> Vec<StructureAction> {
    let Some(gold) = game.player(player).map(|p| p.gold()) else {
        return Vec::new();
    };
    let table = urgency_from_signals(&gather_signals(game, player));
    let queue = action_queue(&table, rng);
    let budget = action_budget(game, gold);
    let samples = game.config.nation.placement_samples;

    let mut remaining_gold = gold;
    let mut actions = Vec::new();
    for category in queue {
        if actions.len() as u64 >= budget {
            break;
        }
        let kind = category.unit_kind();
        let upgrade_first = rng.coin();
        let action = if upgrade_first {
            plan_upgrade(game, player, kind, remaining_gold)
                .or_else(|| plan_build(game, player, kind, remaining_gold, samples, rng))
        } else {
            plan_build(game, player, kind, remaining_gold, samples, rng)
                .or_else(|| plan_upgrade(game, player, kind, remaining_gold))
        };
        let Some((action, cost)) = action else {
            continue;
        };
        remaining_gold -= cost;
        let request = match action {
            StructureAction::Build { kind, tile } => ExecutionRequest::Construct { player, kind, tile },
            StructureAction::Upgrade { unit, .. } => ExecutionRequest::Upgrade { player, unit },
        };
        game.submit(request);
        actions.push(action);
    }

    if !actions.is_empty() {
        tracing::debug!(
            target: "frontline::nation",
            player = %player,
            urgency = %table.render(),
            actions = actions.len(),
            "nation.economic_pass"
        );
    }
    actions
}

fn plan_upgrade(
    game: &Game,
    player: PlayerId,
    kind: UnitKind,
    gold: u64,
) -> Option<(StructureAction, u64)> {
    let cost = game.cost(player, kind)?;
    if cost > gold {
        return None;
    }
    let unit = game
        .units_of(player, &[kind])
        .into_iter()
        .filter(|unit| game.can_upgrade(player, unit.id()))
        .min_by_key(|unit| (unit.level(), unit.id()))?;
    Some((
        StructureAction::Upgrade {
            kind,
            unit: unit.id(),
        },
        cost,
    ))
}

fn plan_build(
    game: &Game,
    player: PlayerId,
    kind: UnitKind,
    gold: u64,
    samples: u32,
    rng: &mut PseudoRandom,
) -> Option<(StructureAction, u64)> {
    let cost = game.cost(player, kind)?;
    if cost > gold {
        return None;
    }
    let tile = if kind == UnitKind::Warship {
        warship_tile(game, player, rng)?
    } else {
        best_structure_tile(game, player, kind, samples, rng)?
    };
    Some((StructureAction::Build { kind, tile }, cost))
}

/// Samples candidate tiles, filters them through the legality check and
/// returns the best scoring one. Ties keep the earlier sample.
pub fn best_structure_tile(
    game: &Game,
    player: PlayerId,
    kind: UnitKind,
    samples: u32,
    rng: &mut PseudoRandom,
) -> Option<TileRef> {
    let me = game.player(player)?;
    let map = game.map();
    let pool: Vec<TileRef> = match kind {
        UnitKind::Port => me
            .border_tiles()
            .iter()
            .copied()
            .filter(|&tile| map.is_ocean_shore(tile))
            .collect(),
        UnitKind::DefensePost => me.border_tiles().iter().copied().collect(),
        _ => me.tiles().iter().copied().collect(),
    };
    if pool.is_empty() {
        return None;
    }
    let value = structure_tile_value(game, player, kind);
    let mut best: Option<(TileRef, f64)> = None;
    for _ in 0..samples {
        let Some(&tile) = rng.rand_element(&pool) else {
            break;
        };
        if game.can_build(player, kind, tile).is_none() {
            continue;
        }
        let score = value(tile);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((tile, score));
        }
    }
    best.map(|(tile, _)| tile)
}

fn warship_tile(game: &Game, player: PlayerId, rng: &mut PseudoRandom) -> Option<TileRef> {
    let ports: Vec<TileRef> = game
        .units_of(player, &[UnitKind::Port])
        .iter()
        .map(|port| port.tile())
        .collect();
    let range = i64::from(game.config.nation.port_range);
    let map = game.map();
    for _ in 0..WARSHIP_SITE_SAMPLES {
        let &port = rng.rand_element(&ports)?;
        let x = i64::from(map.x(port)) + rng.next_int(-range, range + 1);
        let y = i64::from(map.y(port)) + rng.next_int(-range, range + 1);
        let Some(tile) = map.ref_at(x, y) else {
            continue;
        };
        if game.can_build(player, UnitKind::Warship, tile).is_some() {
            return Some(tile);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GameConfig,
        game::tests::{claim_rect, coastal_game},
        map::GameMap,
    };
    use sim_schema::PlayerKind;

    fn baseline() -> PressureSignals {
        PressureSignals {
            incoming_attacks: 0,
            outmatched_on_border: false,
            enemy_silos: 1,
            enemy_warships: 2,
            own_silos: 0,
            own_warships: 0,
            troops: 90_000,
            max_troops: 100_000,
            tiles: 4_000,
            city_levels: 1,
            ports: 1,
            factories: 0,
            coastal: true,
        }
    }

    #[test]
    fn urgency_table_renders_every_category() {
        let table = urgency_from_signals(&PressureSignals {
            incoming_attacks: 1,
            ..baseline()
        });
        insta::assert_snapshot!(
            table.render(),
            @"ground_defense=1 air_defense=3 population=2 economy=1 production=2 missile=3 naval=2"
        );
    }

    #[test]
    fn ground_urgency_never_drops_as_attacks_increase() {
        for outmatched in [false, true] {
            let mut previous = 0;
            for incoming in 0..6 {
                let table = urgency_from_signals(&PressureSignals {
                    incoming_attacks: incoming,
                    outmatched_on_border: outmatched,
                    ..baseline()
                });
                let ground = table.get(StructureCategory::GroundDefense);
                assert!(ground >= previous);
                assert!(ground <= MAX_URGENCY);
                previous = ground;
            }
        }
    }

    #[test]
    fn air_defense_requires_ground_pressure() {
        let calm = urgency_from_signals(&baseline());
        assert_eq!(calm.get(StructureCategory::AirDefense), 0);
        let pressed = urgency_from_signals(&PressureSignals {
            outmatched_on_border: true,
            enemy_warships: 0,
            enemy_silos: 0,
            ..baseline()
        });
        assert_eq!(pressed.get(StructureCategory::AirDefense), 1);
    }

    #[test]
    fn naval_urgency_forces_warship_slots_first() {
        let mut table = UrgencyTable::default();
        table.set(StructureCategory::Naval, 3);
        table.set(StructureCategory::Population, 2);
        table.set(StructureCategory::Missile, 3);
        table.set(StructureCategory::Economy, 1);
        let mut rng = PseudoRandom::new(11);
        let queue = action_queue(&table, &mut rng);
        assert_eq!(
            queue,
            vec![
                StructureCategory::Naval,
                StructureCategory::Naval,
                StructureCategory::Missile,
                StructureCategory::Population,
                StructureCategory::Economy,
            ]
        );
    }

    #[test]
    fn budget_is_clamped_between_one_and_three() {
        let game = Game::new(GameConfig::default(), GameMap::plains(4, 4));
        assert_eq!(action_budget(&game, 0), 1);
        assert_eq!(action_budget(&game, 100_000), 2);
        assert_eq!(action_budget(&game, 10_000_000), 3);
    }

    #[test]
    fn economic_pass_submits_affordable_construction() {
        let mut game = coastal_game();
        let me = game.add_player("me", PlayerKind::Nation, None);
        claim_rect(&mut game, me, 5, 0, 39, 39);
        game.player_mut(me).expect("me").add_gold(400_000);
        let mut rng = PseudoRandom::new(3);
        let actions = run_economic_pass(&mut game, me, &mut rng);
        assert!(!actions.is_empty());
        let spent: u64 = actions
            .iter()
            .map(|action| match action {
                StructureAction::Build { kind, .. } | StructureAction::Upgrade { kind, .. } => {
                    game.cost(me, *kind).unwrap_or(0)
                }
            })
            .sum();
        assert!(spent <= 400_000);
        assert_eq!(game.pending_requests().len(), actions.len());
        for action in &actions {
            if let StructureAction::Build { kind, tile } = action {
                assert!(game.can_build(me, *kind, *tile).is_some());
            }
        }
    }

    #[test]
    fn coin_flip_orders_upgrade_and_build() {
        let mut upgraded = None;
        let mut built = None;
        for seed in 0..64 {
            let mut game = Game::new(GameConfig::default(), GameMap::plains(40, 40));
            let me = game.add_player("me", PlayerKind::Nation, None);
            claim_rect(&mut game, me, 0, 0, 39, 39);
            let corner = game.map().ref_at(0, 0).expect("tile");
            let city = game.place_structure(me, UnitKind::City, corner);
            // One population slot and gold for exactly one city.
            let cost = game.cost(me, UnitKind::City).expect("cost");
            game.player_mut(me).expect("me").add_gold(cost);

            let mut rng = PseudoRandom::new(seed);
            let actions = run_economic_pass(&mut game, me, &mut rng);
            assert_eq!(actions.len(), 1, "seed {seed}");
            match (actions[0], game.pending_requests()) {
                (StructureAction::Upgrade { unit, .. }, [ExecutionRequest::Upgrade { unit: requested, .. }]) => {
                    assert_eq!(unit, city);
                    assert_eq!(*requested, city);
                    upgraded.get_or_insert(seed);
                }
                (StructureAction::Build { kind, tile }, [ExecutionRequest::Construct { kind: k, tile: t, .. }]) => {
                    assert_eq!((kind, tile), (UnitKind::City, *t));
                    assert_eq!(*k, UnitKind::City);
                    built.get_or_insert(seed);
                }
                other => panic!("seed {seed}: unexpected {other:?}"),
            }
        }
        assert!(upgraded.is_some(), "no seed upgraded first");
        assert!(built.is_some(), "no seed built first");
    }
}
