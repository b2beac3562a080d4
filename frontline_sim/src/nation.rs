//! Autonomous nation controller.
//!
//! One execution per scripted nation. Its cadence and temperament come from a
//! seeded stream so every participant replays the same decisions. Spawn
//! attempts run every spawn-phase tick until one lands; everything else runs
//! only on the nation's own cadence tick.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sim_schema::{
    EmojiTarget, ExecutionRequest, PlayerId, PlayerKind, Relation, TileRef, UnitKind,
};

use crate::{
    config::GameConfig,
    execution::{ExecutionContext, ExecutionError},
    game::Game,
    hashing::player_seed,
    mirv::MirvBehavior,
    nation_structures::run_economic_pass,
    nuke_targeting::{maybe_send_nuke, StrikeLog},
    rng::PseudoRandom,
};

const LABEL: &str = "nation";
const HECKLE_EMOJI: &str = "🤡";
const TRANSPORT_TROOP_DIVISOR: u64 = 5;
const SHORE_SAMPLE_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NationExecution {
    player: PlayerId,
    spawn_cell: TileRef,
    rng: PseudoRandom,
    attack_rate: u64,
    attack_tick: u64,
    trigger_ratio: f64,
    reserve_ratio: f64,
    expand_ratio: f64,
    initialized: bool,
    active: bool,
    /// Relation change actually applied per player whose embargo against us
    /// is in force; refunded exactly when it ends.
    embargo_malus_applied: BTreeMap<PlayerId, i32>,
    last_heckle: BTreeMap<PlayerId, u64>,
    strikes: StrikeLog,
    mirv: MirvBehavior,
}

impl NationExecution {
    pub fn new(player: PlayerId, spawn_cell: TileRef, config: &GameConfig) -> Self {
        let mut rng = PseudoRandom::new(player_seed(player, &config.session_id));
        let attack_rate = rng.next_int(40, 80) as u64;
        let attack_tick = rng.next_int(0, attack_rate as i64) as u64;
        let trigger_ratio = rng.next_int(60, 90) as f64 / 100.0;
        let reserve_ratio = rng.next_int(30, 60) as f64 / 100.0;
        let expand_ratio = rng.next_int(15, 25) as f64 / 100.0;
        Self {
            player,
            spawn_cell,
            rng,
            attack_rate,
            attack_tick,
            trigger_ratio,
            reserve_ratio,
            expand_ratio,
            initialized: false,
            active: true,
            embargo_malus_applied: BTreeMap::new(),
            last_heckle: BTreeMap::new(),
            strikes: StrikeLog::default(),
            mirv: MirvBehavior::default(),
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn attack_rate(&self) -> u64 {
        self.attack_rate
    }

    pub fn attack_tick(&self) -> u64 {
        self.attack_tick
    }

    pub fn ratios(&self) -> (f64, f64, f64) {
        (self.trigger_ratio, self.reserve_ratio, self.expand_ratio)
    }

    pub fn init(&mut self, _ctx: &mut ExecutionContext<'_>) {
        self.initialized = true;
    }

    pub fn validate(&self, game: &Game) -> Result<(), ExecutionError> {
        if !self.initialized {
            return Err(ExecutionError::NotInitialized { execution: LABEL });
        }
        if game.player(self.player).is_none() {
            return Err(ExecutionError::MissingOwner {
                execution: LABEL,
                player: self.player,
            });
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tick(&mut self, ctx: &mut ExecutionContext<'_>) {
        let now = ctx.tick();
        let game = &mut *ctx.game;
        let Some((alive, spawned, tiles)) = game
            .player(self.player)
            .map(|me| (me.is_alive(), me.has_spawned(), me.num_tiles_owned()))
        else {
            self.active = false;
            return;
        };
        if !alive {
            tracing::debug!(target: "frontline::nation", player = %self.player, "nation.retired");
            self.active = false;
            return;
        }

        if game.in_spawn_phase() {
            if !spawned {
                self.try_spawn(game);
            }
            return;
        }
        if now % self.attack_rate != self.attack_tick || tiles == 0 {
            return;
        }

        self.maintain_embargo_malus(game);
        self.answer_alliance_requests(game);
        self.vote_for_peace(game);
        self.update_embargoes(game);
        self.mirv.consider(game, self.player, &mut self.rng);
        run_economic_pass(game, self.player, &mut self.rng);
        self.attack_pass(game);
    }

    fn try_spawn(&mut self, game: &mut Game) {
        let nation = &game.config.nation;
        let (radius, attempts) = (nation.spawn_search_radius, nation.spawn_attempts);
        let mountain = game.config.mountain_elevation;
        let map = game.map();
        let cx = i64::from(map.x(self.spawn_cell));
        let cy = i64::from(map.y(self.spawn_cell));
        for _ in 0..attempts {
            let x = cx + self.rng.next_int(-radius, radius + 1);
            let y = cy + self.rng.next_int(-radius, radius + 1);
            let Some(tile) = map.ref_at(x, y) else {
                continue;
            };
            if !map.is_land(tile) || map.has_owner(tile) {
                continue;
            }
            if map.elevation(tile) >= mountain && self.rng.coin() {
                continue;
            }
            game.submit(ExecutionRequest::Spawn {
                player: self.player,
                tile,
            });
            return;
        }
        tracing::warn!(
            target: "frontline::nation",
            player = %self.player,
            cell = %self.spawn_cell,
            attempts,
            "nation.spawn_failed"
        );
    }

    /// Embargoes others hold against us cost relation once when they start
    /// and refund it once when they end.
    fn maintain_embargo_malus(&mut self, game: &mut Game) {
        let malus = game.config.nation.embargo_malus;
        let transitions: Vec<(PlayerId, bool)> = game
            .players()
            .filter(|other| other.id() != self.player)
            .filter_map(|other| {
                let embargoed = other.has_embargo_against(self.player);
                let applied = self.embargo_malus_applied.contains_key(&other.id());
                (embargoed != applied).then_some((other.id(), embargoed))
            })
            .collect();
        for (other, embargoed) in transitions {
            if embargoed {
                let before = self.relation_score(game, other);
                game.update_relation(self.player, other, -malus);
                let applied = self.relation_score(game, other) - before;
                self.embargo_malus_applied.insert(other, applied);
            } else if let Some(applied) = self.embargo_malus_applied.remove(&other) {
                game.update_relation(self.player, other, -applied);
            }
        }
    }

    fn relation_score(&self, game: &Game, other: PlayerId) -> i32 {
        game.player(self.player)
            .map_or(0, |me| me.relation_score(other))
    }

    fn answer_alliance_requests(&mut self, game: &mut Game) {
        let Some(me) = game.player(self.player) else {
            return;
        };
        let decisions: Vec<(PlayerId, bool)> = me
            .alliance_requests()
            .iter()
            .map(|&from| (from, me.relation(from) >= Relation::Neutral))
            .collect();
        for (from, accept) in decisions {
            if accept {
                game.accept_alliance_request(self.player, from);
            } else {
                game.reject_alliance_request(self.player, from);
            }
        }
    }

    fn vote_for_peace(&mut self, game: &mut Game) {
        let eligible = game.peace_vote().is_some_and(|vote| {
            vote.members.contains(&self.player) && !vote.approvals.contains(&self.player)
        });
        if eligible {
            game.cast_peace_vote(self.player);
        }
    }

    /// Embargo anyone we consider hostile; lift it once they are neutral again.
    fn update_embargoes(&mut self, game: &mut Game) {
        let Some(me) = game.player(self.player) else {
            return;
        };
        let changes: Vec<(PlayerId, bool)> = game
            .players()
            .filter(|other| other.id() != self.player && other.is_alive())
            .filter_map(|other| {
                let relation = me.relation(other.id());
                let embargoed = me.has_embargo_against(other.id());
                if relation <= Relation::Hostile && !embargoed {
                    Some((other.id(), true))
                } else if relation >= Relation::Neutral && embargoed {
                    Some((other.id(), false))
                } else {
                    None
                }
            })
            .collect();
        for (other, start) in changes {
            if start {
                game.add_embargo(self.player, other);
            } else {
                game.stop_embargo(self.player, other);
            }
        }
    }

    fn attack_pass(&mut self, game: &mut Game) {
        let Some(me) = game.player(self.player) else {
            return;
        };
        let troops = me.troops();
        let max_troops = game
            .config
            .max_troops(me.num_tiles_owned(), game.unit_levels(self.player, UnitKind::City));
        if (troops as f64) < max_troops as f64 * self.trigger_ratio {
            return;
        }

        let map = game.map();
        let mut unowned_land = false;
        let mut bordering: BTreeSet<PlayerId> = BTreeSet::new();
        for &tile in me.border_tiles() {
            for neighbor in map.neighbors(tile) {
                if !map.is_land(neighbor) {
                    continue;
                }
                match map.owner(neighbor) {
                    None => unowned_land = true,
                    Some(owner) if owner != self.player => {
                        bordering.insert(owner);
                    }
                    Some(_) => {}
                }
            }
        }

        let odds = &game.config.nation;
        let (isolated_odds, contested_odds, alliance_odds) = (
            odds.raid_odds_isolated,
            odds.raid_odds_contested,
            odds.alliance_request_odds,
        );
        if bordering.is_empty() && !unowned_land {
            if self.rng.chance(isolated_odds) {
                self.send_random_raid(game, troops);
            }
            return;
        }
        if self.rng.chance(contested_odds) {
            self.send_random_raid(game, troops);
            return;
        }
        if unowned_land {
            let expansion = (troops as f64 * self.expand_ratio) as u64;
            if expansion > 0 {
                game.submit(ExecutionRequest::Attack {
                    player: self.player,
                    target: None,
                    troops: expansion,
                });
            }
            return;
        }

        let mut enemies: Vec<(u64, PlayerId)> = bordering
            .iter()
            .filter(|&&id| !game.is_friendly(self.player, id))
            .filter_map(|&id| game.player(id))
            .filter(|p| p.is_alive())
            .map(|p| (p.troops(), p.id()))
            .collect();
        enemies.sort();
        let enemies: Vec<PlayerId> = enemies.into_iter().map(|(_, id)| id).collect();
        if enemies.is_empty() {
            return;
        }

        if self.rng.chance(alliance_odds) {
            if let Some(&ally) = self.rng.rand_element(&enemies) {
                let already = game
                    .player(ally)
                    .is_some_and(|p| p.alliance_requests().contains(&self.player));
                if !already {
                    game.submit(ExecutionRequest::AllianceRequest {
                        from: self.player,
                        to: ally,
                    });
                }
            }
        }

        let Some(enemy) = select_enemy(game, self.player, &enemies) else {
            return;
        };
        self.heckle(game, enemy);
        maybe_send_nuke(game, self.player, enemy, &mut self.rng, &mut self.strikes);

        if game.shares_border(self.player, enemy) {
            let reserve = (max_troops as f64 * self.reserve_ratio) as u64;
            let committed = troops.saturating_sub(reserve);
            if committed > 0 {
                game.submit(ExecutionRequest::Attack {
                    player: self.player,
                    target: Some(enemy),
                    troops: committed,
                });
            }
        } else {
            self.send_boat(game, enemy, troops / TRANSPORT_TROOP_DIVISOR);
        }
    }

    fn heckle(&mut self, game: &mut Game, enemy: PlayerId) {
        let Some(target) = game.player(enemy) else {
            return;
        };
        if target.kind() != PlayerKind::Human {
            return;
        }
        let now = game.ticks();
        let cooldown = game.config.nation.heckle_cooldown_ticks;
        let ready = self
            .last_heckle
            .get(&enemy)
            .map_or(true, |&last| now >= last + cooldown);
        if ready {
            game.send_emoji(self.player, EmojiTarget::Player(enemy), HECKLE_EMOJI);
            self.last_heckle.insert(enemy, now);
        }
    }

    fn send_random_raid(&mut self, game: &mut Game, troops: u64) {
        let targets: Vec<PlayerId> = game
            .active_players()
            .filter(|p| p.id() != self.player && !game.is_friendly(self.player, p.id()))
            .filter(|p| {
                p.border_tiles()
                    .iter()
                    .any(|&tile| game.map().is_ocean_shore(tile))
            })
            .map(|p| p.id())
            .collect();
        if let Some(&target) = self.rng.rand_element(&targets) {
            self.send_boat(game, target, troops / TRANSPORT_TROOP_DIVISOR);
        }
    }

    /// Transport raid between the closest pair of coastal border tiles within
    /// boat range.
    fn send_boat(&mut self, game: &mut Game, enemy: PlayerId, troops: u64) {
        if troops == 0 {
            return;
        }
        let ours = shore_sample(game, self.player);
        let theirs = shore_sample(game, enemy);
        let map = game.map();
        let Some((_, destination)) = map.closest_two_tiles(&ours, &theirs) else {
            return;
        };
        let reach = game.config.nation.boat_search_distance;
        let within_range = ours
            .iter()
            .any(|&tile| i64::from(map.manhattan(tile, destination)) <= reach);
        if !within_range {
            return;
        }
        game.submit(ExecutionRequest::TransportShip {
            player: self.player,
            target: Some(enemy),
            destination,
            troops,
        });
    }
}

fn shore_sample(game: &Game, player: PlayerId) -> Vec<TileRef> {
    let Some(p) = game.player(player) else {
        return Vec::new();
    };
    let map = game.map();
    let shore: Vec<TileRef> = p
        .border_tiles()
        .iter()
        .copied()
        .filter(|&tile| map.is_ocean_shore(tile))
        .collect();
    let stride = (shore.len() / SHORE_SAMPLE_LIMIT).max(1);
    shore.into_iter().step_by(stride).collect()
}

/// Enemy choice among the bordering rivals (sorted weakest first): anyone
/// currently attacking us, else a hostile rival, else the weakest.
pub fn select_enemy(game: &Game, player: PlayerId, rivals: &[PlayerId]) -> Option<PlayerId> {
    let mut attackers: Vec<(u64, PlayerId)> = game
        .incoming_attacks(player)
        .into_iter()
        .map(|attack| attack.attacker)
        .filter(|&attacker| !game.is_friendly(player, attacker))
        .filter_map(|attacker| game.player(attacker).map(|p| (p.troops(), attacker)))
        .collect();
    attackers.sort();
    if let Some(&(_, attacker)) = attackers.last() {
        return Some(attacker);
    }
    let me = game.player(player)?;
    rivals
        .iter()
        .copied()
        .find(|&rival| me.relation(rival) == Relation::Hostile)
        .or_else(|| rivals.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        execution::ExecutionRunner,
        game::{tests::claim_rect, ActiveAttack},
        map::{GameMap, Terrain},
    };

    fn config() -> GameConfig {
        GameConfig {
            session_id: "test-session".to_string(),
            spawn_phase_ticks: 0,
            ..GameConfig::default()
        }
    }

    #[test]
    fn cadence_and_ratios_come_from_the_seeded_stream() {
        let cfg = config();
        let a = NationExecution::new(PlayerId(2), TileRef(0), &cfg);
        let b = NationExecution::new(PlayerId(2), TileRef(0), &cfg);
        assert_eq!(a.attack_rate(), b.attack_rate());
        assert_eq!(a.attack_tick(), b.attack_tick());
        assert!((40..80).contains(&a.attack_rate()));
        assert!(a.attack_tick() < a.attack_rate());
        let (trigger, reserve, expand) = a.ratios();
        assert!((0.6..0.9).contains(&trigger));
        assert!((0.3..0.6).contains(&reserve));
        assert!((0.15..0.25).contains(&expand));
    }

    /// Runs the nation on its next cadence tick.
    fn run_on_cadence(game: &mut Game, nation: &mut NationExecution) {
        while game.ticks() % nation.attack_rate() != nation.attack_tick() {
            game.advance_tick();
        }
        let mut spawned = Vec::new();
        let mut ctx = ExecutionContext::new(game, &mut spawned);
        nation.init(&mut ctx);
        nation.tick(&mut ctx);
    }

    #[test]
    fn spawn_attempt_picks_unowned_land() {
        let mut cfg = config();
        cfg.spawn_phase_ticks = 10_000;
        let map = GameMap::from_fn(60, 60, |x, _| {
            if x < 30 {
                (Terrain::Ocean, 0)
            } else {
                (Terrain::Land, 10)
            }
        });
        let mut game = Game::new(cfg, map);
        let me = game.add_player("me", PlayerKind::Nation, None);
        let cell = game.map().ref_at(32, 30).expect("tile");
        let mut nation = NationExecution::new(me, cell, &game.config);
        run_on_cadence(&mut game, &mut nation);
        match game.pending_requests() {
            [ExecutionRequest::Spawn { player, tile }] => {
                assert_eq!(*player, me);
                assert!(game.map().is_land(*tile));
                assert!(!game.map().has_owner(*tile));
            }
            other => panic!("expected one spawn request, got {other:?}"),
        }
    }

    #[test]
    fn embargo_malus_applies_and_reverts_once() {
        let mut game = Game::new(config(), GameMap::plains(40, 40));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let other = game.add_player("other", PlayerKind::Human, None);
        claim_rect(&mut game, me, 0, 0, 9, 9);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);

        game.add_embargo(other, me);
        nation.maintain_embargo_malus(&mut game);
        nation.maintain_embargo_malus(&mut game);
        assert_eq!(game.player(me).expect("me").relation_score(other), -20);

        game.stop_embargo(other, me);
        nation.maintain_embargo_malus(&mut game);
        nation.maintain_embargo_malus(&mut game);
        assert_eq!(game.player(me).expect("me").relation_score(other), 0);
    }

    #[test]
    fn embargo_refund_matches_the_clamped_malus() {
        let mut game = Game::new(config(), GameMap::plains(40, 40));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let floor = game.add_player("floor", PlayerKind::Human, None);
        let near = game.add_player("near", PlayerKind::Human, None);
        claim_rect(&mut game, me, 0, 0, 9, 9);
        game.update_relation(me, floor, -100);
        game.update_relation(me, near, -90);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);

        game.add_embargo(floor, me);
        game.add_embargo(near, me);
        nation.maintain_embargo_malus(&mut game);
        let score = |game: &Game, other| game.player(me).expect("me").relation_score(other);
        assert_eq!(score(&game, floor), -100);
        assert_eq!(score(&game, near), -100);

        game.stop_embargo(floor, me);
        game.stop_embargo(near, me);
        nation.maintain_embargo_malus(&mut game);
        assert_eq!(score(&game, floor), -100);
        assert_eq!(score(&game, near), -90);
    }

    #[test]
    fn hostile_players_are_embargoed_until_neutral() {
        let mut game = Game::new(config(), GameMap::plains(40, 40));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let other = game.add_player("other", PlayerKind::Nation, None);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        game.update_relation(me, other, -60);
        nation.update_embargoes(&mut game);
        assert!(game.player(me).expect("me").has_embargo_against(other));
        game.update_relation(me, other, 30);
        nation.update_embargoes(&mut game);
        assert!(game.player(me).expect("me").has_embargo_against(other), "distrustful keeps it");
        game.update_relation(me, other, 40);
        nation.update_embargoes(&mut game);
        assert!(!game.player(me).expect("me").has_embargo_against(other));
    }

    #[test]
    fn alliance_requests_follow_relation() {
        let mut game = Game::new(config(), GameMap::plains(40, 40));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let friend = game.add_player("friend", PlayerKind::Human, None);
        let foe = game.add_player("foe", PlayerKind::Human, None);
        let enemy = game.add_player("enemy", PlayerKind::Nation, None);
        game.update_relation(me, foe, -10);
        game.update_relation(me, enemy, -80);
        game.deliver_alliance_request(friend, me);
        game.deliver_alliance_request(foe, me);
        game.deliver_alliance_request(enemy, me);
        assert_eq!(game.player(me).expect("me").relation(enemy), Relation::Hostile);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        nation.answer_alliance_requests(&mut game);
        let state = game.player(me).expect("me");
        assert!(state.is_allied_with(friend));
        assert!(!state.is_allied_with(foe));
        assert!(!state.is_allied_with(enemy));
        assert!(state.alliance_requests().is_empty());
    }

    #[test]
    fn heckles_humans_at_most_once_per_cooldown() {
        let mut game = Game::new(config(), GameMap::plains(40, 40));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let human = game.add_player("human", PlayerKind::Human, None);
        let bot = game.add_player("bot", PlayerKind::Bot, None);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        for _ in 0..300 {
            nation.heckle(&mut game, human);
            nation.heckle(&mut game, bot);
            game.advance_tick();
        }
        assert_eq!(game.signals().len(), 1);
        nation.heckle(&mut game, human);
        assert_eq!(game.signals().len(), 2);
    }

    #[test]
    fn select_enemy_prefers_attackers_then_hostility() {
        let mut game = Game::new(config(), GameMap::plains(40, 40));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let weak = game.add_player("weak", PlayerKind::Nation, None);
        let hostile = game.add_player("hostile", PlayerKind::Nation, None);
        let attacker = game.add_player("attacker", PlayerKind::Nation, None);
        let rivals = [weak, hostile];
        assert_eq!(select_enemy(&game, me, &rivals), Some(weak));
        game.update_relation(me, hostile, -80);
        assert_eq!(select_enemy(&game, me, &rivals), Some(hostile));
        game.register_attack(ActiveAttack {
            attacker,
            target: Some(me),
            troops: 1_000,
        });
        assert_eq!(select_enemy(&game, me, &rivals), Some(attacker));
    }

    #[test]
    fn strong_nation_attacks_its_weakest_neighbour() {
        let mut game = Game::new(config(), GameMap::plains(60, 20));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let weak = game.add_player("weak", PlayerKind::Nation, None);
        let strong = game.add_player("strong", PlayerKind::Nation, None);
        claim_rect(&mut game, weak, 0, 0, 19, 19);
        claim_rect(&mut game, me, 20, 0, 39, 19);
        claim_rect(&mut game, strong, 40, 0, 59, 19);
        game.player_mut(weak).expect("weak").add_troops(1_000);
        game.player_mut(strong).expect("strong").add_troops(50_000);
        let max = game.config.max_troops(400, 0);
        game.player_mut(me).expect("me").add_troops(max);

        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        let mut found = false;
        for _ in 0..20 {
            run_on_cadence(&mut game, &mut nation);
            game.advance_tick();
            found = game.pending_requests().iter().any(|request| {
                matches!(
                    request,
                    ExecutionRequest::Attack { player, target: Some(target), .. }
                        if *player == me && *target == weak
                )
            });
            if found {
                break;
            }
        }
        assert!(found, "expected an attack on the weakest neighbour");
        assert!(!game.pending_requests().iter().any(|request| matches!(
            request,
            ExecutionRequest::Attack { target: Some(target), .. } if *target == strong
        )));
    }

    #[test]
    fn dead_nation_retires() {
        let mut game = Game::new(config(), GameMap::plains(20, 20));
        let me = game.add_player("me", PlayerKind::Nation, None);
        claim_rect(&mut game, me, 0, 0, 3, 3);
        game.kill_player(me);
        let mut runner = ExecutionRunner::new();
        runner.spawn(NationExecution::new(me, TileRef(0), &game.config));
        runner.run_tick(&mut game);
        assert!(runner.executions().is_empty());
    }

    /// `me` and `weak` share the north shore, `raider` holds the south one.
    fn strait_game(cfg: GameConfig, split: bool) -> (Game, PlayerId, PlayerId, PlayerId) {
        let map = GameMap::from_fn(60, 40, |_, y| {
            if (20..30).contains(&y) {
                (Terrain::Ocean, 0)
            } else {
                (Terrain::Land, 0)
            }
        });
        let mut game = Game::new(cfg, map);
        let me = game.add_player("me", PlayerKind::Nation, None);
        let weak = game.add_player("weak", PlayerKind::Nation, None);
        let raider = game.add_player("raider", PlayerKind::Nation, None);
        if split {
            claim_rect(&mut game, me, 0, 0, 29, 19);
            claim_rect(&mut game, weak, 30, 0, 59, 19);
        } else {
            claim_rect(&mut game, me, 0, 0, 59, 19);
        }
        claim_rect(&mut game, raider, 0, 30, 59, 39);
        let tiles = game.player(me).expect("me").num_tiles_owned();
        let max = game.config.max_troops(tiles, 0);
        game.player_mut(me).expect("me").add_troops(max);
        (game, me, weak, raider)
    }

    fn quiet_config() -> GameConfig {
        let mut cfg = config();
        cfg.nation.raid_odds_contested = u32::MAX;
        cfg.nation.raid_odds_isolated = u32::MAX;
        cfg.nation.alliance_request_odds = u32::MAX;
        cfg
    }

    fn boats(game: &Game) -> Vec<(PlayerId, Option<PlayerId>, TileRef, u64)> {
        game.pending_requests()
            .iter()
            .filter_map(|request| match *request {
                ExecutionRequest::TransportShip {
                    player,
                    target,
                    destination,
                    troops,
                } => Some((player, target, destination, troops)),
                _ => None,
            })
            .collect()
    }

    fn has_attack(game: &Game) -> bool {
        game.pending_requests()
            .iter()
            .any(|request| matches!(request, ExecutionRequest::Attack { .. }))
    }

    #[test]
    fn attacker_across_the_water_gets_a_boat() {
        let (mut game, me, _weak, raider) = strait_game(quiet_config(), true);
        game.register_attack(ActiveAttack {
            attacker: raider,
            target: Some(me),
            troops: 1_000,
        });
        let troops = game.player(me).expect("me").troops();
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        nation.attack_pass(&mut game);

        assert!(!game.shares_border(me, raider));
        assert!(!has_attack(&game));
        match boats(&game).as_slice() {
            [(player, target, destination, sent)] => {
                assert_eq!(*player, me);
                assert_eq!(*target, Some(raider));
                assert_eq!(*sent, troops / TRANSPORT_TROOP_DIVISOR);
                assert_eq!(game.map().owner(*destination), Some(raider));
            }
            other => panic!("expected one transport, got {other:?}"),
        }
    }

    #[test]
    fn isolated_nation_raids_overseas() {
        let mut cfg = quiet_config();
        cfg.nation.raid_odds_isolated = 1;
        let (mut game, me, _weak, raider) = strait_game(cfg, false);
        let troops = game.player(me).expect("me").troops();
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        nation.attack_pass(&mut game);

        assert!(!has_attack(&game));
        match boats(&game).as_slice() {
            [(_, target, destination, sent)] => {
                assert_eq!(*target, Some(raider));
                assert!(!game.shares_border(me, raider));
                assert_eq!(*sent, troops / TRANSPORT_TROOP_DIVISOR);
                assert_eq!(game.map().owner(*destination), Some(raider));
            }
            other => panic!("expected one raid, got {other:?}"),
        }
    }

    #[test]
    fn isolated_nation_holds_when_the_raid_roll_fails() {
        let (mut game, me, _weak, _raider) = strait_game(quiet_config(), false);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        nation.attack_pass(&mut game);
        assert!(game.pending_requests().is_empty());
    }

    #[test]
    fn contested_raid_replaces_the_border_attack() {
        let mut cfg = quiet_config();
        cfg.nation.raid_odds_contested = 1;
        let (mut game, me, weak, raider) = strait_game(cfg, true);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);
        nation.attack_pass(&mut game);

        assert!(!has_attack(&game));
        match boats(&game).as_slice() {
            [(player, Some(target), _, _)] => {
                assert_eq!(*player, me);
                assert!(*target == weak || *target == raider);
            }
            other => panic!("expected one raid, got {other:?}"),
        }
    }

    #[test]
    fn bordering_enemy_receives_one_alliance_request() {
        let mut cfg = quiet_config();
        cfg.nation.alliance_request_odds = 1;
        let mut game = Game::new(cfg, GameMap::plains(60, 20));
        let me = game.add_player("me", PlayerKind::Nation, None);
        let other = game.add_player("other", PlayerKind::Nation, None);
        claim_rect(&mut game, me, 0, 0, 29, 19);
        claim_rect(&mut game, other, 30, 0, 59, 19);
        let max = game.config.max_troops(600, 0);
        game.player_mut(me).expect("me").add_troops(max);
        let mut nation = NationExecution::new(me, TileRef(0), &game.config);

        let requests_to_other = |game: &Game| {
            game.pending_requests()
                .iter()
                .filter(|request| {
                    **request
                        == ExecutionRequest::AllianceRequest {
                            from: me,
                            to: other,
                        }
                })
                .count()
        };
        nation.attack_pass(&mut game);
        assert_eq!(requests_to_other(&game), 1);

        game.take_requests();
        game.deliver_alliance_request(me, other);
        nation.attack_pass(&mut game);
        assert_eq!(requests_to_other(&game), 0, "request already pending");
        assert!(has_attack(&game));
    }
}
