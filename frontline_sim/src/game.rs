use std::collections::{BTreeMap, BTreeSet};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use sim_schema::{
    ActionPayload, ActionRecord, EmojiTarget, ExecutionRequest, GameSignal, MessageKind,
    PlayerId, PlayerKind, Team, TileRef, UnitId, UnitKind, WinnerRecord,
};

use crate::{
    config::GameConfig,
    map::GameMap,
    player::Player,
    unit::{TrajectoryTile, Unit},
};

/// Structures may not be placed closer than this to another structure.
pub const STRUCTURE_MIN_SPACING: u32 = 3;

/// Land attack in progress, advanced by the request resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAttack {
    pub attacker: PlayerId,
    pub target: Option<PlayerId>,
    pub troops: u64,
}

/// Restricted peace vote among the members of a dominant coalition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeaceVote {
    pub members: Vec<PlayerId>,
    pub started_tick: u64,
    pub expires_tick: u64,
    pub approvals: BTreeSet<PlayerId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub intercepts: BTreeMap<PlayerId, BTreeMap<UnitKind, u32>>,
    pub sam_launches: BTreeMap<PlayerId, u32>,
    pub nukes_launched: BTreeMap<PlayerId, u32>,
    /// Tick of each player's most recent accepted MIRV launch.
    pub last_mirv_launch: BTreeMap<PlayerId, u64>,
    pub detonations: u32,
}

impl GameStats {
    pub fn intercepted(&self, player: PlayerId, kind: UnitKind) -> u32 {
        self.intercepts
            .get(&player)
            .and_then(|per_kind| per_kind.get(&kind))
            .copied()
            .unwrap_or(0)
    }
}

/// Reference world store: map, player and unit arenas, and the outboxes the
/// decision core writes requests and signals into.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub config: GameConfig,
    map: GameMap,
    players: Vec<Player>,
    units: BTreeMap<UnitId, Unit>,
    next_unit_id: u32,
    tick: u64,
    requests: Vec<ExecutionRequest>,
    signals: Vec<GameSignal>,
    action_log: Vec<ActionRecord>,
    stats: GameStats,
    winner: Option<WinnerRecord>,
    peace_vote: Option<PeaceVote>,
    attacks: Vec<ActiveAttack>,
}

impl Game {
    pub fn new(config: GameConfig, map: GameMap) -> Self {
        Self {
            config,
            map,
            players: Vec::new(),
            units: BTreeMap::new(),
            next_unit_id: 1,
            tick: 0,
            requests: Vec::new(),
            signals: Vec::new(),
            action_log: Vec::new(),
            stats: GameStats::default(),
            winner: None,
            peace_vote: None,
            attacks: Vec::new(),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn in_spawn_phase(&self) -> bool {
        self.tick < self.config.spawn_phase_ticks
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn owner(&self, tile: TileRef) -> Option<PlayerId> {
        self.map.owner(tile)
    }

    // ---- players -------------------------------------------------------

    pub fn add_player(&mut self, name: &str, kind: PlayerKind, team: Option<Team>) -> PlayerId {
        let id = PlayerId(self.players.len() as u16);
        self.players
            .push(Player::new(id, name.to_string(), kind, team));
        id
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.0 as usize)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.0 as usize)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Alive players that hold territory, in id order.
    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players
            .iter()
            .filter(|player| player.is_alive() && player.num_tiles_owned() > 0)
    }

    pub fn kill_player(&mut self, id: PlayerId) {
        let tiles: Vec<TileRef> = match self.player(id) {
            Some(player) => player.tiles().iter().copied().collect(),
            None => return,
        };
        for tile in tiles {
            self.relinquish(tile);
        }
        let owned: Vec<UnitId> = self
            .units
            .values()
            .filter(|unit| unit.owner() == id)
            .map(Unit::id)
            .collect();
        for unit in owned {
            self.delete_unit(unit);
        }
        if let Some(player) = self.player_mut(id) {
            player.mark_dead();
        }
    }

    /// Players sharing the same top-level overlord (or the same player).
    pub fn hierarchy_root(&self, id: PlayerId) -> PlayerId {
        let mut current = id;
        let mut guard = 0;
        while let Some(overlord) = self.player(current).and_then(Player::overlord) {
            current = overlord.player;
            guard += 1;
            if guard > self.players.len() {
                break;
            }
        }
        current
    }

    /// Same player, allied, or on the same team.
    pub fn is_friendly(&self, a: PlayerId, b: PlayerId) -> bool {
        if a == b {
            return true;
        }
        match (self.player(a), self.player(b)) {
            (Some(pa), Some(pb)) => pa.is_friendly(pb),
            _ => false,
        }
    }

    pub fn shares_hierarchy(&self, a: PlayerId, b: PlayerId) -> bool {
        self.hierarchy_root(a) == self.hierarchy_root(b)
    }

    /// Members of the hierarchy rooted at `root`, in id order.
    pub fn hierarchy_members(&self, root: PlayerId) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|player| player.is_alive() && self.hierarchy_root(player.id()) == root)
            .map(Player::id)
            .collect()
    }

    pub fn shares_border(&self, a: PlayerId, b: PlayerId) -> bool {
        let Some(player) = self.player(a) else {
            return false;
        };
        player
            .border_tiles()
            .iter()
            .any(|&tile| self.map.neighbors(tile).any(|n| self.map.owner(n) == Some(b)))
    }

    pub fn territory_center(&self, id: PlayerId) -> Option<TileRef> {
        let player = self.player(id)?;
        let count = player.num_tiles_owned() as u64;
        if count == 0 {
            return None;
        }
        let (sum_x, sum_y) = player.tiles().iter().fold((0u64, 0u64), |(sx, sy), &tile| {
            (sx + u64::from(self.map.x(tile)), sy + u64::from(self.map.y(tile)))
        });
        let centroid = self
            .map
            .ref_at((sum_x / count) as i64, (sum_y / count) as i64)?;
        if self.map.owner(centroid) == Some(id) {
            return Some(centroid);
        }
        self.map
            .closest_tile(player.tiles().iter().copied(), centroid)
            .map(|(tile, _)| tile)
    }

    // ---- territory -----------------------------------------------------

    pub fn conquer(&mut self, player: PlayerId, tile: TileRef) {
        let previous = self.map.owner(tile);
        if previous == Some(player) || !self.map.is_land(tile) {
            return;
        }
        if let Some(previous) = previous.and_then(|p| self.players.get_mut(p.0 as usize)) {
            previous.remove_tile(tile);
        }
        self.map.set_owner(tile, Some(player));
        if let Some(owner) = self.players.get_mut(player.0 as usize) {
            owner.insert_tile(tile);
        }
        for unit in self.units.values_mut() {
            if unit.tile() == tile && unit.kind().is_structure() {
                unit.set_owner(player);
            }
        }
        self.refresh_border_around(tile);
    }

    pub fn relinquish(&mut self, tile: TileRef) {
        let Some(previous) = self.map.owner(tile) else {
            return;
        };
        if let Some(previous) = self.players.get_mut(previous.0 as usize) {
            previous.remove_tile(tile);
        }
        self.map.set_owner(tile, None);
        self.refresh_border_around(tile);
    }

    pub(crate) fn set_fallout(&mut self, tile: TileRef) {
        self.map.set_fallout(tile, true);
    }

    fn refresh_border_around(&mut self, tile: TileRef) {
        let mut affected = vec![tile];
        affected.extend(self.map.neighbors(tile));
        for t in affected {
            let Some(owner) = self.map.owner(t) else {
                continue;
            };
            let is_border = self.map.neighbors(t).any(|n| self.map.owner(n) != Some(owner));
            if let Some(player) = self.players.get_mut(owner.0 as usize) {
                player.set_border(t, is_border);
            }
        }
    }

    // ---- units ---------------------------------------------------------

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Whether `id` was ever handed out, even if the unit is gone since.
    pub fn unit_allocated(&self, id: UnitId) -> bool {
        id.0 > 0 && id.0 < self.next_unit_id
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Active units of `player` whose kind is in `kinds`, in id order.
    pub fn units_of(&self, player: PlayerId, kinds: &[UnitKind]) -> Vec<&Unit> {
        self.units
            .values()
            .filter(|unit| unit.is_active() && unit.owner() == player && kinds.contains(&unit.kind()))
            .collect()
    }

    pub fn units_by_kind(&self, kinds: &[UnitKind]) -> Vec<&Unit> {
        self.units
            .values()
            .filter(|unit| unit.is_active() && kinds.contains(&unit.kind()))
            .collect()
    }

    /// Active units within euclidean `radius` of `tile`.
    pub fn nearby_units(&self, tile: TileRef, radius: u32, kinds: &[UnitKind]) -> Vec<&Unit> {
        let radius_sq = u64::from(radius) * u64::from(radius);
        self.units
            .values()
            .filter(|unit| {
                unit.is_active()
                    && kinds.contains(&unit.kind())
                    && self.map.euclidean_sq(unit.tile(), tile) <= radius_sq
            })
            .collect()
    }

    pub fn unit_count(&self, player: PlayerId, kind: UnitKind) -> usize {
        self.units
            .values()
            .filter(|unit| unit.is_active() && unit.owner() == player && unit.kind() == kind)
            .count()
    }

    /// Summed levels of a structure kind (a level-3 city counts three times).
    pub fn unit_levels(&self, player: PlayerId, kind: UnitKind) -> u32 {
        self.units_of(player, &[kind]).iter().map(|u| u.level()).sum()
    }

    pub fn cost(&self, player: PlayerId, kind: UnitKind) -> Option<u64> {
        self.config.unit_cost(kind, self.unit_count(player, kind))
    }

    pub fn can_afford(&self, player: PlayerId, kind: UnitKind) -> bool {
        match (self.player(player), self.cost(player, kind)) {
            (Some(p), Some(cost)) => p.gold() >= cost,
            _ => false,
        }
    }

    /// Legality check for building `kind` at `tile`. Returns the tile the
    /// unit would spawn from (the silo for weapons, the tile itself otherwise).
    pub fn can_build(&self, player: PlayerId, kind: UnitKind, tile: TileRef) -> Option<TileRef> {
        let owner = self.player(player)?;
        if !owner.is_alive() || !self.can_afford(player, kind) {
            return None;
        }
        if (tile.0 as usize) >= self.map.tile_count() {
            return None;
        }
        match kind {
            UnitKind::City
            | UnitKind::Factory
            | UnitKind::DefensePost
            | UnitKind::MissileSilo
            | UnitKind::SamLauncher
            | UnitKind::Port => {
                if self.map.owner(tile) != Some(player)
                    || !self.map.is_land(tile)
                    || self.map.has_fallout(tile)
                {
                    return None;
                }
                if kind == UnitKind::Port && !self.map.is_ocean_shore(tile) {
                    return None;
                }
                let crowded = !self
                    .nearby_units(tile, STRUCTURE_MIN_SPACING - 1, &UnitKind::STRUCTURES)
                    .is_empty();
                (!crowded).then_some(tile)
            }
            UnitKind::AtomBomb | UnitKind::HydrogenBomb | UnitKind::Mirv => self
                .units_of(player, &[UnitKind::MissileSilo])
                .into_iter()
                .filter(|silo| !silo.is_in_cooldown())
                .min_by_key(|silo| (self.map.manhattan(silo.tile(), tile), silo.id()))
                .map(Unit::tile),
            UnitKind::Warship => {
                if !self.map.is_ocean(tile) {
                    return None;
                }
                let range = self.config.nation.port_range;
                self.units_of(player, &[UnitKind::Port])
                    .into_iter()
                    .any(|port| self.map.manhattan(port.tile(), tile) <= range)
                    .then_some(tile)
            }
            UnitKind::TransportShip
            | UnitKind::MirvWarhead
            | UnitKind::SamMissile => None,
        }
    }

    /// Builds a structure after a successful legality check, charging its cost.
    pub fn build_unit(&mut self, player: PlayerId, kind: UnitKind, tile: TileRef) -> Option<UnitId> {
        let spawn = self.can_build(player, kind, tile)?;
        let cost = self.cost(player, kind)?;
        if !self.player_mut(player)?.spend_gold(cost) {
            return None;
        }
        Some(self.insert_unit(Unit::new(UnitId(0), kind, player, spawn)))
    }

    pub fn can_upgrade(&self, player: PlayerId, unit: UnitId) -> bool {
        let Some(unit) = self.unit(unit) else {
            return false;
        };
        unit.is_active()
            && unit.owner() == player
            && unit.kind().is_structure()
            && unit.kind() != UnitKind::DefensePost
            && self.can_afford(player, unit.kind())
    }

    pub fn upgrade_unit(&mut self, player: PlayerId, unit: UnitId) -> bool {
        if !self.can_upgrade(player, unit) {
            return false;
        }
        let Some(kind) = self.unit(unit).map(Unit::kind) else {
            return false;
        };
        let Some(cost) = self.cost(player, kind) else {
            return false;
        };
        let paid = self
            .player_mut(player)
            .map(|p| p.spend_gold(cost))
            .unwrap_or(false);
        if paid {
            if let Some(unit) = self.unit_mut(unit) {
                unit.increase_level();
            }
        }
        paid
    }

    /// Places an in-flight projectile. The caller provides the trajectory.
    pub fn spawn_projectile(
        &mut self,
        owner: PlayerId,
        kind: UnitKind,
        trajectory: Vec<TrajectoryTile>,
        target: TileRef,
    ) -> Option<UnitId> {
        let start = trajectory.first()?.tile;
        let unit = Unit::new(UnitId(0), kind, owner, start).with_trajectory(trajectory, target);
        Some(self.insert_unit(unit))
    }

    /// Places a structure without charging gold (scenario setup).
    pub fn place_structure(&mut self, owner: PlayerId, kind: UnitKind, tile: TileRef) -> UnitId {
        self.insert_unit(Unit::new(UnitId(0), kind, owner, tile))
    }

    fn insert_unit(&mut self, unit: Unit) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;
        let mut unit = unit;
        unit.assign_id(id);
        self.units.insert(id, unit);
        id
    }

    pub fn delete_unit(&mut self, id: UnitId) {
        self.units.remove(&id);
    }

    pub(crate) fn set_targeted_by_sam(&mut self, id: UnitId, targeted: bool) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.set_targeted_by_sam(targeted);
        }
    }

    // ---- diplomacy -----------------------------------------------------

    pub fn update_relation(&mut self, player: PlayerId, other: PlayerId, delta: i32) {
        if let Some(p) = self.player_mut(player) {
            p.update_relation(other, delta);
        }
    }

    pub fn add_embargo(&mut self, player: PlayerId, other: PlayerId) {
        if let Some(p) = self.player_mut(player) {
            p.add_embargo(other);
        }
    }

    pub fn stop_embargo(&mut self, player: PlayerId, other: PlayerId) {
        if let Some(p) = self.player_mut(player) {
            p.stop_embargo(other);
        }
    }

    pub fn create_alliance(&mut self, a: PlayerId, b: PlayerId) {
        if a == b || self.player(a).is_none() || self.player(b).is_none() {
            return;
        }
        if let Some(p) = self.player_mut(a) {
            p.add_ally(b);
        }
        if let Some(p) = self.player_mut(b) {
            p.add_ally(a);
        }
    }

    pub fn break_alliance(&mut self, a: PlayerId, b: PlayerId) {
        if let Some(p) = self.player_mut(a) {
            p.remove_ally(b);
        }
        if let Some(p) = self.player_mut(b) {
            p.remove_ally(a);
        }
    }

    pub fn deliver_alliance_request(&mut self, from: PlayerId, to: PlayerId) {
        if let Some(p) = self.player_mut(to) {
            p.receive_alliance_request(from);
        }
    }

    pub fn accept_alliance_request(&mut self, recipient: PlayerId, from: PlayerId) {
        let pending = self
            .player(recipient)
            .map(|p| p.alliance_requests().contains(&from))
            .unwrap_or(false);
        if pending {
            self.create_alliance(recipient, from);
        }
    }

    pub fn reject_alliance_request(&mut self, recipient: PlayerId, from: PlayerId) {
        if let Some(p) = self.player_mut(recipient) {
            p.drop_alliance_request(from);
        }
    }

    // ---- attacks -------------------------------------------------------

    pub fn incoming_attacks(&self, player: PlayerId) -> Vec<&ActiveAttack> {
        self.attacks
            .iter()
            .filter(|attack| attack.target == Some(player))
            .collect()
    }

    pub fn register_attack(&mut self, attack: ActiveAttack) {
        self.attacks.push(attack);
    }

    pub(crate) fn attacks_mut(&mut self) -> &mut Vec<ActiveAttack> {
        &mut self.attacks
    }

    // ---- outboxes ------------------------------------------------------

    fn log(&mut self, payload: ActionPayload) {
        self.action_log.push(ActionRecord {
            tick: self.tick,
            payload,
        });
    }

    /// Queues a request for a sibling execution.
    pub fn submit(&mut self, request: ExecutionRequest) {
        self.log(ActionPayload::Request(request.clone()));
        self.requests.push(request);
    }

    pub fn take_requests(&mut self) -> Vec<ExecutionRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn pending_requests(&self) -> &[ExecutionRequest] {
        &self.requests
    }

    pub fn display_message(&mut self, kind: MessageKind, text: String, player: Option<PlayerId>) {
        let signal = GameSignal::Message { kind, text, player };
        self.log(ActionPayload::Signal(signal.clone()));
        self.signals.push(signal);
    }

    pub fn send_emoji(&mut self, from: PlayerId, to: EmojiTarget, emoji: &str) {
        let signal = GameSignal::Emoji {
            from,
            to,
            emoji: emoji.to_string(),
        };
        self.log(ActionPayload::Signal(signal.clone()));
        self.signals.push(signal);
    }

    pub fn signals(&self) -> &[GameSignal] {
        &self.signals
    }

    pub fn action_log(&self) -> &[ActionRecord] {
        &self.action_log
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn record_intercept(&mut self, player: PlayerId, kind: UnitKind, count: u32) {
        *self
            .stats
            .intercepts
            .entry(player)
            .or_default()
            .entry(kind)
            .or_insert(0) += count;
    }

    pub fn record_sam_launch(&mut self, player: PlayerId) {
        *self.stats.sam_launches.entry(player).or_insert(0) += 1;
    }

    pub(crate) fn record_nuke_launch(&mut self, player: PlayerId, kind: UnitKind) {
        *self.stats.nukes_launched.entry(player).or_insert(0) += 1;
        if kind == UnitKind::Mirv {
            self.stats.last_mirv_launch.insert(player, self.tick);
        }
    }

    pub(crate) fn record_detonation(&mut self) {
        self.stats.detonations += 1;
    }

    // ---- end of game ---------------------------------------------------

    pub fn winner(&self) -> Option<&WinnerRecord> {
        self.winner.as_ref()
    }

    /// Records the first winner; later calls are ignored.
    pub fn set_winner(&mut self, winner: WinnerRecord) -> bool {
        if self.winner.is_some() {
            return false;
        }
        self.log(ActionPayload::Winner(winner.clone()));
        self.winner = Some(winner);
        true
    }

    pub fn peace_vote(&self) -> Option<&PeaceVote> {
        self.peace_vote.as_ref()
    }

    pub(crate) fn set_peace_vote(&mut self, vote: Option<PeaceVote>) {
        self.peace_vote = vote;
    }

    /// Approves the active vote on behalf of `player`. Only members may vote.
    pub fn cast_peace_vote(&mut self, player: PlayerId) -> bool {
        match self.peace_vote.as_mut() {
            Some(vote) if vote.members.contains(&player) => vote.approvals.insert(player),
            _ => false,
        }
    }
}
