use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sim_schema::{PlayerId, PlayerKind, Relation, Team, TileRef};

/// Vassal link: the overlord lends `support_ratio` of its troops to the vassal's defence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overlord {
    pub player: PlayerId,
    pub support_ratio: f64,
}

/// A nation in the world store. Fields are private so every change goes
/// through a mutation method; cross references are plain ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    id: PlayerId,
    name: String,
    kind: PlayerKind,
    team: Option<Team>,
    alive: bool,
    spawned: bool,
    gold: u64,
    troops: u64,
    tiles: BTreeSet<TileRef>,
    border: BTreeSet<TileRef>,
    relations: BTreeMap<PlayerId, i32>,
    allies: BTreeSet<PlayerId>,
    embargoes: BTreeSet<PlayerId>,
    overlord: Option<Overlord>,
    alliance_requests: BTreeSet<PlayerId>,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String, kind: PlayerKind, team: Option<Team>) -> Self {
        Self {
            id,
            name,
            kind,
            team,
            alive: true,
            spawned: false,
            gold: 0,
            troops: 0,
            tiles: BTreeSet::new(),
            border: BTreeSet::new(),
            relations: BTreeMap::new(),
            allies: BTreeSet::new(),
            embargoes: BTreeSet::new(),
            overlord: None,
            alliance_requests: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PlayerKind {
        self.kind
    }

    pub fn team(&self) -> Option<Team> {
        self.team
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn has_spawned(&self) -> bool {
        self.spawned
    }

    pub fn gold(&self) -> u64 {
        self.gold
    }

    pub fn troops(&self) -> u64 {
        self.troops
    }

    pub fn tiles(&self) -> &BTreeSet<TileRef> {
        &self.tiles
    }

    pub fn num_tiles_owned(&self) -> usize {
        self.tiles.len()
    }

    /// Owned tiles adjacent to a tile with a different owner (including ocean).
    pub fn border_tiles(&self) -> &BTreeSet<TileRef> {
        &self.border
    }

    pub fn relation_score(&self, other: PlayerId) -> i32 {
        self.relations.get(&other).copied().unwrap_or(0)
    }

    pub fn relation(&self, other: PlayerId) -> Relation {
        Relation::from_score(self.relation_score(other))
    }

    pub fn is_allied_with(&self, other: PlayerId) -> bool {
        self.allies.contains(&other)
    }

    pub fn allies(&self) -> &BTreeSet<PlayerId> {
        &self.allies
    }

    pub fn is_on_same_team(&self, other: &Player) -> bool {
        self.id != other.id && self.team.is_some() && self.team == other.team
    }

    pub fn is_friendly(&self, other: &Player) -> bool {
        self.is_allied_with(other.id) || self.is_on_same_team(other)
    }

    pub fn has_embargo_against(&self, other: PlayerId) -> bool {
        self.embargoes.contains(&other)
    }

    pub fn overlord(&self) -> Option<Overlord> {
        self.overlord
    }

    pub fn alliance_requests(&self) -> &BTreeSet<PlayerId> {
        &self.alliance_requests
    }

    pub(crate) fn mark_spawned(&mut self) {
        self.spawned = true;
    }

    pub(crate) fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn add_gold(&mut self, amount: u64) {
        self.gold = self.gold.saturating_add(amount);
    }

    /// Deducts `amount` if affordable.
    pub fn spend_gold(&mut self, amount: u64) -> bool {
        if self.gold < amount {
            return false;
        }
        self.gold -= amount;
        true
    }

    pub fn add_troops(&mut self, amount: u64) {
        self.troops = self.troops.saturating_add(amount);
    }

    /// Removes up to `amount` troops and returns how many were removed.
    pub fn remove_troops(&mut self, amount: u64) -> u64 {
        let removed = amount.min(self.troops);
        self.troops -= removed;
        removed
    }

    pub fn update_relation(&mut self, other: PlayerId, delta: i32) {
        if other == self.id {
            return;
        }
        let score = self.relations.entry(other).or_insert(0);
        *score = (*score + delta).clamp(-100, 100);
    }

    pub fn add_embargo(&mut self, other: PlayerId) {
        if other != self.id {
            self.embargoes.insert(other);
        }
    }

    pub fn stop_embargo(&mut self, other: PlayerId) {
        self.embargoes.remove(&other);
    }

    pub fn set_overlord(&mut self, overlord: Option<Overlord>) {
        self.overlord = overlord;
    }

    pub(crate) fn add_ally(&mut self, other: PlayerId) {
        self.allies.insert(other);
        self.alliance_requests.remove(&other);
    }

    pub(crate) fn remove_ally(&mut self, other: PlayerId) {
        self.allies.remove(&other);
    }

    pub(crate) fn receive_alliance_request(&mut self, from: PlayerId) {
        if from != self.id && !self.allies.contains(&from) {
            self.alliance_requests.insert(from);
        }
    }

    pub(crate) fn drop_alliance_request(&mut self, from: PlayerId) {
        self.alliance_requests.remove(&from);
    }

    pub(crate) fn insert_tile(&mut self, tile: TileRef) {
        self.tiles.insert(tile);
    }

    pub(crate) fn remove_tile(&mut self, tile: TileRef) {
        self.tiles.remove(&tile);
        self.border.remove(&tile);
    }

    pub(crate) fn set_border(&mut self, tile: TileRef, is_border: bool) {
        if is_border {
            self.border.insert(tile);
        } else {
            self.border.remove(&tile);
        }
    }
}
