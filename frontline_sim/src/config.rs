use std::{
    collections::BTreeMap,
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sim_schema::{Difficulty, GameMode, UnitKind};
use thiserror::Error;

use crate::fixed;

pub const BUILTIN_GAME_CONFIG: &str = include_str!("data/game_config.json");

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CostGrowth {
    /// `base` regardless of how many are owned.
    Flat,
    /// `base * (owned + 1)`.
    Linear,
    /// `base * 2^owned`.
    Doubling,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UnitCost {
    pub base: u64,
    pub growth: CostGrowth,
    pub max: u64,
}

impl UnitCost {
    pub fn for_owned(&self, owned: usize) -> u64 {
        let owned = owned as u64;
        let raw = match self.growth {
            CostGrowth::Flat => self.base,
            CostGrowth::Linear => self.base.saturating_mul(owned + 1),
            CostGrowth::Doubling => {
                let shift = owned.min(32) as u32;
                self.base.saturating_mul(1u64 << shift)
            }
        };
        raw.min(self.max)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NukeMagnitude {
    pub inner: u32,
    pub outer: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MirvCooldownModel {
    /// A launch blocks re-consideration for `cooldown_ticks`.
    #[default]
    FixedWindow,
    /// Re-consider only once no MIRV of this launcher is still in flight.
    NonePending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamConfig {
    pub range: u32,
    pub cooldown_ticks: u64,
    pub missile_speed: u32,
    pub hit_chance: f64,
    pub warhead_hit_chance: f64,
    pub mirv_search_radius: u32,
    pub mirv_protection_radius: u32,
}

impl Default for SamConfig {
    fn default() -> Self {
        Self {
            range: 70,
            cooldown_ticks: 75,
            missile_speed: 12,
            hit_chance: 0.75,
            warhead_hit_chance: 0.5,
            mirv_search_radius: 400,
            mirv_protection_radius: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirvConfig {
    pub cooldown_model: MirvCooldownModel,
    pub cooldown_ticks: u64,
    pub warhead_count: u32,
    pub warhead_spread: u32,
    pub proximity_falloff: f64,
}

impl Default for MirvConfig {
    fn default() -> Self {
        Self {
            cooldown_model: MirvCooldownModel::FixedWindow,
            cooldown_ticks: 600,
            warhead_count: 12,
            warhead_spread: 30,
            proximity_falloff: 400.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NationConfig {
    pub spawn_search_radius: i64,
    pub spawn_attempts: u32,
    pub embargo_malus: i32,
    pub heckle_cooldown_ticks: u64,
    pub nuke_dedup_window_ticks: u64,
    pub alliance_request_odds: u32,
    pub raid_odds_contested: u32,
    pub raid_odds_isolated: u32,
    pub boat_search_distance: i64,
    pub placement_samples: u32,
    pub port_range: u32,
}

impl Default for NationConfig {
    fn default() -> Self {
        Self {
            spawn_search_radius: 25,
            spawn_attempts: 50,
            embargo_malus: 20,
            heckle_cooldown_ticks: 300,
            nuke_dedup_window_ticks: 500,
            alliance_request_odds: 20,
            raid_odds_contested: 5,
            raid_odds_isolated: 10,
            boat_search_distance: 150,
            placement_samples: 40,
            port_range: 20,
        }
    }
}

/// Growth and combat rates used by the reference request resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub spawn_radius: u32,
    pub gold_per_tile: u64,
    pub troop_growth_ratio: f64,
    pub tiles_per_attack_tick: u32,
    pub troops_per_tile: u64,
    pub nuke_speed: u32,
    pub nuke_targetable_range: u32,
    pub silo_cooldown_ticks: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            spawn_radius: 4,
            gold_per_tile: 10,
            troop_growth_ratio: 0.01,
            tiles_per_attack_tick: 8,
            troops_per_tile: 200,
            nuke_speed: 6,
            nuke_targetable_range: 120,
            silo_cooldown_ticks: 75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub session_id: String,
    pub game_mode: GameMode,
    pub difficulty: Difficulty,
    pub spawn_phase_ticks: u64,
    pub win_check_interval: u64,
    pub win_threshold_pct: f64,
    pub peace_vote_duration_ticks: u64,
    pub mountain_elevation: u8,
    pub unit_costs: BTreeMap<UnitKind, UnitCost>,
    pub nukes: BTreeMap<UnitKind, NukeMagnitude>,
    pub sam: SamConfig,
    pub mirv: MirvConfig,
    pub nation: NationConfig,
    pub sandbox: SandboxConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        let cost = |base, growth, max| UnitCost { base, growth, max };
        let unit_costs = BTreeMap::from([
            (UnitKind::City, cost(125_000, CostGrowth::Doubling, 1_000_000)),
            (UnitKind::Port, cost(125_000, CostGrowth::Doubling, 1_000_000)),
            (UnitKind::Factory, cost(125_000, CostGrowth::Doubling, 1_000_000)),
            (UnitKind::DefensePost, cost(50_000, CostGrowth::Linear, 250_000)),
            (UnitKind::MissileSilo, cost(1_000_000, CostGrowth::Flat, 1_000_000)),
            (UnitKind::SamLauncher, cost(1_500_000, CostGrowth::Linear, 3_000_000)),
            (UnitKind::Warship, cost(250_000, CostGrowth::Linear, 1_000_000)),
            (UnitKind::AtomBomb, cost(750_000, CostGrowth::Flat, 750_000)),
            (UnitKind::HydrogenBomb, cost(5_000_000, CostGrowth::Flat, 5_000_000)),
            (UnitKind::Mirv, cost(35_000_000, CostGrowth::Flat, 35_000_000)),
        ]);
        let nukes = BTreeMap::from([
            (UnitKind::AtomBomb, NukeMagnitude { inner: 12, outer: 30 }),
            (UnitKind::HydrogenBomb, NukeMagnitude { inner: 80, outer: 100 }),
            (UnitKind::MirvWarhead, NukeMagnitude { inner: 12, outer: 18 }),
        ]);
        Self {
            session_id: "local".to_string(),
            game_mode: GameMode::FreeForAll,
            difficulty: Difficulty::Medium,
            spawn_phase_ticks: 100,
            win_check_interval: 10,
            win_threshold_pct: 80.0,
            peace_vote_duration_ticks: 600,
            mountain_elevation: 200,
            unit_costs,
            nukes,
            sam: SamConfig::default(),
            mirv: MirvConfig::default(),
            nation: NationConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GameConfigError {
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read game config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GameConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_GAME_CONFIG).expect("builtin game config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, GameConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, GameConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| GameConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        GameConfig::from_json_str(&contents)
    }

    /// Cost of the next unit of `kind` for a player already owning `owned`.
    /// Kinds without a cost rule cannot be bought.
    pub fn unit_cost(&self, kind: UnitKind, owned: usize) -> Option<u64> {
        self.unit_costs.get(&kind).map(|cost| cost.for_owned(owned))
    }

    pub fn nuke_magnitude(&self, kind: UnitKind) -> NukeMagnitude {
        self.nukes
            .get(&kind)
            .copied()
            .unwrap_or(NukeMagnitude { inner: 0, outer: 0 })
    }

    /// Largest outer blast radius of any configured weapon.
    pub fn heaviest_outer_radius(&self) -> u32 {
        self.nukes
            .values()
            .map(|magnitude| magnitude.outer)
            .max()
            .unwrap_or(0)
    }

    pub fn win_threshold_ratio(&self) -> f64 {
        self.win_threshold_pct / 100.0
    }

    /// Population cap of a nation with `tiles` territory and `cities` city levels.
    pub fn max_troops(&self, tiles: usize, cities: u32) -> u64 {
        let territory = fixed::pow_ratio(tiles as u64, 3, 5) * 1_000 + 50_000;
        2 * territory + u64::from(cities) * 250_000
    }
}

/// Reads `FRONTLINE_CONFIG_PATH` when set, falling back to the builtin config.
pub fn load_game_config_from_env() -> GameConfig {
    if let Some(path) = env::var("FRONTLINE_CONFIG_PATH").ok().map(PathBuf::from) {
        match GameConfig::from_file(&path) {
            Ok(config) => return config,
            Err(err) => {
                tracing::warn!(
                    target: "frontline::config",
                    path = %path.display(),
                    error = %err,
                    "game_config.load_failed"
                );
            }
        }
    }
    GameConfig::builtin()
}
