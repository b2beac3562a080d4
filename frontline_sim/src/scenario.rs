//! Procedural starting worlds for the headless runner, benches and
//! cross-module tests.

use sim_schema::{ExecutionRequest, GameMode, PlayerKind, Team, TileRef};

use crate::{
    config::GameConfig,
    execution::ExecutionRunner,
    game::Game,
    hashing::stable_hash,
    map::{GameMap, Terrain},
    nation::NationExecution,
    win_check::WinCheckExecution,
};

const OCEAN_MARGIN: u32 = 6;
const ELEVATION_CELL: u32 = 8;
const TEAM_COUNT: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSpec {
    pub width: u32,
    pub height: u32,
    pub nations: u16,
    pub humans: u16,
}

impl Default for ScenarioSpec {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            nations: 6,
            humans: 1,
        }
    }
}

/// Continent surrounded by ocean, split by a strait down the middle so some
/// neighbours are only reachable by sea. Elevation is coarse hashed noise.
pub fn continent_map(width: u32, height: u32, seed: u64) -> GameMap {
    let strait = width / 2;
    GameMap::from_fn(width, height, |x, y| {
        let margin = x < OCEAN_MARGIN
            || y < OCEAN_MARGIN
            || x + OCEAN_MARGIN >= width
            || y + OCEAN_MARGIN >= height;
        let in_strait = x.abs_diff(strait) <= 2 && y > height / 5 && y < height - height / 5;
        if margin || in_strait {
            return (Terrain::Ocean, 0);
        }
        let mut key = seed.to_le_bytes().to_vec();
        key.extend_from_slice(&(x / ELEVATION_CELL).to_le_bytes());
        key.extend_from_slice(&(y / ELEVATION_CELL).to_le_bytes());
        (Terrain::Land, (stable_hash(&key) % 230) as u8)
    })
}

/// Spawn cells spread over a grid covering the map, snapped to land.
pub fn spawn_cells(map: &GameMap, count: usize) -> Vec<TileRef> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f64).sqrt().ceil() as u32;
    let rows = (count as u32).div_ceil(cols);
    let land: Vec<TileRef> = (0..map.tile_count() as u32)
        .map(TileRef)
        .filter(|&tile| map.is_land(tile))
        .collect();
    (0..count as u32)
        .filter_map(|i| {
            let x = (2 * (i % cols) + 1) * map.width() / (2 * cols);
            let y = (2 * (i / cols) + 1) * map.height() / (2 * rows);
            let cell = map.ref_at(i64::from(x), i64::from(y))?;
            if map.is_land(cell) {
                Some(cell)
            } else {
                map.closest_tile(land.iter().copied(), cell).map(|(tile, _)| tile)
            }
        })
        .collect()
}

/// Builds a world with one controller per nation and a win check. Humans
/// get no controller; their spawn is queued as a request.
pub fn build_scenario(config: GameConfig, spec: &ScenarioSpec) -> (Game, ExecutionRunner) {
    let seed = stable_hash(config.session_id.as_bytes());
    let map = continent_map(spec.width, spec.height, seed);
    let total = usize::from(spec.nations) + usize::from(spec.humans);
    let cells = spawn_cells(&map, total);
    let mut game = Game::new(config, map);
    let mut runner = ExecutionRunner::new();
    runner.spawn(WinCheckExecution::new());

    let team_mode = game.config.game_mode == GameMode::Team;
    for (index, &cell) in cells.iter().enumerate() {
        let team = team_mode.then(|| Team::Numbered(index as u16 % TEAM_COUNT));
        if index < usize::from(spec.nations) {
            let id = game.add_player(&format!("Nation {index}"), PlayerKind::Nation, team);
            runner.spawn(NationExecution::new(id, cell, &game.config));
        } else {
            let id = game.add_player(&format!("Player {index}"), PlayerKind::Human, team);
            game.submit(ExecutionRequest::Spawn {
                player: id,
                tile: cell,
            });
        }
    }
    tracing::info!(
        target: "frontline::sandbox",
        width = spec.width,
        height = spec.height,
        nations = spec.nations,
        humans = spec.humans,
        "scenario.built"
    );
    (game, runner)
}
