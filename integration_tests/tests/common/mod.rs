#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use bevy::prelude::App;
use frontline_sim::{
    build_headless_app, build_scenario, load_game_config_from_env, run_tick, Game, GameConfig,
    ScenarioSpec,
};
use sim_schema::PlayerId;

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_game_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test game config at {}",
            config_path.display()
        );

        std::env::set_var("FRONTLINE_CONFIG_PATH", &config_path);
    });
}

pub fn test_config() -> GameConfig {
    ensure_test_config();
    load_game_config_from_env()
}

/// Fixture config with the spawn phase disabled, for hand-built worlds.
pub fn immediate_config() -> GameConfig {
    GameConfig {
        spawn_phase_ticks: 0,
        ..test_config()
    }
}

pub fn scenario_app(session: &str, spec: &ScenarioSpec) -> App {
    let config = GameConfig {
        session_id: session.to_string(),
        ..test_config()
    };
    let (game, runner) = build_scenario(config, spec);
    build_headless_app(game, runner)
}

pub fn run_ticks(app: &mut App, ticks: u64) {
    for _ in 0..ticks {
        run_tick(app);
    }
}

pub fn claim_rect(game: &mut Game, player: PlayerId, x0: i64, y0: i64, x1: i64, y1: i64) {
    for y in y0..=y1 {
        for x in x0..=x1 {
            if let Some(tile) = game.map().ref_at(x, y) {
                game.conquer(player, tile);
            }
        }
    }
}
