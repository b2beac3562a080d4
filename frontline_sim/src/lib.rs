//! Deterministic decision core for Frontline's computer-controlled nations.
//!
//! Every participant runs the same executions over the same world and tick
//! stream, so all randomness is seeded and all iteration is ordered. A tick
//! is one pass of [`run_tick`]: executions, then the request resolver, then
//! the clock.

pub mod config;
pub mod execution;
pub mod fixed;
pub mod game;
pub mod hashing;
pub mod interception;
pub mod map;
pub mod mirv;
pub mod nation;
pub mod nation_structures;
pub mod nuke_targeting;
pub mod placement;
pub mod player;
pub mod rng;
pub mod sam;
pub mod sandbox;
pub mod scenario;
pub mod unit;
pub mod win_check;

use bevy::prelude::*;

pub use config::{load_game_config_from_env, GameConfig, GameConfigError};
pub use execution::{Execution, ExecutionError, ExecutionRunner, TickReport};
pub use game::{ActiveAttack, Game, GameStats, PeaceVote};
pub use map::{GameMap, Terrain};
pub use nation::NationExecution;
pub use rng::PseudoRandom;
pub use sam::{SamLauncherExecution, SamMissileExecution};
pub use scenario::{build_scenario, ScenarioSpec};
pub use win_check::WinCheckExecution;

/// Construct a Bevy [`App`] running the Frontline tick pipeline over `game`.
pub fn build_headless_app(game: Game, runner: ExecutionRunner) -> App {
    let mut app = App::new();

    app.insert_resource(game)
        .insert_resource(runner)
        .add_plugins(MinimalPlugins)
        .add_systems(
            Update,
            (
                execution::run_executions,
                sandbox::resolve_requests,
                execution::advance_tick,
            )
                .chain(),
        );

    app
}

/// Execute a single simulation tick.
///
/// Each call runs the chained systems configured in [`build_headless_app`]
/// (executions → request resolver → tick increment).
pub fn run_tick(app: &mut App) {
    app.update();
}
