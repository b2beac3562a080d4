use std::{env, fs, path::PathBuf};

use tracing::{info, warn};

use frontline_sim::{
    build_headless_app, build_scenario, load_game_config_from_env, run_tick, ExecutionRunner,
    Game, ScenarioSpec,
};
use sim_schema::{encode_action_log_json, hash_action_log};

const DEFAULT_TICKS: u64 = 3_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let ticks = match args.next().map(|raw| raw.parse::<u64>()) {
        Some(Ok(ticks)) => ticks,
        Some(Err(err)) => {
            warn!(target: "frontline::runner", error = %err, "simulate.bad_tick_count");
            DEFAULT_TICKS
        }
        None => DEFAULT_TICKS,
    };
    let log_path = args.next().map(PathBuf::from);

    let config = load_game_config_from_env();
    let spec = ScenarioSpec::default();
    let (game, runner) = build_scenario(config, &spec);
    let mut app = build_headless_app(game, runner);

    for _ in 0..ticks {
        run_tick(&mut app);
        if app.world.resource::<Game>().winner().is_some() {
            break;
        }
    }

    let game = app.world.resource::<Game>();
    let runner = app.world.resource::<ExecutionRunner>();
    let stats = game.stats();
    info!(
        target: "frontline::runner",
        tick = game.ticks(),
        executions = runner.active_count(),
        alive = game.active_players().count(),
        nukes = stats.nukes_launched.values().sum::<u32>(),
        detonations = stats.detonations,
        sam_launches = stats.sam_launches.values().sum::<u32>(),
        winner = ?game.winner(),
        action_log_hash = hash_action_log(game.action_log()),
        "simulate.finished"
    );

    if let Some(path) = log_path {
        match encode_action_log_json(game.action_log()) {
            Ok(json) => {
                if let Err(err) = fs::write(&path, json) {
                    warn!(
                        target: "frontline::runner",
                        path = %path.display(),
                        error = %err,
                        "simulate.log_write_failed"
                    );
                }
            }
            Err(err) => {
                warn!(target: "frontline::runner", error = %err, "simulate.log_encode_failed")
            }
        }
    }
}
