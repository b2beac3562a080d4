use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use frontline_sim::{
    build_headless_app, build_scenario, placement::structure_tile_value, run_tick, GameConfig,
    ScenarioSpec,
};
use sim_schema::{PlayerId, UnitKind};

fn warmed_scenario(nations: u16) -> bevy::prelude::App {
    let config = GameConfig {
        session_id: "bench".to_string(),
        spawn_phase_ticks: 20,
        ..GameConfig::default()
    };
    let spec = ScenarioSpec {
        width: 200,
        height: 200,
        nations,
        humans: 0,
    };
    let (game, runner) = build_scenario(config, &spec);
    let mut app = build_headless_app(game, runner);
    for _ in 0..200 {
        run_tick(&mut app);
    }
    app
}

fn bench_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("nation_ticks");

    for nations in [2u16, 6, 12] {
        group.bench_with_input(BenchmarkId::new("nations", nations), &nations, |b, &n| {
            b.iter_batched(
                || warmed_scenario(n),
                |mut app| {
                    for _ in 0..80 {
                        run_tick(&mut app);
                    }
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_placement(c: &mut Criterion) {
    let app = warmed_scenario(6);
    let game = app.world.resource::<frontline_sim::Game>();
    let player = PlayerId(0);
    let tiles: Vec<_> = game
        .player(player)
        .map(|p| p.tiles().iter().copied().take(64).collect())
        .unwrap_or_default();

    let mut group = c.benchmark_group("placement");
    for kind in [UnitKind::City, UnitKind::SamLauncher, UnitKind::DefensePost] {
        group.bench_with_input(BenchmarkId::new("score_64", kind), &kind, |b, &kind| {
            b.iter(|| {
                let value = structure_tile_value(game, player, kind);
                tiles.iter().map(|&tile| value(tile)).sum::<f64>()
            })
        });
    }
    group.finish();
}

criterion_group!(nation_benches, bench_ticks, bench_placement);
criterion_main!(nation_benches);
