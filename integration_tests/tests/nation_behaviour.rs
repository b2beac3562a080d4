mod common;

use std::collections::BTreeMap;

use frontline_sim::{
    build_headless_app,
    nation_structures::{urgency_from_signals, PressureSignals, StructureCategory},
    nuke_targeting::{maybe_send_nuke, StrikeLog},
    placement::structure_tile_value,
    run_tick, ExecutionRunner, Game, GameMap, PseudoRandom, ScenarioSpec,
};
use sim_schema::{PlayerKind, TileRef, UnitKind};

#[test]
fn ground_urgency_never_drops_with_more_incoming_attacks() {
    let mut rng = PseudoRandom::new(11);
    for _ in 0..200 {
        let max_troops = rng.next_int(50_000, 2_000_000) as u64;
        let base = PressureSignals {
            incoming_attacks: 0,
            outmatched_on_border: rng.coin(),
            enemy_silos: rng.next_int(0, 4) as usize,
            enemy_warships: rng.next_int(0, 4) as usize,
            own_silos: rng.next_int(0, 3) as usize,
            own_warships: rng.next_int(0, 3) as usize,
            troops: rng.next_int(0, max_troops as i64) as u64,
            max_troops,
            tiles: rng.next_int(1, 20_000) as usize,
            city_levels: rng.next_int(0, 10) as u32,
            ports: rng.next_int(0, 5) as usize,
            factories: rng.next_int(0, 5) as usize,
            coastal: rng.coin(),
        };
        let mut previous = 0;
        for attacks in 0..6 {
            let signals = PressureSignals {
                incoming_attacks: attacks,
                ..base.clone()
            };
            let ground = urgency_from_signals(&signals).get(StructureCategory::GroundDefense);
            assert!(ground >= previous, "{signals:?}");
            previous = ground;
        }
    }
}

#[test]
fn sam_sites_covering_a_structure_always_outscore_uncovered_ones() {
    let mut rng = PseudoRandom::new(3);
    for _ in 0..20 {
        let mut covered = Game::new(common::immediate_config(), GameMap::plains(300, 300));
        let me = covered.add_player("me", PlayerKind::Nation, None);
        common::claim_rect(&mut covered, me, 0, 0, 299, 299);
        let mut uncovered = covered.clone();

        let site = covered
            .map()
            .ref_at(rng.next_int(100, 200), rng.next_int(100, 200))
            .expect("tile");
        let near = covered
            .map()
            .ref_at(
                i64::from(covered.map().x(site)) + rng.next_int(-40, 41),
                i64::from(covered.map().y(site)) + rng.next_int(-40, 41),
            )
            .expect("tile");
        let far = uncovered
            .map()
            .ref_at(
                i64::from(covered.map().x(site)) + rng.next_int(-100, -90),
                i64::from(covered.map().y(site)) + rng.next_int(-100, -90),
            )
            .expect("tile");
        let kind = *rng
            .rand_element(&[UnitKind::City, UnitKind::Port, UnitKind::Factory, UnitKind::MissileSilo])
            .expect("kind");
        covered.place_structure(me, kind, near);
        uncovered.place_structure(me, kind, far);

        let with_cover = structure_tile_value(&covered, me, UnitKind::SamLauncher)(site);
        let without = structure_tile_value(&uncovered, me, UnitKind::SamLauncher)(site);
        assert!(with_cover > without, "{kind}: {with_cover} <= {without}");
    }
}

#[test]
fn struck_tiles_are_not_struck_again_within_the_window() {
    let mut game = Game::new(common::immediate_config(), GameMap::plains(400, 200));
    let me = game.add_player("me", PlayerKind::Nation, None);
    let enemy = game.add_player("enemy", PlayerKind::Nation, None);
    common::claim_rect(&mut game, me, 0, 0, 99, 199);
    common::claim_rect(&mut game, enemy, 100, 0, 399, 199);
    for y in [40, 100, 160] {
        let silo = game.map().ref_at(50, y).expect("tile");
        game.place_structure(me, UnitKind::MissileSilo, silo);
    }
    for (x, y) in [(250, 60), (300, 100), (250, 140), (350, 60), (350, 140)] {
        let city = game.map().ref_at(x, y).expect("tile");
        game.place_structure(enemy, UnitKind::City, city);
    }
    game.player_mut(me).expect("me").add_gold(200_000_000);

    let mut app = build_headless_app(game, ExecutionRunner::new());
    let mut rng = PseudoRandom::new(77);
    let mut strikes = StrikeLog::default();
    let mut struck: BTreeMap<TileRef, u64> = BTreeMap::new();
    let mut launches = 0;
    for _ in 0..700 {
        {
            let mut game = app.world.resource_mut::<Game>();
            let now = game.ticks();
            if let Some(tile) = maybe_send_nuke(&mut game, me, enemy, &mut rng, &mut strikes) {
                if let Some(&previous) = struck.get(&tile) {
                    assert!(now > previous + 500, "{tile} struck at {previous} and {now}");
                }
                struck.insert(tile, now);
                launches += 1;
            }
        }
        run_tick(&mut app);
    }
    assert!(launches >= 2, "only {launches} strikes");
}

#[test]
fn long_scenario_runs_without_fatal_errors() {
    let spec = ScenarioSpec {
        width: 200,
        height: 200,
        nations: 8,
        humans: 0,
    };
    let mut app = common::scenario_app("long-run", &spec);
    let mut fatal = 0;
    for _ in 0..1_500 {
        run_tick(&mut app);
        fatal += app
            .world
            .resource::<ExecutionRunner>()
            .last_report()
            .fatal
            .len();
    }
    assert_eq!(fatal, 0);
    let game = app.world.resource::<Game>();
    let alive = game.active_players().count();
    assert!(alive >= 1);
    let largest = game
        .active_players()
        .map(|p| p.num_tiles_owned())
        .max()
        .unwrap_or(0);
    assert!(largest > 200, "nations never expanded");
}
