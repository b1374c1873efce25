//! Whole-engine behaviour over many ticks.

use proptest::prelude::*;
use skywatch_core::{base, AgentMode, ConfigError, Engine, EventKind, SimConfig};

fn quiet_config() -> SimConfig {
    SimConfig {
        spawn_probability: 0.0,
        ..Default::default()
    }
}

fn run(engine: &mut Engine<skywatch_env::SeededEntropy>, ticks: usize) {
    for _ in 0..ticks {
        engine.tick();
    }
}

#[test]
fn test_tick_before_start_changes_nothing() {
    let mut engine = Engine::seeded(SimConfig::default()).unwrap();
    let fresh = engine.snapshot();

    for _ in 0..5 {
        assert!(!engine.tick());
    }
    assert_eq!(engine.snapshot(), fresh);

    engine.start();
    run(&mut engine, 3);
    assert_eq!(engine.time_ms(), 600);
    assert_eq!(engine.tick_count(), 3);
}

#[test]
fn test_stopped_engine_ignores_ticks() {
    let mut engine = Engine::seeded(SimConfig::default()).unwrap();
    engine.start();
    run(&mut engine, 10);
    engine.stop();

    let paused = engine.snapshot();
    run(&mut engine, 10);
    assert_eq!(engine.snapshot(), paused);
}

#[test]
fn test_reset_is_idempotent_and_matches_fresh() {
    let config = SimConfig {
        spawn_probability: 0.3,
        ..Default::default()
    };
    let fresh = Engine::seeded(config.clone()).unwrap().snapshot();

    let mut engine = Engine::seeded(config).unwrap();
    engine.start();
    run(&mut engine, 100);

    engine.reset();
    let once = engine.snapshot();
    engine.reset();
    let twice = engine.snapshot();

    assert_eq!(once, twice);
    assert_eq!(once, fresh);
    assert!(!engine.is_running());
}

#[test]
fn test_reset_replays_the_same_run() {
    let config = SimConfig {
        spawn_probability: 0.3,
        ..Default::default()
    };
    let mut engine = Engine::seeded(config).unwrap();

    engine.start();
    run(&mut engine, 150);
    let first = engine.snapshot();

    engine.reset();
    engine.start();
    run(&mut engine, 150);

    assert_eq!(engine.snapshot(), first);
}

#[test]
fn test_same_seed_same_run() {
    let config = SimConfig {
        seed: 7,
        spawn_probability: 0.5,
        ..Default::default()
    };
    let mut a = Engine::seeded(config.clone()).unwrap();
    let mut b = Engine::seeded(config).unwrap();
    a.start();
    b.start();
    run(&mut a, 200);
    run(&mut b, 200);

    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn test_different_seed_different_field() {
    let config = |seed| SimConfig {
        seed,
        spawn_probability: 0.5,
        ..Default::default()
    };
    let mut a = Engine::seeded(config(1)).unwrap();
    let mut b = Engine::seeded(config(2)).unwrap();
    a.start();
    b.start();
    run(&mut a, 50);
    run(&mut b, 50);

    assert_ne!(a.field().sources(), b.field().sources());
}

#[test]
fn test_exhausted_agents_are_never_flying_a_mission() {
    let config = SimConfig {
        energy_capacity_ms: 3_000,
        recharge_duration_ms: 2_000,
        spawn_probability: 0.2,
        ..Default::default()
    };
    let mut engine = Engine::seeded(config).unwrap();
    engine.start();

    for _ in 0..400 {
        engine.tick();
        for agent in engine.agents() {
            assert!(agent.energy_ms() >= 0);
            if agent.energy_ms() == 0 {
                assert!(
                    matches!(agent.mode(), AgentMode::Returning | AgentMode::Charging),
                    "agent {} has no energy but is {}",
                    agent.id(),
                    agent.mode()
                );
            }
        }
    }
}

#[test]
fn test_roaming_agent_detects_anomaly_at_base() {
    let config = SimConfig {
        num_agents: 1,
        ..quiet_config()
    };
    let mut engine = Engine::seeded(config).unwrap();
    engine.inject_anomaly(0.0, 0.0, 1.0);
    engine.start();
    engine.tick();

    let agent = engine.agent(0).unwrap();
    assert_eq!(agent.measurements().len(), 1);
    let reading = &agent.measurements()[0];
    assert_eq!(reading.timestamp_ms, 0);
    assert!((reading.intensity - 0.95).abs() <= 0.05 + 1e-9);

    let detections = engine
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Detection { .. }))
        .count();
    assert_eq!(detections, 1);
}

#[test]
fn test_first_tick_retasks_far_hotspot() {
    let mut engine = Engine::seeded(quiet_config()).unwrap();
    engine.inject_anomaly(40.0, 40.0, 1.0);
    engine.start();
    engine.tick();

    let retasks: Vec<usize> = engine
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Retasked {
                agent_id,
                hotspot_x,
                hotspot_y,
            } => {
                assert_eq!((hotspot_x, hotspot_y), (40, 40));
                Some(agent_id)
            }
            _ => None,
        })
        .collect();
    assert_eq!(retasks.len(), 1);

    let agent = engine.agent(retasks[0]).unwrap();
    let path: Vec<_> = agent.path().iter().copied().collect();
    assert_eq!(path, vec![nalgebra::Vector2::new(40.0, 40.0), base()]);
}

#[test]
fn test_retask_only_on_interval_ticks() {
    let mut engine = Engine::seeded(quiet_config()).unwrap();
    engine.start();
    engine.tick();

    // Appears after tick 0, so the next retask round is tick 30
    engine.inject_anomaly(40.0, 40.0, 1.0);
    run(&mut engine, 29);
    let retasked = |engine: &Engine<_>| {
        engine
            .events()
            .iter()
            .any(|e| matches!(e.kind, EventKind::Retasked { .. }))
    };
    assert!(!retasked(&engine));

    // 0.95^31 has fallen below the hotspot threshold, so keep it fed
    engine.inject_anomaly(40.0, 40.0, 1.0);
    engine.tick();
    assert!(retasked(&engine));
}

#[test]
fn test_history_sampled_every_five_seconds() {
    let mut engine = Engine::seeded(quiet_config()).unwrap();
    engine.start();
    run(&mut engine, 26);

    let times: Vec<u64> = engine.metrics().history().iter().map(|m| m.time_ms).collect();
    assert_eq!(times, vec![0, 5_000]);
}

#[test]
fn test_zero_agents_rejected() {
    let config = SimConfig {
        num_agents: 0,
        ..Default::default()
    };
    assert!(matches!(Engine::seeded(config), Err(ConfigError::NoAgents)));
}

#[test]
fn test_uploads_match_detections() {
    let config = SimConfig {
        num_agents: 1,
        energy_capacity_ms: 2_000,
        ..quiet_config()
    };
    let mut engine = Engine::seeded(config).unwrap();
    engine.inject_anomaly(0.0, 0.0, 1.0);
    engine.start();
    run(&mut engine, 40);

    let detections = engine
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Detection { .. }))
        .count();

    assert_eq!(engine.agent(0).unwrap().mode(), AgentMode::Charging);
    assert!(detections > 0);
    assert_eq!(engine.uploads().len(), detections);
    assert!(engine.agent(0).unwrap().measurements().is_empty());
    assert!(engine.uploads().iter().all(|u| u.agent_id == 0));
}

#[test]
fn test_sensing_hold_blocks_detection_and_resumes() {
    let config = SimConfig {
        num_agents: 1,
        measurement_duration_ms: 1_000,
        ..quiet_config()
    };
    let mut engine = Engine::seeded(config).unwrap();
    engine.start();
    engine.tick();

    assert!(engine.trigger_sensing(0));
    let held_at = engine.agent(0).unwrap().position();
    run(&mut engine, 4);
    assert_eq!(engine.agent(0).unwrap().mode(), AgentMode::Sensing);
    assert_eq!(engine.agent(0).unwrap().position(), held_at);

    engine.tick();
    assert_eq!(engine.agent(0).unwrap().mode(), AgentMode::Roaming);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn test_grid_stays_normalised(seed in any::<u64>()) {
        let config = SimConfig {
            seed,
            grid_width: 20,
            grid_height: 20,
            num_agents: 4,
            spawn_probability: 0.4,
            ..Default::default()
        };
        let mut engine = Engine::seeded(config).unwrap();
        engine.start();

        for _ in 0..150 {
            engine.tick();
            let grid = engine.grid();
            prop_assert!(grid.cells.iter().all(|&v| (0.0..=1.0).contains(&v)));

            let metrics = engine.metrics().current();
            prop_assert!((0.0..=1.0).contains(&metrics.field_area_above_threshold));
            prop_assert!((0.0..=1.0).contains(&metrics.agent_coverage_fraction));
        }
    }
}
