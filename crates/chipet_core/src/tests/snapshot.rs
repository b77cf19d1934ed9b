//! Tests for swarm snapshots
//!
//! These tests verify that:
//! - Saving and loading preserves every swarm field, including NaN fitness
//!   and infinite bests
//! - A swarm resumed from a snapshot continues exactly as the original would

use tempfile::tempdir;

use crate::parameter::{Bounds, FormatRule, Generator, ParameterSpec};
use crate::snapshot::SwarmSnapshot;
use crate::swarm::{ParticleSwarm, SwarmConfig};

fn config() -> SwarmConfig {
    SwarmConfig {
        best_floor: f64::NEG_INFINITY,
        rng_seed: Some(5),
        ..Default::default()
    }
}

fn swarm() -> ParticleSwarm {
    let specs = vec![
        ParameterSpec::new("a", FormatRule::parse("a{:.3f}").unwrap()).with_generator(
            Generator::UniformRandom {
                bounds: Bounds::new(-1.0, 1.0),
            },
        ),
        ParameterSpec::new("n", FormatRule::parse("n{:d}").unwrap()).with_generator(
            Generator::UniformRandom {
                bounds: Bounds::new(1.0, 64.0),
            },
        ),
    ];
    let mut swarm = ParticleSwarm::new(specs, 5, config()).unwrap();
    swarm.seed().unwrap();
    swarm
}

fn step(swarm: &mut ParticleSwarm) {
    let fitness: Vec<f64> = (0..swarm.particle_count())
        .map(|i| {
            let p = swarm.position(i).unwrap();
            -(p[0] * p[0]) - (p[1] - 8.0).abs()
        })
        .collect();
    swarm.record_fitness(&fitness).unwrap();
    swarm.update_bests().unwrap();
    swarm.advance().unwrap();
}

#[test]
fn test_snapshot_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("swarm.json");

    let fresh = swarm();
    let before = fresh.snapshot().unwrap();
    // nothing evaluated yet: NaN fitness and -inf bests
    before.save(&path).unwrap();
    let loaded = SwarmSnapshot::load(&path).unwrap();

    assert_eq!(loaded.positions, before.positions);
    assert_eq!(loaded.velocities, before.velocities);
    assert_eq!(loaded.param_specs, before.param_specs);
    assert_eq!(loaded.saved_at, before.saved_at);
    assert_eq!(f64::from(loaded.global_best), f64::NEG_INFINITY);
    assert!(loaded.fitness.iter().all(|f| f64::from(*f).is_nan()));

    let restored = ParticleSwarm::restore(loaded, config()).unwrap();
    assert_eq!(restored.state().personal_best, vec![f64::NEG_INFINITY; 5]);
    assert_eq!(restored.rng_seed(), 5);
}

#[test]
fn test_resume_matches_uninterrupted_run() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("swarm.json");

    let mut original = swarm();
    for _ in 0..3 {
        step(&mut original);
    }
    original.snapshot().unwrap().save(&path).unwrap();

    let mut resumed = ParticleSwarm::restore(SwarmSnapshot::load(&path).unwrap(), config()).unwrap();
    for _ in 0..4 {
        step(&mut original);
        step(&mut resumed);
    }

    for i in 0..5 {
        assert_eq!(original.position(i).unwrap(), resumed.position(i).unwrap());
    }
    assert_eq!(original.state().velocities, resumed.state().velocities);
    assert_eq!(original.state().global_best, resumed.state().global_best);
    assert_eq!(resumed.state().generation, 7);
}
