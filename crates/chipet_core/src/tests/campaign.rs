//! Tests for the generation loop through real directories
//!
//! These tests verify that:
//! - Each generation gets its own directory, database and one simulation
//!   directory per particle
//! - Evaluation sees the directories the campaign created
//! - A snapshot is written after every generation
//! - A generation whose evaluation failed can be run again

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::campaign::{Campaign, generation_dir};
use crate::directory::{DirectoryBuilder, NamingPolicy, database_path, read_database};
use crate::error::EvaluationError;
use crate::fitness::FitnessEvaluator;
use crate::parameter::{Bounds, FormatRule, Generator, ParameterSpec};
use crate::snapshot::SwarmSnapshot;
use crate::swarm::{SwarmConfig, SwarmPhase};

/// Scores particles after checking their directory exists
struct ExistingDirs;

impl FitnessEvaluator for ExistingDirs {
    fn evaluate(&mut self, sim_dir: &Path, position: &[f64]) -> Result<f64, EvaluationError> {
        assert!(sim_dir.join("s0").is_dir(), "{} missing", sim_dir.display());
        Ok(1.0 + position[0])
    }
}

fn campaign(particles: usize) -> Campaign {
    let specs = vec![
        ParameterSpec::new("kd", FormatRule::parse("kd{:.8f}").unwrap()).with_generator(
            Generator::UniformRandom {
                bounds: Bounds::new(0.0, 1.0),
            },
        ),
        ParameterSpec::new("ks", FormatRule::parse("ks{:.8f}").unwrap()).with_generator(
            Generator::UniformRandom {
                bounds: Bounds::new(10.0, 20.0),
            },
        ),
    ];
    Campaign::new(specs, DirectoryBuilder::new(NamingPolicy::ContentAddressed))
        .unwrap()
        .with_particle_count(particles)
        .with_swarm_config(SwarmConfig {
            rng_seed: Some(99),
            ..Default::default()
        })
}

#[test]
fn test_run_creates_generation_directories() {
    let dir = tempdir().unwrap();
    let snapshot_path = dir.path().join("swarm.json");
    let mut campaign = campaign(3);

    let summaries = campaign
        .run(dir.path(), 3, Some(snapshot_path.as_path()), &mut ExistingDirs)
        .unwrap();

    assert_eq!(summaries.len(), 3);
    for (generation, summary) in summaries.iter().enumerate() {
        assert_eq!(summary.generation, generation);
        let gen_dir = generation_dir(dir.path(), generation);
        assert_eq!(summary.dir, gen_dir);

        let rows = read_database(&database_path(&gen_dir, generation)).unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(gen_dir.join(&row.hash).is_dir());
        }
        assert!(summary.fitness.iter().all(|f| *f > 1.0));
    }
    assert!(summaries[0].improved);
    assert!(summaries.windows(2).all(|w| w[1].global_best >= w[0].global_best));

    let snapshot = SwarmSnapshot::load(&snapshot_path).unwrap();
    assert_eq!(snapshot.generation, 3);
    assert_eq!(snapshot.phase, SwarmPhase::Moved);
    assert!(fs::read_to_string(&snapshot_path).unwrap().contains("\"nan\""));
}

#[test]
fn test_failed_evaluation_can_be_retried() {
    struct Failing;
    impl FitnessEvaluator for Failing {
        fn evaluate(&mut self, sim_dir: &Path, _: &[f64]) -> Result<f64, EvaluationError> {
            Err(EvaluationError::MissingKey {
                path: sim_dir.join("data/fitness_final.yaml"),
                key: "short",
            })
        }
    }

    let dir = tempdir().unwrap();
    let mut campaign = campaign(2);
    assert!(campaign.run_generation(dir.path(), &mut Failing).is_err());
    let swarm = campaign.swarm().unwrap();
    assert_eq!(swarm.state().generation, 0);
    assert_eq!(swarm.state().phase, SwarmPhase::Seeded);

    // the retry reuses the directories of the failed attempt
    let summary = campaign.run_generation(dir.path(), &mut ExistingDirs).unwrap();
    assert_eq!(summary.generation, 0);
    let gen_dir = generation_dir(dir.path(), 0);
    assert_eq!(read_database(&database_path(&gen_dir, 0)).unwrap().len(), 2);
    assert_eq!(campaign.swarm().unwrap().state().generation, 1);
}
