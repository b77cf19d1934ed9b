//! Subcommand implementations

use std::path::{Path, PathBuf};

use chipet_core::scan::{is_error, is_running, runnable, seed_directories};
use chipet_core::{CampaignConfig, SwarmSnapshot};
use color_eyre::eyre::Context;
use tracing::{info, warn};

use crate::bias::load_bias;

pub const SNAPSHOT_FILE: &str = "swarm.json";

fn load_config(path: &Path) -> color_eyre::Result<CampaignConfig> {
    CampaignConfig::load(path).wrap_err_with(|| format!("failed to load campaign {}", path.display()))
}

/// Materialize a sweep (every combination) or a shotgun (one per particle)
pub fn create(config_path: &Path, run_dir: &Path, shotgun: bool) -> color_eyre::Result<()> {
    let config = load_config(config_path)?;
    let mut campaign = config.into_campaign()?;
    let created = if shotgun {
        campaign.create_shotgun(run_dir)?
    } else {
        campaign.create_sweep(run_dir)?
    };
    info!("created {} simulation directories", created.len());
    println!("{} simulation directories in {}", created.len(), run_dir.display());
    Ok(())
}

pub struct OptimizeOptions {
    pub generations: usize,
    pub resume: bool,
    pub snapshot: Option<PathBuf>,
    pub bias: Option<PathBuf>,
    pub mock: bool,
}

pub fn optimize(
    config_path: &Path,
    run_dir: &Path,
    options: &OptimizeOptions,
) -> color_eyre::Result<()> {
    let mut config = load_config(config_path)?;
    if options.mock {
        config.fitness.mock = true;
    }
    let mut campaign = config.into_campaign()?;

    let snapshot_path = options
        .snapshot
        .clone()
        .unwrap_or_else(|| run_dir.join(SNAPSHOT_FILE));
    if options.resume {
        if snapshot_path.exists() {
            let snapshot = SwarmSnapshot::load(&snapshot_path)?;
            campaign.resume(snapshot)?;
        } else {
            warn!("no snapshot at {}, starting fresh", snapshot_path.display());
        }
    }
    if let Some(path) = &options.bias {
        campaign.bias(&load_bias(path)?)?;
    }

    let mut evaluator = config.fitness.evaluator();
    let summaries = campaign.run(
        run_dir,
        options.generations,
        Some(snapshot_path.as_path()),
        evaluator.as_mut(),
    )?;

    if let Some(last) = summaries.last() {
        let labels: Vec<&str> = campaign.specs().iter().map(|s| s.label.as_str()).collect();
        match &last.global_best_position {
            Some(position) => println!(
                "generation {}: best fitness {:.6} at {}",
                last.generation,
                last.global_best,
                labels
                    .iter()
                    .zip(position)
                    .map(|(label, value)| format!("{label}={value}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            None => println!(
                "generation {}: no fitness above {}",
                last.generation, last.global_best
            ),
        }
    }
    Ok(())
}

/// Report seed directories with pending stages
pub fn status(sim_dirs: &[PathBuf], states: &[String]) -> color_eyre::Result<()> {
    let seeds = seed_directories(sim_dirs)?;
    let filter = (!states.is_empty()).then_some(states);
    let ready = runnable(&seeds, filter)?;

    let running = seeds.iter().filter(|s| is_running(s)).count();
    let failed = seeds.iter().filter(|s| is_error(s)).count();
    for (seed_dir, pending) in &ready {
        println!("{}: {}", seed_dir.display(), pending.join(" "));
    }
    println!(
        "{} seed directories: {} runnable, {} running, {} failed",
        seeds.len(),
        ready.len(),
        running,
        failed
    );
    Ok(())
}
