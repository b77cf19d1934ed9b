//! Campaign driver
//!
//! A campaign owns the parameter specs and the directory builder. It creates
//! plain sweeps (cartesian product of all values), shotgun runs (one directory
//! per particle) and drives the optimizer one generation at a time, each
//! generation in its own `gen<N>/` directory under the run directory.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::directory::{DirectoryBuilder, NamingPolicy, SimDirectory};
use crate::error::{CampaignError, DirectoryError, ParameterError};
use crate::fitness::FitnessEvaluator;
use crate::parameter::ParameterSpec;
use crate::snapshot::SwarmSnapshot;
use crate::swarm::{BiasRow, ParticleSwarm, SwarmConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    ParticleSwarm,
    /// Declared but not implemented; the first generation aborts
    GeneticElitism,
}

/// What to do when a simulation directory already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Abort,
    /// Log and reuse the existing directory
    Skip,
}

/// Outcome of one optimizer generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    pub generation: usize,
    pub dir: PathBuf,
    pub fitness: Vec<f64>,
    pub global_best: f64,
    pub global_best_position: Option<Vec<f64>>,
    pub improved: bool,
}

pub fn generation_dir(run_dir: &Path, generation: usize) -> PathBuf {
    run_dir.join(format!("gen{generation}"))
}

pub struct Campaign {
    specs: Vec<ParameterSpec>,
    builder: DirectoryBuilder,
    optimizer: OptimizerKind,
    swarm_config: SwarmConfig,
    conflict: ConflictPolicy,
    particle_count: Option<usize>,
    swarm: Option<ParticleSwarm>,
    /// Generation whose directories exist, kept so a failed evaluation can
    /// be retried without recreating them
    prepared: Option<usize>,
    rng: SmallRng,
}

impl Campaign {
    pub fn new(specs: Vec<ParameterSpec>, builder: DirectoryBuilder) -> Result<Self, CampaignError> {
        if specs.is_empty() {
            return Err(CampaignError::NoParameters);
        }
        Ok(Self {
            specs,
            builder,
            optimizer: OptimizerKind::default(),
            swarm_config: SwarmConfig::default(),
            conflict: ConflictPolicy::default(),
            particle_count: None,
            swarm: None,
            prepared: None,
            rng: SmallRng::seed_from_u64(rand::random()),
        })
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// A fixed `rng_seed` also seeds value generation for sweeps and shotguns
    pub fn with_swarm_config(mut self, config: SwarmConfig) -> Self {
        if let Some(seed) = config.rng_seed {
            self.rng = SmallRng::seed_from_u64(seed);
        }
        self.swarm_config = config;
        self
    }

    pub fn with_conflict_policy(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    /// Used when no spec carries literal values
    pub fn with_particle_count(mut self, count: usize) -> Self {
        self.particle_count = Some(count);
        self
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        match &self.swarm {
            Some(swarm) => swarm.specs(),
            None => &self.specs,
        }
    }

    pub fn builder(&self) -> &DirectoryBuilder {
        &self.builder
    }

    pub fn swarm(&self) -> Option<&ParticleSwarm> {
        self.swarm.as_ref()
    }

    /// Effective particle count.
    ///
    /// Specs with literal values decide: the shortest list wins and longer
    /// lists are truncated to it. Without literal values the configured count
    /// is used.
    pub fn reconcile_particle_count(&mut self) -> Option<usize> {
        let counts: Vec<usize> = self
            .specs
            .iter()
            .filter(|s| !s.is_empty())
            .map(ParameterSpec::len)
            .collect();
        let Some(&shortest) = counts.iter().min() else {
            return self.particle_count;
        };
        if counts.iter().any(|&c| c != shortest) {
            warn!(
                "parameters hold {:?} values; using the shortest count {}",
                counts, shortest
            );
            for spec in &mut self.specs {
                spec.truncate(shortest);
            }
        }
        if let Some(configured) = self.particle_count.filter(|&c| c != shortest) {
            warn!(
                "particle count {} overridden by {} literal values",
                configured, shortest
            );
        }
        self.particle_count = Some(shortest);
        Some(shortest)
    }

    /// Give every spec without literal values one drawn value per particle
    pub fn fill_shotgun_values(&mut self) -> Result<usize, CampaignError> {
        let n = self
            .reconcile_particle_count()
            .ok_or(CampaignError::ParticleCount)?;
        for spec in self.specs.iter_mut().filter(|s| s.is_empty()) {
            for _ in 0..n {
                spec.draw_value(&mut self.rng)?;
            }
        }
        Ok(n)
    }

    /// Replace empty value lists with each generator's full list
    pub fn expand_values(&mut self) -> Result<(), CampaignError> {
        for spec in self.specs.iter_mut().filter(|s| s.is_empty()) {
            spec.generate(&mut self.rng)?;
        }
        Ok(())
    }

    fn create_one(
        &self,
        dir: &Path,
        generation: usize,
        specs: &[ParameterSpec],
        indices: &[usize],
    ) -> Result<Option<SimDirectory>, CampaignError> {
        match self.builder.create(dir, generation, specs, indices) {
            Ok(created) => Ok(Some(created)),
            Err(DirectoryError::Conflict(path)) if self.conflict == ConflictPolicy::Skip => {
                warn!("{} already exists, skipping", path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_header(
        &self,
        dir: &Path,
        generation: usize,
        specs: &[ParameterSpec],
    ) -> Result<(), CampaignError> {
        if self.builder.policy == NamingPolicy::ContentAddressed {
            self.builder.write_database_header(dir, generation, specs)?;
        }
        Ok(())
    }

    /// One directory per element of the cartesian product of all values,
    /// last parameter varying fastest.
    pub fn create_sweep(&mut self, run_dir: &Path) -> Result<Vec<SimDirectory>, CampaignError> {
        self.expand_values()?;
        if let Some(empty) = self.specs.iter().find(|s| s.is_empty()) {
            return Err(ParameterError::configuration(&empty.label, "no values to sweep").into());
        }

        let sizes: Vec<usize> = self.specs.iter().map(ParameterSpec::len).collect();
        let total: usize = sizes.iter().product();
        info!("creating sweep of {} simulations in {}", total, run_dir.display());
        self.write_header(run_dir, 0, &self.specs)?;

        let mut created = Vec::with_capacity(total);
        let mut indices = vec![0; sizes.len()];
        for _ in 0..total {
            if let Some(dir) = self.create_one(run_dir, 0, &self.specs, &indices)? {
                created.push(dir);
            }
            for d in (0..sizes.len()).rev() {
                indices[d] += 1;
                if indices[d] < sizes[d] {
                    break;
                }
                indices[d] = 0;
            }
        }
        Ok(created)
    }

    /// One directory per particle, every spec at the same index
    pub fn create_shotgun(&mut self, run_dir: &Path) -> Result<Vec<SimDirectory>, CampaignError> {
        let n = self.fill_shotgun_values()?;
        info!("creating shotgun of {} simulations in {}", n, run_dir.display());
        self.write_header(run_dir, 0, &self.specs)?;

        let mut created = Vec::with_capacity(n);
        for i in 0..n {
            let indices = vec![i; self.specs.len()];
            if let Some(dir) = self.create_one(run_dir, 0, &self.specs, &indices)? {
                created.push(dir);
            }
        }
        Ok(created)
    }

    /// Seed a fresh swarm from the current specs
    pub fn start_swarm(&mut self) -> Result<&mut ParticleSwarm, CampaignError> {
        let n = self
            .reconcile_particle_count()
            .ok_or(CampaignError::ParticleCount)?;
        let mut swarm = ParticleSwarm::new(self.specs.clone(), n, self.swarm_config.clone())?;
        swarm.seed()?;
        self.prepared = None;
        Ok(self.swarm.insert(swarm))
    }

    /// Continue from a saved snapshot instead of seeding
    pub fn resume(&mut self, snapshot: SwarmSnapshot) -> Result<(), CampaignError> {
        let swarm = ParticleSwarm::restore(snapshot, self.swarm_config.clone())?;
        info!(
            "resumed swarm of {} particles at generation {}",
            swarm.particle_count(),
            swarm.state().generation
        );
        self.specs = swarm.specs().to_vec();
        self.particle_count = Some(swarm.particle_count());
        self.prepared = None;
        self.swarm = Some(swarm);
        Ok(())
    }

    pub fn bias(&mut self, rows: &[BiasRow]) -> Result<(), CampaignError> {
        if self.swarm.is_none() {
            self.start_swarm()?;
        }
        if let Some(swarm) = self.swarm.as_mut() {
            swarm.bias(rows)?;
            self.specs = swarm.specs().to_vec();
            self.prepared = None;
        }
        Ok(())
    }

    /// Materialize, evaluate, update bests, report and move the swarm
    pub fn run_generation<E>(
        &mut self,
        run_dir: &Path,
        evaluator: &mut E,
    ) -> Result<GenerationSummary, CampaignError>
    where
        E: FitnessEvaluator + ?Sized,
    {
        if self.swarm.is_none() {
            self.start_swarm()?;
        }
        let Some(mut swarm) = self.swarm.take() else {
            return Err(CampaignError::ParticleCount);
        };
        let result = self.step(&mut swarm, run_dir, evaluator);
        self.specs = swarm.specs().to_vec();
        self.swarm = Some(swarm);
        result
    }

    fn step<E>(
        &mut self,
        swarm: &mut ParticleSwarm,
        run_dir: &Path,
        evaluator: &mut E,
    ) -> Result<GenerationSummary, CampaignError>
    where
        E: FitnessEvaluator + ?Sized,
    {
        let generation = swarm.state().generation;
        let dir = generation_dir(run_dir, generation);
        info!("generation {} in {}", generation, dir.display());

        if self.prepared != Some(generation) {
            self.write_header(&dir, generation, swarm.specs())?;
            for i in 0..swarm.particle_count() {
                let indices = vec![i; swarm.dims()];
                self.create_one(&dir, generation, swarm.specs(), &indices)?;
            }
            self.prepared = Some(generation);
        }

        swarm.evaluate_all(&dir, self.builder.policy, evaluator)?;
        swarm.update_bests()?;
        info!("generation {} swarm:\n{}", generation, swarm.current_table());
        info!("generation {} bests:\n{}", generation, swarm.best_table());

        let state = swarm.state();
        let summary = GenerationSummary {
            generation,
            dir,
            fitness: state.fitness.clone(),
            global_best: state.global_best,
            global_best_position: state.global_best_position.clone(),
            improved: state.global_best_marker == crate::swarm::IMPROVED,
        };

        match self.optimizer {
            OptimizerKind::ParticleSwarm => swarm.advance()?,
            OptimizerKind::GeneticElitism => swarm.update_elites()?,
        }
        Ok(summary)
    }

    /// Run `generations` generations, saving a snapshot after each one when a
    /// path is given.
    pub fn run<E>(
        &mut self,
        run_dir: &Path,
        generations: usize,
        snapshot_path: Option<&Path>,
        evaluator: &mut E,
    ) -> Result<Vec<GenerationSummary>, CampaignError>
    where
        E: FitnessEvaluator + ?Sized,
    {
        let mut summaries = Vec::with_capacity(generations);
        for _ in 0..generations {
            let summary = self.run_generation(run_dir, evaluator)?;
            info!(
                "generation {} done: global best {:.6}{}",
                summary.generation,
                summary.global_best,
                if summary.improved { " (improved)" } else { "" }
            );
            summaries.push(summary);

            if let (Some(path), Some(swarm)) = (snapshot_path, self.swarm.as_ref()) {
                swarm.snapshot()?.save(path)?;
            }
        }
        Ok(summaries)
    }
}
