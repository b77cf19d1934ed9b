//! Particle swarm search over parameter specs
//!
//! Each particle is one parameter combination. A generation runs
//! evaluate → update bests → advance; there is no built-in stopping rule, the
//! caller decides how many generations to run.
//!
//! Randomness is drawn from a [`SmallRng`] reseeded from `rng_seed` and the
//! generation number, so a swarm restored from a snapshot continues with
//! exactly the draws an uninterrupted run would have made.

mod report;
mod state;

pub use state::{IMPROVED, SwarmPhase, SwarmState, UNCHANGED};

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::directory::{NamingPolicy, sim_name};
use crate::error::{ParameterError, SwarmError};
use crate::fitness::FitnessEvaluator;
use crate::parameter::{Bounds, ParameterSpec, uniform_random};

fn default_inertia() -> f64 {
    0.6
}

fn default_acceleration() -> f64 {
    2.0
}

/// Stream id reserved for seeding; generations use `generation + 1`
const SEED_STREAM: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Weight of the previous velocity
    #[serde(default = "default_inertia")]
    pub inertia: f64,
    /// Upper bound (exclusive) of the cognitive and social coefficients
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,
    /// Starting value of every best; only strictly larger fitness registers
    #[serde(default)]
    pub best_floor: f64,
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            inertia: default_inertia(),
            acceleration: default_acceleration(),
            best_floor: 0.0,
            rng_seed: None,
        }
    }
}

/// Caller-supplied position override for one particle
#[derive(Debug, Clone, PartialEq)]
pub struct BiasRow {
    pub particle: usize,
    pub values: Vec<f64>,
}

pub struct ParticleSwarm {
    specs: Vec<ParameterSpec>,
    bounds: Vec<Bounds>,
    state: SwarmState,
    config: SwarmConfig,
    rng_seed: u64,
}

impl ParticleSwarm {
    /// Every spec must declare bounds. Specs holding literal values must hold
    /// exactly `particle_count` scalars.
    pub fn new(
        specs: Vec<ParameterSpec>,
        particle_count: usize,
        config: SwarmConfig,
    ) -> Result<Self, SwarmError> {
        if specs.is_empty() || particle_count == 0 {
            return Err(SwarmError::Empty);
        }
        let bounds = checked_bounds(&specs)?;
        for spec in specs.iter().filter(|s| !s.is_empty()) {
            if spec.len() != particle_count {
                return Err(SwarmError::Shape {
                    expected: particle_count,
                    found: spec.len(),
                });
            }
        }

        let rng_seed = config.rng_seed.unwrap_or_else(rand::random);
        debug!("swarm rng seed {}", rng_seed);
        let state = SwarmState::new(particle_count, specs.len(), config.best_floor);
        Ok(Self {
            specs,
            bounds,
            state,
            config,
            rng_seed,
        })
    }

    pub(crate) fn from_parts(
        specs: Vec<ParameterSpec>,
        state: SwarmState,
        config: SwarmConfig,
        rng_seed: u64,
    ) -> Result<Self, SwarmError> {
        let bounds = checked_bounds(&specs)?;
        Ok(Self {
            specs,
            bounds,
            state,
            config,
            rng_seed,
        })
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn state(&self) -> &SwarmState {
        &self.state
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    pub fn particle_count(&self) -> usize {
        self.state.particle_count()
    }

    pub fn dims(&self) -> usize {
        self.specs.len()
    }

    fn stream(&self, id: u64) -> SmallRng {
        SmallRng::seed_from_u64(self.rng_seed ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn require_phase(&self, expected: &'static str, ok: bool) -> Result<(), SwarmError> {
        if ok {
            Ok(())
        } else {
            Err(SwarmError::Phase {
                expected,
                found: self.state.phase,
            })
        }
    }

    /// Current position of particle `i`, one value per dimension
    pub fn position(&self, i: usize) -> Result<Vec<f64>, SwarmError> {
        if i >= self.particle_count() {
            return Err(SwarmError::UnknownParticle {
                id: i,
                count: self.particle_count(),
            });
        }
        Ok(self
            .specs
            .iter()
            .map(|spec| spec.scalar(i))
            .collect::<Result<Vec<_>, ParameterError>>()?)
    }

    /// Fill missing positions with uniform draws over each spec's bounds and
    /// draw initial velocities in `±span`.
    pub fn seed(&mut self) -> Result<(), SwarmError> {
        self.require_phase("uninitialized", self.state.phase == SwarmPhase::Uninitialized)?;
        let n = self.particle_count();
        let mut rng = self.stream(SEED_STREAM);

        for (spec, bounds) in self.specs.iter_mut().zip(&self.bounds) {
            if spec.is_empty() {
                let drawn: Vec<f64> = (0..n).map(|_| uniform_random(*bounds, &mut rng)).collect();
                spec.set_scalars(drawn);
            }
        }

        for (d, bounds) in self.bounds.iter().enumerate() {
            let span = bounds.span();
            for velocity in self.state.velocities.iter_mut() {
                velocity[d] = rng.random_range(-span..=span);
            }
        }

        for i in 0..n {
            self.state.personal_best_position[i] = self.position(i)?;
        }
        self.state.phase = SwarmPhase::Seeded;
        info!("seeded {} particles over {} parameters", n, self.dims());
        Ok(())
    }

    /// Store externally computed fitness for every particle
    pub fn record_fitness(&mut self, fitness: &[f64]) -> Result<(), SwarmError> {
        self.require_phase("seeded or moved", self.state.phase.awaits_fitness())?;
        if fitness.len() != self.particle_count() {
            return Err(SwarmError::Shape {
                expected: self.particle_count(),
                found: fitness.len(),
            });
        }
        self.state.fitness.copy_from_slice(fitness);
        self.state.phase = SwarmPhase::Evaluated;
        Ok(())
    }

    /// Evaluate particles in index order, stopping at the first failure.
    ///
    /// Particle `i`'s directory under `dir` is named from its current
    /// position exactly as [`crate::directory::DirectoryBuilder`] names it.
    pub fn evaluate_all<E>(
        &mut self,
        dir: &Path,
        policy: NamingPolicy,
        evaluator: &mut E,
    ) -> Result<(), SwarmError>
    where
        E: FitnessEvaluator + ?Sized,
    {
        self.require_phase("seeded or moved", self.state.phase.awaits_fitness())?;
        for i in 0..self.particle_count() {
            let indices = vec![i; self.dims()];
            let sim_dir = dir.join(policy.dir_name(&sim_name(&self.specs, &indices)?));
            let position = self.position(i)?;
            let fitness = evaluator.evaluate(&sim_dir, &position)?;
            info!("particle {:>3}: fitness {:.6}", i, fitness);
            self.state.fitness[i] = fitness;
        }
        self.state.phase = SwarmPhase::Evaluated;
        Ok(())
    }

    /// Strict-improvement update of personal and global bests.
    ///
    /// NaN fitness never registers, so the global best never decreases.
    pub fn update_bests(&mut self) -> Result<(), SwarmError> {
        self.require_phase("evaluated", self.state.phase == SwarmPhase::Evaluated)?;
        self.state.reset_markers();

        for i in 0..self.particle_count() {
            let fitness = self.state.fitness[i];
            if fitness > self.state.personal_best[i] {
                self.state.personal_best[i] = fitness;
                self.state.personal_best_position[i] = self.position(i)?;
                self.state.personal_best_id[i] = i;
                self.state.personal_best_marker[i] = IMPROVED;
            }
            if fitness > self.state.global_best {
                self.state.global_best = fitness;
                self.state.global_best_position = Some(self.position(i)?);
                self.state.global_best_id = Some(i);
                self.state.global_best_marker = IMPROVED;
            }
        }

        self.state.phase = SwarmPhase::BestUpdated;
        Ok(())
    }

    /// Move every particle one step.
    ///
    /// `v' = w v + c1 (pbest - x) + c2 (gbest - x)`, clamped to half the span,
    /// then one reflection at the upper bound followed by one at the lower
    /// bound, each negating the velocity. The social term is left out while
    /// no global best exists.
    pub fn advance(&mut self) -> Result<(), SwarmError> {
        self.require_phase("best-updated", self.state.phase == SwarmPhase::BestUpdated)?;
        let mut rng = self.stream(self.state.generation as u64 + 1);
        let acceleration = self.config.acceleration;

        for i in 0..self.particle_count() {
            let c1 = rng.random::<f64>() * acceleration;
            let c2 = rng.random::<f64>() * acceleration;
            let position = self.position(i)?;

            for (d, &x) in position.iter().enumerate() {
                let (lower, upper) = self.bounds[d].ordered();
                let v_max = (upper - lower) / 2.0;

                let cognitive = c1 * (self.state.personal_best_position[i][d] - x);
                let social = self
                    .state
                    .global_best_position
                    .as_ref()
                    .map_or(0.0, |g| c2 * (g[d] - x));
                let mut v = (self.config.inertia * self.state.velocities[i][d] + cognitive + social)
                    .clamp(-v_max, v_max);

                let (next, reflected) = reflect(x + v, lower, upper);
                if reflected % 2 == 1 {
                    v = -v;
                }
                self.state.velocities[i][d] = v;
                self.specs[d].set_scalar(i, next)?;
            }
            self.state.fitness[i] = f64::NAN;
        }

        self.state.generation += 1;
        self.state.phase = SwarmPhase::Moved;
        Ok(())
    }

    /// Elitism update for the genetic optimizer
    pub fn update_elites(&mut self) -> Result<(), SwarmError> {
        unimplemented!("genetic elitism update")
    }

    /// Overwrite the positions of the listed particles, coercing each value
    /// to its dimension's type.
    pub fn bias(&mut self, rows: &[BiasRow]) -> Result<(), SwarmError> {
        self.require_phase("seeded or moved", self.state.phase.awaits_fitness())?;
        for row in rows {
            if row.particle >= self.particle_count() {
                return Err(SwarmError::UnknownParticle {
                    id: row.particle,
                    count: self.particle_count(),
                });
            }
            if row.values.len() != self.dims() {
                return Err(SwarmError::Shape {
                    expected: self.dims(),
                    found: row.values.len(),
                });
            }
        }
        for row in rows {
            for (spec, &value) in self.specs.iter_mut().zip(&row.values) {
                spec.set_scalar(row.particle, value)?;
            }
            info!("biased particle {} to {:?}", row.particle, row.values);
        }
        Ok(())
    }
}

fn checked_bounds(specs: &[ParameterSpec]) -> Result<Vec<Bounds>, SwarmError> {
    specs
        .iter()
        .map(|spec| -> Result<Bounds, SwarmError> {
            let bounds = spec.require_bounds()?;
            if !(bounds.lower.is_finite() && bounds.upper.is_finite()) {
                return Err(ParameterError::Configuration {
                    label: spec.label.clone(),
                    reason: "bounds must be finite".to_string(),
                }
                .into());
            }
            if spec.values.iter().any(|v| v.as_scalar().is_none()) {
                return Err(ParameterError::Configuration {
                    label: spec.label.clone(),
                    reason: "sequence values cannot be optimized".to_string(),
                }
                .into());
            }
            Ok(bounds)
        })
        .collect()
}

/// Reflect once at `upper`, then once at `lower`; returns the position and
/// how many reflections happened.
fn reflect(mut x: f64, lower: f64, upper: f64) -> (f64, u32) {
    let mut reflected = 0;
    if x > upper {
        x = 2.0 * upper - x;
        reflected += 1;
    }
    if x < lower {
        x = 2.0 * lower - x;
        reflected += 1;
    }
    (x, reflected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{FormatRule, Generator, ValueType};

    fn spec(label: &str, lower: f64, upper: f64) -> ParameterSpec {
        ParameterSpec::new(label, FormatRule::parse(&format!("{label}{{:.3f}}")).unwrap())
            .with_generator(Generator::UniformRandom {
                bounds: Bounds::new(lower, upper),
            })
    }

    fn seeded(specs: Vec<ParameterSpec>, n: usize, seed: u64) -> ParticleSwarm {
        let config = SwarmConfig {
            rng_seed: Some(seed),
            ..Default::default()
        };
        let mut swarm = ParticleSwarm::new(specs, n, config).unwrap();
        swarm.seed().unwrap();
        swarm
    }

    #[test]
    fn test_reflect_single_bounce() {
        assert_eq!(reflect(12.0, 0.0, 10.0), (8.0, 1));
        assert_eq!(reflect(-3.0, 0.0, 10.0), (3.0, 1));
        assert_eq!(reflect(4.0, 0.0, 10.0), (4.0, 0));
    }

    #[test]
    fn test_missing_bounds_is_configuration_error() {
        let unbounded = ParameterSpec::new("x", FormatRule::parse("x{:.1f}").unwrap());
        assert!(matches!(
            ParticleSwarm::new(vec![unbounded], 2, SwarmConfig::default()),
            Err(SwarmError::Parameter(ParameterError::Configuration { .. }))
        ));
    }

    #[test]
    fn test_seed_within_bounds() {
        let swarm = seeded(vec![spec("a", 0.0, 10.0), spec("b", -5.0, 5.0)], 8, 3);
        let state = swarm.state();
        for i in 0..8 {
            let p = swarm.position(i).unwrap();
            assert!((0.0..=10.0).contains(&p[0]));
            assert!((-5.0..=5.0).contains(&p[1]));
            assert!(state.velocities[i][0].abs() <= 10.0);
            assert!(state.velocities[i][1].abs() <= 10.0);
            assert_eq!(state.personal_best_position[i], p);
            assert!(state.fitness[i].is_nan());
        }
        assert_eq!(state.phase, SwarmPhase::Seeded);
    }

    #[test]
    fn test_literal_values_kept() {
        let a = spec("a", 0.0, 10.0).with_values([1.0, 2.0]);
        let swarm = seeded(vec![a], 2, 1);
        assert_eq!(swarm.position(1).unwrap(), vec![2.0]);

        let short = spec("a", 0.0, 10.0).with_values([1.0]);
        assert!(matches!(
            ParticleSwarm::new(vec![short], 2, SwarmConfig::default()),
            Err(SwarmError::Shape { .. })
        ));
    }

    #[test]
    fn test_phase_order_enforced() {
        let mut swarm = seeded(vec![spec("a", 0.0, 1.0)], 2, 5);
        assert!(matches!(swarm.advance(), Err(SwarmError::Phase { .. })));
        assert!(matches!(swarm.update_bests(), Err(SwarmError::Phase { .. })));
        assert!(matches!(swarm.seed(), Err(SwarmError::Phase { .. })));
    }

    #[test]
    fn test_reflection_flips_velocity() {
        // pbest == gbest == x removes both attraction terms, leaving w*v
        let a = spec("a", 0.0, 10.0).with_values([9.0]);
        let mut swarm = seeded(vec![a], 1, 9);
        swarm.record_fitness(&[1.0]).unwrap();
        swarm.update_bests().unwrap();
        swarm.state.velocities[0][0] = 5.0;

        swarm.advance().unwrap();

        // v = 0.6 * 5 = 3, x = 12 -> reflected to 8
        let x = swarm.position(0).unwrap()[0];
        assert!((x - 8.0).abs() < 1e-12);
        assert!((swarm.state().velocities[0][0] + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_clamped_to_half_span() {
        let a = spec("a", 0.0, 10.0).with_values([5.0]);
        let mut swarm = seeded(vec![a], 1, 2);
        swarm.record_fitness(&[1.0]).unwrap();
        swarm.update_bests().unwrap();
        swarm.state.velocities[0][0] = -100.0;

        swarm.advance().unwrap();

        assert!((swarm.state().velocities[0][0] + 5.0).abs() < 1e-12);
        assert!(swarm.position(0).unwrap()[0].abs() < 1e-12);
    }

    #[test]
    fn test_integer_positions_truncate() {
        let n = ParameterSpec::new("n", FormatRule::parse("n{:d}").unwrap())
            .with_generator(Generator::UniformRandom {
                bounds: Bounds::new(0.0, 50.0),
            })
            .with_value_type(ValueType::Integer);
        let mut swarm = seeded(vec![n], 6, 4);
        for _ in 0..5 {
            let fitness: Vec<f64> = (0..6).map(|i| i as f64).collect();
            swarm.record_fitness(&fitness).unwrap();
            swarm.update_bests().unwrap();
            swarm.advance().unwrap();
            for i in 0..6 {
                let x = swarm.position(i).unwrap()[0];
                assert_eq!(x, x.trunc());
                assert!((0.0..=50.0).contains(&x));
            }
        }
    }

    #[test]
    fn test_global_best_monotonic() {
        let mut swarm = seeded(vec![spec("a", 0.0, 1.0), spec("b", 0.0, 1.0)], 3, 21);
        let rounds = [
            [0.5, f64::NAN, 0.1],
            [0.2, 0.3, 0.4],
            [0.0, 0.0, 0.0],
            [0.9, -1.0, f64::NAN],
            [0.9, 0.9, 0.9],
        ];
        let mut previous = swarm.state().global_best;
        for (round, fitness) in rounds.iter().enumerate() {
            swarm.record_fitness(fitness).unwrap();
            swarm.update_bests().unwrap();
            let state = swarm.state();
            assert!(state.global_best >= previous);
            // equal fitness never counts as an improvement
            if round == 4 {
                assert_eq!(state.global_best_marker, UNCHANGED);
                assert_eq!(state.global_best_id, Some(0));
            }
            previous = state.global_best;
            swarm.advance().unwrap();
        }
        assert_eq!(previous, 0.9);
    }

    #[test]
    fn test_all_zero_fitness_never_sets_global_best() {
        let mut swarm = seeded(vec![spec("a", 0.0, 1.0)], 2, 8);
        swarm.record_fitness(&[0.0, 0.0]).unwrap();
        swarm.update_bests().unwrap();
        assert!(swarm.state().global_best_position.is_none());
        assert_eq!(swarm.state().personal_best_marker, vec![UNCHANGED; 2]);
        swarm.advance().unwrap();
        assert_eq!(swarm.state().generation, 1);
    }

    #[test]
    fn test_bias_overrides_positions() {
        let n = ParameterSpec::new("n", FormatRule::parse("n{:d}").unwrap()).with_generator(
            Generator::UniformRandom {
                bounds: Bounds::new(0.0, 9.0),
            },
        );
        let mut swarm = seeded(vec![spec("a", 0.0, 1.0), n], 3, 6);
        swarm
            .bias(&[BiasRow {
                particle: 2,
                values: vec![0.25, 7.9],
            }])
            .unwrap();
        assert_eq!(swarm.position(2).unwrap(), vec![0.25, 7.0]);

        assert!(matches!(
            swarm.bias(&[BiasRow {
                particle: 3,
                values: vec![0.0, 0.0],
            }]),
            Err(SwarmError::UnknownParticle { .. })
        ));
        assert!(matches!(
            swarm.bias(&[BiasRow {
                particle: 0,
                values: vec![0.0],
            }]),
            Err(SwarmError::Shape { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "genetic elitism")]
    fn test_elitism_aborts() {
        let mut swarm = seeded(vec![spec("a", 0.0, 1.0)], 1, 0);
        let _ = swarm.update_elites();
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let run = || {
            let mut swarm = seeded(vec![spec("a", 0.0, 10.0)], 4, 77);
            for _ in 0..3 {
                let fitness: Vec<f64> = (0..4)
                    .map(|i| -swarm.position(i).unwrap()[0])
                    .collect();
                swarm.record_fitness(&fitness).unwrap();
                swarm.update_bests().unwrap();
                swarm.advance().unwrap();
            }
            (0..4)
                .map(|i| swarm.position(i).unwrap()[0])
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
