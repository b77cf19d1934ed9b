//! Versioned swarm snapshots for resuming a campaign
//!
//! Snapshots are JSON. Fitness is NaN between generations and a best floor
//! may be `-inf`, neither of which JSON numbers can carry, so those fields use
//! [`SnapshotFloat`], which writes non-finite values as `"nan"`, `"inf"` or
//! `"-inf"`.

use std::fs;
use std::path::Path;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SnapshotError;
use crate::io::atomic_write;
use crate::parameter::ParameterSpec;
use crate::swarm::{ParticleSwarm, SwarmConfig, SwarmPhase, SwarmState};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonFinite {
    #[serde(rename = "nan")]
    Nan,
    #[serde(rename = "inf")]
    Inf,
    #[serde(rename = "-inf")]
    NegInf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotFloat {
    Finite(f64),
    NonFinite(NonFinite),
}

impl From<f64> for SnapshotFloat {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            SnapshotFloat::NonFinite(NonFinite::Nan)
        } else if value == f64::INFINITY {
            SnapshotFloat::NonFinite(NonFinite::Inf)
        } else if value == f64::NEG_INFINITY {
            SnapshotFloat::NonFinite(NonFinite::NegInf)
        } else {
            SnapshotFloat::Finite(value)
        }
    }
}

impl From<SnapshotFloat> for f64 {
    fn from(value: SnapshotFloat) -> Self {
        match value {
            SnapshotFloat::Finite(v) => v,
            SnapshotFloat::NonFinite(NonFinite::Nan) => f64::NAN,
            SnapshotFloat::NonFinite(NonFinite::Inf) => f64::INFINITY,
            SnapshotFloat::NonFinite(NonFinite::NegInf) => f64::NEG_INFINITY,
        }
    }
}

fn wrap(values: &[f64]) -> Vec<SnapshotFloat> {
    values.iter().copied().map(SnapshotFloat::from).collect()
}

fn unwrap(values: Vec<SnapshotFloat>) -> Vec<f64> {
    values.into_iter().map(f64::from).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    pub version: u32,
    pub saved_at: Timestamp,
    pub rng_seed: u64,
    pub particle_count: usize,
    pub param_specs: Vec<ParameterSpec>,
    /// `positions[i][d]`, duplicated from the spec values for readability
    pub positions: Vec<Vec<f64>>,
    pub velocities: Vec<Vec<f64>>,
    pub fitness: Vec<SnapshotFloat>,
    pub personal_best: Vec<SnapshotFloat>,
    pub personal_best_position: Vec<Vec<f64>>,
    pub personal_best_id: Vec<usize>,
    pub personal_best_marker: Vec<char>,
    pub global_best: SnapshotFloat,
    pub global_best_position: Option<Vec<f64>>,
    pub global_best_id: Option<usize>,
    pub global_best_marker: char,
    pub generation: usize,
    pub phase: SwarmPhase,
}

impl SwarmSnapshot {
    pub fn capture(swarm: &ParticleSwarm) -> Result<Self, SnapshotError> {
        let state = swarm.state();
        let positions = (0..swarm.particle_count())
            .map(|i| swarm.position(i))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SnapshotError::Inconsistent(e.to_string()))?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            saved_at: Timestamp::now(),
            rng_seed: swarm.rng_seed(),
            particle_count: swarm.particle_count(),
            param_specs: swarm.specs().to_vec(),
            positions,
            velocities: state.velocities.clone(),
            fitness: wrap(&state.fitness),
            personal_best: wrap(&state.personal_best),
            personal_best_position: state.personal_best_position.clone(),
            personal_best_id: state.personal_best_id.clone(),
            personal_best_marker: state.personal_best_marker.clone(),
            global_best: state.global_best.into(),
            global_best_position: state.global_best_position.clone(),
            global_best_id: state.global_best_id,
            global_best_marker: state.global_best_marker,
            generation: state.generation,
            phase: state.phase,
        })
    }

    fn check_shapes(&self) -> Result<(), SnapshotError> {
        let n = self.particle_count;
        let dims = self.param_specs.len();
        let per_particle = [
            ("positions", self.positions.len()),
            ("velocities", self.velocities.len()),
            ("fitness", self.fitness.len()),
            ("personal_best", self.personal_best.len()),
            ("personal_best_position", self.personal_best_position.len()),
            ("personal_best_id", self.personal_best_id.len()),
            ("personal_best_marker", self.personal_best_marker.len()),
        ];
        if let Some((field, len)) = per_particle.iter().find(|(_, len)| *len != n) {
            return Err(SnapshotError::Inconsistent(format!(
                "{field} holds {len} entries for {n} particles"
            )));
        }
        let rows = self
            .positions
            .iter()
            .chain(&self.velocities)
            .chain(&self.personal_best_position)
            .chain(self.global_best_position.iter());
        for row in rows {
            if row.len() != dims {
                return Err(SnapshotError::Inconsistent(format!(
                    "row of {} values for {dims} parameters",
                    row.len()
                )));
            }
        }
        Ok(())
    }

    /// Rebuild the swarm; positions are written back into the spec values
    pub fn into_swarm(self, config: SwarmConfig) -> Result<ParticleSwarm, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        self.check_shapes()?;

        let mut specs = self.param_specs;
        for (d, spec) in specs.iter_mut().enumerate() {
            spec.set_scalars(self.positions.iter().map(|row| row[d]));
        }
        let state = SwarmState {
            velocities: self.velocities,
            fitness: unwrap(self.fitness),
            personal_best: unwrap(self.personal_best),
            personal_best_position: self.personal_best_position,
            personal_best_id: self.personal_best_id,
            personal_best_marker: self.personal_best_marker,
            global_best: self.global_best.into(),
            global_best_position: self.global_best_position,
            global_best_id: self.global_best_id,
            global_best_marker: self.global_best_marker,
            generation: self.generation,
            phase: self.phase,
        };
        ParticleSwarm::from_parts(specs, state, config, self.rng_seed)
            .map_err(|e| SnapshotError::Inconsistent(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, &json).map_err(|e| SnapshotError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("snapshot written to {} (generation {})", path.display(), self.generation);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path).map_err(|e| SnapshotError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let snapshot: Self = serde_json::from_str(&json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }
}

impl ParticleSwarm {
    pub fn snapshot(&self) -> Result<SwarmSnapshot, SnapshotError> {
        SwarmSnapshot::capture(self)
    }

    pub fn restore(snapshot: SwarmSnapshot, config: SwarmConfig) -> Result<Self, SnapshotError> {
        snapshot.into_swarm(config)
    }
}
