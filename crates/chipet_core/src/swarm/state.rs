//! Mutable swarm bookkeeping
//!
//! Positions are not stored here: particle `i` sits at `specs[d].values[i]`
//! across dimensions `d`, so directory naming and config rendering read the
//! same values the optimizer moves.

use serde::{Deserialize, Serialize};

pub const IMPROVED: char = '*';
pub const UNCHANGED: char = ' ';

/// Where the swarm is in its generation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmPhase {
    Uninitialized,
    Seeded,
    Evaluated,
    BestUpdated,
    Moved,
}

impl SwarmPhase {
    /// Positions are fresh and waiting for fitness
    pub fn awaits_fitness(&self) -> bool {
        matches!(self, SwarmPhase::Seeded | SwarmPhase::Moved)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwarmState {
    /// `velocities[i][d]`
    pub velocities: Vec<Vec<f64>>,
    /// NaN until evaluated in the current generation
    pub fitness: Vec<f64>,
    pub personal_best: Vec<f64>,
    pub personal_best_position: Vec<Vec<f64>>,
    pub personal_best_id: Vec<usize>,
    pub personal_best_marker: Vec<char>,
    pub global_best: f64,
    pub global_best_position: Option<Vec<f64>>,
    pub global_best_id: Option<usize>,
    pub global_best_marker: char,
    pub generation: usize,
    pub phase: SwarmPhase,
}

impl SwarmState {
    pub fn new(particle_count: usize, dims: usize, floor: f64) -> Self {
        Self {
            velocities: vec![vec![0.0; dims]; particle_count],
            fitness: vec![f64::NAN; particle_count],
            personal_best: vec![floor; particle_count],
            personal_best_position: vec![vec![0.0; dims]; particle_count],
            personal_best_id: (0..particle_count).collect(),
            personal_best_marker: vec![UNCHANGED; particle_count],
            global_best: floor,
            global_best_position: None,
            global_best_id: None,
            global_best_marker: UNCHANGED,
            generation: 0,
            phase: SwarmPhase::Uninitialized,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.fitness.len()
    }

    /// Marks every best as unchanged for a new comparison pass
    pub(crate) fn reset_markers(&mut self) {
        self.personal_best_marker.fill(UNCHANGED);
        self.global_best_marker = UNCHANGED;
    }
}
