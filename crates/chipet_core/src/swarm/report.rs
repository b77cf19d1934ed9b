//! Fixed-width text tables of the swarm, logged once per generation

use std::fmt::Write;

use super::ParticleSwarm;
use crate::parameter::ValueType;

const ID_WIDTH: usize = 6;
const MIN_COLUMN: usize = 12;

fn column_width(label: &str) -> usize {
    label.len().max(MIN_COLUMN)
}

fn cell(value: f64, value_type: ValueType, width: usize) -> String {
    match value_type {
        ValueType::Integer => format!("{:>width$}", value as i64),
        ValueType::Float => format!("{:>width$.6}", value),
    }
}

impl ParticleSwarm {
    fn header(&self, fitness_label: &str) -> String {
        let mut line = format!("{:>ID_WIDTH$}", "id");
        for spec in self.specs() {
            let width = column_width(&spec.label);
            let _ = write!(line, " {:>width$}", spec.label);
        }
        let _ = write!(line, " {:>MIN_COLUMN$}", fitness_label);
        line
    }

    fn row(&self, id: &str, position: &[f64], fitness: f64, marker: char) -> String {
        let mut line = format!("{:>ID_WIDTH$}", id);
        for (spec, &value) in self.specs().iter().zip(position) {
            let width = column_width(&spec.label);
            let _ = write!(line, " {}", cell(value, spec.value_type, width));
        }
        let _ = write!(line, " {:>MIN_COLUMN$.6} {}", fitness, marker);
        line
    }

    /// Current positions and this generation's fitness
    pub fn current_table(&self) -> String {
        let state = self.state();
        let mut lines = vec![self.header("fitness")];
        for i in 0..self.particle_count() {
            let position: Vec<f64> = self
                .specs()
                .iter()
                .map(|spec| spec.scalar(i).unwrap_or(f64::NAN))
                .collect();
            lines.push(self.row(&i.to_string(), &position, state.fitness[i], ' '));
        }
        lines.join("\n")
    }

    /// Personal bests per particle followed by the global best
    pub fn best_table(&self) -> String {
        let state = self.state();
        let mut lines = vec![self.header("best")];
        for i in 0..self.particle_count() {
            lines.push(self.row(
                &state.personal_best_id[i].to_string(),
                &state.personal_best_position[i],
                state.personal_best[i],
                state.personal_best_marker[i],
            ));
        }
        match &state.global_best_position {
            Some(position) => lines.push(self.row(
                "global",
                position,
                state.global_best,
                state.global_best_marker,
            )),
            None => lines.push(format!("{:>ID_WIDTH$} (none above {})", "global", state.global_best)),
        }
        lines.join("\n")
    }
}
