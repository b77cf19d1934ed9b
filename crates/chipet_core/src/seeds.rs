//! Repeat-seed subdirectories

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, ParameterError};
use crate::parameter::ValueSource;
use crate::template::{Bindings, ConfigTemplate};

/// What goes into each seed directory besides the rendered config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedOptions {
    /// Non-template inputs copied verbatim
    #[serde(default)]
    pub aux_files: Vec<PathBuf>,
    /// Processing stages to request, one `sim.<state>` marker each
    #[serde(default)]
    pub states: Vec<String>,
}

/// Half-open integer range `[lower, upper)` of seed indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i64; 2]", into = "[i64; 2]")]
pub struct SeedEnumerator {
    lower: i64,
    upper: i64,
}

impl Default for SeedEnumerator {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl SeedEnumerator {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    pub fn enumerate(&self) -> Vec<i64> {
        (self.lower..self.upper).collect()
    }

    pub fn seed_name(seed: i64) -> String {
        format!("s{seed}")
    }

    /// Create every seed directory under `sim_dir` and populate it.
    ///
    /// `bindings` carries the parameter values of this simulation; the seed
    /// index is added under the name `seed`.
    pub fn materialize(
        &self,
        sim_dir: &Path,
        template: &ConfigTemplate,
        bindings: &Bindings,
        options: &SeedOptions,
    ) -> Result<Vec<PathBuf>, DirectoryError> {
        let mut created = Vec::with_capacity(self.value_count());
        for (index, seed) in self.enumerate().into_iter().enumerate() {
            let seed_dir = sim_dir.join(self.fragment(index)?);
            fs::create_dir(&seed_dir).map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => DirectoryError::Conflict(seed_dir.clone()),
                _ => DirectoryError::io(&seed_dir, e),
            })?;

            let mut seed_bindings = bindings.clone();
            seed_bindings.insert("seed".to_string(), seed.to_string());
            template.write_to(&seed_dir, &seed_bindings)?;

            for file in &options.aux_files {
                let Some(name) = file.file_name() else {
                    continue;
                };
                fs::copy(file, seed_dir.join(name)).map_err(|e| DirectoryError::io(file, e))?;
            }

            for state in &options.states {
                let marker = seed_dir.join(format!("sim.{state}"));
                fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&marker)
                    .map_err(|e| DirectoryError::io(&marker, e))?;
            }

            created.push(seed_dir);
        }
        Ok(created)
    }
}

impl ValueSource for SeedEnumerator {
    fn value_count(&self) -> usize {
        (self.upper - self.lower).max(0) as usize
    }

    fn fragment(&self, index: usize) -> Result<String, ParameterError> {
        if index >= self.value_count() {
            return Err(ParameterError::IndexOutOfRange {
                label: "seed".to_string(),
                index,
                len: self.value_count(),
            });
        }
        Ok(Self::seed_name(self.lower + index as i64))
    }
}

impl From<[i64; 2]> for SeedEnumerator {
    fn from([lower, upper]: [i64; 2]) -> Self {
        Self::new(lower, upper)
    }
}

impl From<SeedEnumerator> for [i64; 2] {
    fn from(seeds: SeedEnumerator) -> Self {
        [seeds.lower, seeds.upper]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateFile;
    use tempfile::tempdir;

    #[test]
    fn test_enumerate_half_open() {
        let seeds = SeedEnumerator::new(2, 5);
        assert_eq!(seeds.enumerate(), vec![2, 3, 4]);
        assert_eq!(seeds.fragment(0).unwrap(), "s2");
        assert!(seeds.fragment(3).is_err());
        assert_eq!(SeedEnumerator::new(4, 1).value_count(), 0);
    }

    #[test]
    fn test_materialize_layout() {
        let dir = tempdir().unwrap();
        let aux = dir.path().join("fluid.txt");
        fs::write(&aux, "viscosity 1.0").unwrap();
        let sim_dir = dir.path().join("sim");
        fs::create_dir(&sim_dir).unwrap();

        let template = ConfigTemplate::new(vec![TemplateFile {
            name: "params.yaml".to_string(),
            body: "seed: {{seed}}\nkd: {{kd}}\n".to_string(),
        }]);
        let mut bindings = Bindings::new();
        bindings.insert("kd".to_string(), "0.5".to_string());
        let options = SeedOptions {
            aux_files: vec![aux],
            states: vec!["configure".to_string(), "analyze".to_string()],
        };

        let created = SeedEnumerator::new(0, 2)
            .materialize(&sim_dir, &template, &bindings, &options)
            .unwrap();

        assert_eq!(created, vec![sim_dir.join("s0"), sim_dir.join("s1")]);
        let params = fs::read_to_string(sim_dir.join("s1/params.yaml")).unwrap();
        assert_eq!(params, "seed: 1\nkd: 0.5\n");
        assert!(sim_dir.join("s0/fluid.txt").exists());
        assert!(sim_dir.join("s0/sim.configure").exists());
        assert!(sim_dir.join("s1/sim.analyze").exists());
    }

    #[test]
    fn test_materialize_twice_conflicts() {
        let dir = tempdir().unwrap();
        let seeds = SeedEnumerator::new(0, 1);
        let template = ConfigTemplate::default();
        let options = SeedOptions::default();
        seeds
            .materialize(dir.path(), &template, &Bindings::new(), &options)
            .unwrap();
        assert!(matches!(
            seeds.materialize(dir.path(), &template, &Bindings::new(), &options),
            Err(DirectoryError::Conflict(_))
        ));
    }
}
