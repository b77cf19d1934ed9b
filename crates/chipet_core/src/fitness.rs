//! Fitness evaluation
//!
//! The production evaluator runs the external analysis tool on a simulation
//! directory and reads back `data/fitness_final.yaml`. Mock evaluators score
//! positions directly so the optimizer can be exercised without simulations.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EvaluationError;

/// Scores one particle
pub trait FitnessEvaluator {
    /// `sim_dir` is the particle's directory for the current generation;
    /// `position` its parameter values in dimension order.
    fn evaluate(&mut self, sim_dir: &Path, position: &[f64]) -> Result<f64, EvaluationError>;
}

/// Parsed `fitness_final.yaml`
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessReport {
    pub short: f64,
    pub med: f64,
    pub long: f64,
    /// Kept for diagnostics, not part of the total
    pub length_fitness: f64,
    pub success_fraction: f64,
    pub length_correlation_avg: f64,
    pub chromosome_seconds_fraction: f64,
}

#[derive(Debug, Deserialize)]
struct RawFitnessReport {
    short: Option<f64>,
    med: Option<f64>,
    long: Option<f64>,
    length_fitness: Option<f64>,
    success_fraction: Option<f64>,
    length_correlation_avg: Option<f64>,
    chromosome_seconds_fraction: Option<f64>,
}

impl FitnessReport {
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, EvaluationError> {
        let raw: RawFitnessReport =
            serde_saphyr::from_str(text).map_err(|e| EvaluationError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let required = |value: Option<f64>, key: &'static str| {
            value.ok_or_else(|| EvaluationError::MissingKey {
                path: path.to_path_buf(),
                key,
            })
        };
        Ok(Self {
            short: required(raw.short, "short")?,
            med: required(raw.med, "med")?,
            long: required(raw.long, "long")?,
            length_fitness: required(raw.length_fitness, "length_fitness")?,
            success_fraction: required(raw.success_fraction, "success_fraction")?,
            length_correlation_avg: required(raw.length_correlation_avg, "length_correlation_avg")?,
            chromosome_seconds_fraction: raw.chromosome_seconds_fraction.unwrap_or(0.0),
        })
    }

    pub fn read(path: &Path) -> Result<Self, EvaluationError> {
        let text = fs::read_to_string(path).map_err(|e| EvaluationError::MissingResult {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&text, path)
    }

    /// Mean of the short, medium and long sub-scores
    pub fn length_score(&self) -> f64 {
        (self.short + self.med + self.long) / 3.0
    }

    pub fn total(&self) -> f64 {
        self.length_score()
            + self.length_correlation_avg
            + self.chromosome_seconds_fraction
            + self.success_fraction
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("SpindleAnalysis")
}

fn default_tool_args() -> Vec<String> {
    ["--sim", "-R", "-F", "-d"].map(String::from).to_vec()
}

fn default_result_path() -> PathBuf {
    PathBuf::from("data").join("fitness_final.yaml")
}

/// Runs `<program> <args...> <sim_dir>` and reads the result file.
///
/// The result file is authoritative: a non-zero exit is only logged when the
/// file was written, and reported as [`EvaluationError::ToolFailed`] when it
/// was not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTool {
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Simulation mode, recompute, force, then the directory flag
    #[serde(default = "default_tool_args")]
    pub args: Vec<String>,
    /// Relative to the simulation directory
    #[serde(default = "default_result_path")]
    pub result_path: PathBuf,
}

impl Default for AnalysisTool {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_tool_args(),
            result_path: default_result_path(),
        }
    }
}

impl AnalysisTool {
    pub fn run(&self, sim_dir: &Path) -> Result<FitnessReport, EvaluationError> {
        let program = self.program.display().to_string();
        debug!("running {} {} {}", program, self.args.join(" "), sim_dir.display());

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(sim_dir)
            .status()
            .map_err(|e| EvaluationError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        let result = sim_dir.join(&self.result_path);
        if !status.success() {
            if !result.is_file() {
                return Err(EvaluationError::ToolFailed {
                    program,
                    dir: sim_dir.to_path_buf(),
                    code: status.code(),
                });
            }
            warn!(
                "{} exited with {:?} on {}, using its result anyway",
                program,
                status.code(),
                sim_dir.display()
            );
        }

        FitnessReport::read(&result)
    }
}

impl FitnessEvaluator for AnalysisTool {
    fn evaluate(&mut self, sim_dir: &Path, _position: &[f64]) -> Result<f64, EvaluationError> {
        let report = self.run(sim_dir)?;
        info!(
            "{}: length {:.3} correlation {:.3} chromosome {:.3} success {:.3} (length_fitness {:.3})",
            sim_dir.display(),
            report.length_score(),
            report.length_correlation_avg,
            report.chromosome_seconds_fraction,
            report.success_fraction,
            report.length_fitness
        );
        Ok(report.total())
    }
}

/// Centre and width of one synthetic fitness peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBump {
    pub mu: f64,
    pub sigma: f64,
}

impl GaussianBump {
    pub fn value(&self, x: f64) -> f64 {
        (-(x - self.mu).powi(2) / (2.0 * self.sigma.powi(2))).exp()
    }
}

/// Product of independent Gaussian bumps over the leading dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianBumps {
    pub bumps: Vec<GaussianBump>,
}

impl Default for GaussianBumps {
    fn default() -> Self {
        Self {
            bumps: vec![
                GaussianBump {
                    mu: 184.0,
                    sigma: 20.0,
                },
                GaussianBump {
                    mu: 80.0,
                    sigma: 80.0,
                },
                GaussianBump {
                    mu: 110.0,
                    sigma: 40.0,
                },
            ],
        }
    }
}

impl FitnessEvaluator for GaussianBumps {
    fn evaluate(&mut self, _sim_dir: &Path, position: &[f64]) -> Result<f64, EvaluationError> {
        if position.len() < self.bumps.len() {
            return Err(EvaluationError::Position {
                needed: self.bumps.len(),
                found: position.len(),
            });
        }
        Ok(self
            .bumps
            .iter()
            .zip(position)
            .map(|(bump, &x)| bump.value(x))
            .product())
    }
}

/// Any closure over the position vector
pub struct FnEvaluator<F>(pub F);

impl<F> FitnessEvaluator for FnEvaluator<F>
where
    F: FnMut(&[f64]) -> f64,
{
    fn evaluate(&mut self, _sim_dir: &Path, position: &[f64]) -> Result<f64, EvaluationError> {
        Ok((self.0)(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FULL: &str = "short: 0.9\nmed: 0.6\nlong: 0.3\nlength_fitness: 0.7\n\
                        success_fraction: 0.5\nlength_correlation_avg: 0.25\n\
                        chromosome_seconds_fraction: 0.1\n";

    #[test]
    fn test_total_fitness() {
        let report = FitnessReport::from_yaml(FULL, Path::new("f.yaml")).unwrap();
        assert!((report.length_score() - 0.6).abs() < 1e-12);
        // 0.6 + 0.25 + 0.1 + 0.5, length_fitness excluded
        assert!((report.total() - 1.45).abs() < 1e-12);
    }

    #[test]
    fn test_chromosome_fraction_optional() {
        let text = "short: 1\nmed: 1\nlong: 1\nlength_fitness: 0\n\
                    success_fraction: 1\nlength_correlation_avg: 0.5\nextra: [1, 2]\n";
        let report = FitnessReport::from_yaml(text, Path::new("f.yaml")).unwrap();
        assert_eq!(report.chromosome_seconds_fraction, 0.0);
        assert!((report.total() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_key() {
        let text = "short: 1\nmed: 1\nlong: 1\nlength_fitness: 0\nsuccess_fraction: 1\n";
        match FitnessReport::from_yaml(text, Path::new("f.yaml")) {
            Err(EvaluationError::MissingKey { key, .. }) => {
                assert_eq!(key, "length_correlation_avg")
            }
            other => panic!("expected missing key, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_result_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FitnessReport::read(&dir.path().join("data/fitness_final.yaml")),
            Err(EvaluationError::MissingResult { .. })
        ));
    }

    #[test]
    fn test_unlaunchable_tool() {
        let dir = tempdir().unwrap();
        let mut tool = AnalysisTool {
            program: dir.path().join("no-such-analysis-tool"),
            ..Default::default()
        };
        assert!(matches!(
            tool.evaluate(dir.path(), &[]),
            Err(EvaluationError::Spawn { .. })
        ));
    }

    /// Shell stand-in for the analysis tool: records its arguments, writes
    /// `FULL` as the result unless told not to, then exits with `code`.
    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, write_result: bool, code: i32) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let result = if write_result {
            format!("mkdir -p \"$sim/data\"\ncat > \"$sim/data/fitness_final.yaml\" <<'EOF'\n{FULL}EOF\n")
        } else {
            String::new()
        };
        let script = format!(
            "#!/bin/sh\nfor sim; do :; done\nprintf '%s\\n' \"$@\" > \"$sim/args.txt\"\n{result}exit {code}\n"
        );
        let path = dir.join(name);
        {
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(script.as_bytes()).unwrap();
            file.sync_all().unwrap();
        }
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_invocation_and_result() {
        let dir = tempdir().unwrap();
        let sim = dir.path().join("abc123");
        fs::create_dir(&sim).unwrap();
        let mut tool = AnalysisTool {
            program: fake_tool(dir.path(), "analyze.sh", true, 0),
            ..Default::default()
        };

        let total = tool.evaluate(&sim, &[1.0, 2.0]).unwrap();
        assert!((total - 1.45).abs() < 1e-12);

        let args = fs::read_to_string(sim.join("args.txt")).unwrap();
        let args: Vec<&str> = args.lines().collect();
        let sim_arg = sim.display().to_string();
        assert_eq!(args, vec!["--sim", "-R", "-F", "-d", sim_arg.as_str()]);

        // a failing exit still yields the written result
        tool.program = fake_tool(dir.path(), "analyze-exit.sh", true, 3);
        let total = tool.evaluate(&sim, &[1.0, 2.0]).unwrap();
        assert!((total - 1.45).abs() < 1e-12);
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_without_result() {
        let dir = tempdir().unwrap();
        let sim = dir.path().join("def456");
        fs::create_dir(&sim).unwrap();

        let mut silent = AnalysisTool {
            program: fake_tool(dir.path(), "silent.sh", false, 0),
            ..Default::default()
        };
        assert!(matches!(
            silent.evaluate(&sim, &[]),
            Err(EvaluationError::MissingResult { .. })
        ));

        let mut crashed = AnalysisTool {
            program: fake_tool(dir.path(), "crashed.sh", false, 2),
            ..Default::default()
        };
        match crashed.evaluate(&sim, &[]) {
            Err(EvaluationError::ToolFailed { code, .. }) => assert_eq!(code, Some(2)),
            other => panic!("expected tool failure, got {other:?}"),
        }
    }

    #[test]
    fn test_gaussian_bumps_peak() {
        let mut bumps = GaussianBumps::default();
        let peak = bumps
            .evaluate(Path::new("."), &[184.0, 80.0, 110.0])
            .unwrap();
        assert!((peak - 1.0).abs() < 1e-12);
        let off = bumps
            .evaluate(Path::new("."), &[164.0, 80.0, 110.0])
            .unwrap();
        assert!((off - (-0.5f64).exp()).abs() < 1e-12);
        assert!(bumps.evaluate(Path::new("."), &[1.0, 2.0]).is_err());
    }
}
