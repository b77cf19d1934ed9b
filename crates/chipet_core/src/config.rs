//! Campaign file
//!
//! A campaign is described in YAML:
//!
//! ```yaml
//! parameters:
//!   - label: kd
//!     format: "kd{:.3f}"
//!     generator: { kind: uniform_random, bounds: [0.0, 1.0] }
//!   - format: "n{:d}"
//!     generator: "LinearSlice(bounds=[10, 100], n_vars=4)"
//! particle_count: 8
//! seeds: [0, 3]
//! naming: content_addressed
//! states: [configure, analyze]
//! template_files: [params.yaml]
//! swarm: { best_floor: 0.0, rng_seed: 42 }
//! ```
//!
//! Relative file paths are resolved against the campaign file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::campaign::{Campaign, ConflictPolicy, OptimizerKind};
use crate::directory::{DirectoryBuilder, NamingPolicy};
use crate::error::{ConfigError, ParameterError};
use crate::fitness::{AnalysisTool, FitnessEvaluator, GaussianBump, GaussianBumps};
use crate::parameter::{FormatRule, Generator, ParameterSpec, ValueType};
use crate::seeds::{SeedEnumerator, SeedOptions};
use crate::swarm::SwarmConfig;
use crate::template::ConfigTemplate;

/// A generator written either as a structured map or as legacy call syntax
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratorSource {
    Structured(Generator),
    Expression(String),
}

impl GeneratorSource {
    pub fn resolve(&self) -> Result<Generator, ParameterError> {
        match self {
            GeneratorSource::Structured(generator) => Ok(generator.clone()),
            GeneratorSource::Expression(expr) => Generator::parse(expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Defaults to the literal prefix of `format`
    #[serde(default)]
    pub label: Option<String>,
    pub format: String,
    #[serde(default)]
    pub generator: Option<GeneratorSource>,
    #[serde(default)]
    pub value_type: Option<ValueType>,
    #[serde(default)]
    pub values: Vec<f64>,
}

impl ParameterConfig {
    pub fn into_spec(self) -> Result<ParameterSpec, ParameterError> {
        let rule = FormatRule::parse(&self.format)?;
        let label = match self.label {
            Some(label) => label,
            None if !rule.prefix().is_empty() => rule.prefix().to_string(),
            None => {
                return Err(ParameterError::configuration(
                    &self.format,
                    "label required when the format has no literal prefix",
                ));
            }
        };

        let mut spec = ParameterSpec::new(label, rule);
        if let Some(value_type) = self.value_type {
            spec = spec.with_value_type(value_type);
        }
        if let Some(source) = &self.generator {
            spec = spec.with_generator(source.resolve()?);
        }
        spec.validate()?;
        Ok(spec.with_values(self.values))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitnessConfig {
    #[serde(default)]
    pub tool: AnalysisTool,
    /// Score positions with Gaussian bumps instead of running the tool
    #[serde(default)]
    pub mock: bool,
    /// Overrides the default bumps in mock mode
    #[serde(default)]
    pub bumps: Vec<GaussianBump>,
}

impl FitnessConfig {
    pub fn evaluator(&self) -> Box<dyn FitnessEvaluator> {
        if !self.mock {
            return Box::new(self.tool.clone());
        }
        if self.bumps.is_empty() {
            Box::new(GaussianBumps::default())
        } else {
            Box::new(GaussianBumps {
                bumps: self.bumps.clone(),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub parameters: Vec<ParameterConfig>,
    /// Used when no parameter lists literal values
    #[serde(default)]
    pub particle_count: Option<usize>,
    #[serde(default)]
    pub seeds: SeedEnumerator,
    #[serde(default)]
    pub naming: NamingPolicy,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub aux_files: Vec<PathBuf>,
    #[serde(default)]
    pub template_files: Vec<PathBuf>,
    #[serde(default)]
    pub fitness: FitnessConfig,
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub optimizer: OptimizerKind,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl CampaignConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config = Self::from_yaml(&yaml)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        debug!("loaded campaign {} ({} parameters)", path.display(), config.parameters.len());
        Ok(config)
    }

    /// Anchor relative input paths at `base`. A bare tool name is left for
    /// `PATH` lookup.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in self.aux_files.iter_mut().chain(self.template_files.iter_mut()) {
            resolve(base, path);
        }
        if self.fitness.tool.program.components().count() > 1 {
            resolve(base, &mut self.fitness.tool.program);
        }
    }

    pub fn specs(&self) -> Result<Vec<ParameterSpec>, ParameterError> {
        self.parameters
            .iter()
            .cloned()
            .map(ParameterConfig::into_spec)
            .collect()
    }

    pub fn builder(&self) -> Result<DirectoryBuilder, ConfigError> {
        let template = ConfigTemplate::load(&self.template_files)?;
        Ok(DirectoryBuilder::new(self.naming)
            .with_seeds(self.seeds)
            .with_template(template)
            .with_options(SeedOptions {
                aux_files: self.aux_files.clone(),
                states: self.states.clone(),
            }))
    }

    pub fn into_campaign(&self) -> Result<Campaign, ConfigError> {
        let mut campaign = Campaign::new(self.specs()?, self.builder()?)?
            .with_optimizer(self.optimizer)
            .with_swarm_config(self.swarm.clone())
            .with_conflict_policy(self.on_conflict);
        if let Some(count) = self.particle_count {
            campaign = campaign.with_particle_count(count);
        }
        Ok(campaign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Bounds;

    const CAMPAIGN: &str = r#"
parameters:
  - label: kd
    format: "kd{:.3f}"
    generator: { kind: uniform_random, bounds: [0.0, 1.0] }
  - format: "n{:d}"
    generator: "LinearSlice(bounds=[10, 100], n_vars=4)"
  - label: motors
    format: "m{:.1f}"
    values: [1.5, 2.5]
particle_count: 8
seeds: [0, 3]
naming: named
states: [configure]
aux_files: [fluid.txt]
fitness:
  mock: true
swarm:
  best_floor: -.inf
  rng_seed: 42
"#;

    #[test]
    fn test_parse_campaign() {
        let config = CampaignConfig::from_yaml(CAMPAIGN).unwrap();
        assert_eq!(config.particle_count, Some(8));
        assert_eq!(config.seeds, SeedEnumerator::new(0, 3));
        assert_eq!(config.naming, NamingPolicy::Named);
        assert_eq!(config.swarm.best_floor, f64::NEG_INFINITY);
        assert_eq!(config.swarm.inertia, 0.6);
        assert!(config.fitness.mock);
        assert_eq!(config.optimizer, OptimizerKind::ParticleSwarm);

        let specs = config.specs().unwrap();
        assert_eq!(specs[0].bounds(), Some(Bounds::new(0.0, 1.0)));
        assert_eq!(specs[1].label, "n");
        assert_eq!(specs[1].value_type, ValueType::Integer);
        assert!(matches!(
            specs[1].generator,
            Some(Generator::LinearSlice { count: 4, .. })
        ));
        assert_eq!(specs[2].len(), 2);
    }

    #[test]
    fn test_defaults() {
        let config = CampaignConfig::from_yaml("parameters: []\n").unwrap();
        assert_eq!(config.seeds, SeedEnumerator::new(0, 1));
        assert_eq!(config.naming, NamingPolicy::ContentAddressed);
        assert_eq!(config.swarm.best_floor, 0.0);
        assert_eq!(config.fitness.tool.program, PathBuf::from("SpindleAnalysis"));
        assert_eq!(config.on_conflict, ConflictPolicy::Abort);
    }

    #[test]
    fn test_label_required_without_prefix() {
        let param = ParameterConfig {
            label: None,
            format: "{:.2f}".to_string(),
            generator: None,
            value_type: None,
            values: vec![],
        };
        assert!(matches!(
            param.into_spec(),
            Err(ParameterError::Configuration { .. })
        ));
    }

    #[test]
    fn test_infinite_bounds_rejected_on_load() {
        for generator in [
            r#""UniformRandom(bounds=[0, inf])""#,
            r#""LinearSlice(bounds=[-inf, 1], n_vars=3)""#,
        ] {
            let yaml = format!("parameters:\n  - format: \"x{{:.2f}}\"\n    generator: {generator}\n");
            let config = CampaignConfig::from_yaml(&yaml).unwrap();
            assert!(
                matches!(config.specs(), Err(ParameterError::Configuration { .. })),
                "{generator} accepted"
            );
        }
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = CampaignConfig::from_yaml(CAMPAIGN).unwrap();
        config.fitness.tool.program = PathBuf::from("bin/analyze");
        config.resolve_paths(Path::new("/runs/a"));
        assert_eq!(config.aux_files, vec![PathBuf::from("/runs/a/fluid.txt")]);
        assert_eq!(config.fitness.tool.program, PathBuf::from("/runs/a/bin/analyze"));

        let mut bare = CampaignConfig::from_yaml("parameters: []\n").unwrap();
        bare.resolve_paths(Path::new("/runs/a"));
        assert_eq!(bare.fitness.tool.program, PathBuf::from("SpindleAnalysis"));
    }
}
