use std::path::PathBuf;

use thiserror::Error;

use crate::swarm::SwarmPhase;

/// Errors raised while defining or generating parameter values
#[derive(Debug, Error)]
pub enum ParameterError {
    /// A generator was asked for values outside its mathematical domain
    #[error("domain error: {0}")]
    Domain(String),

    /// The parameter is missing something an operation requires (usually bounds)
    #[error("configuration error for parameter '{label}': {reason}")]
    Configuration { label: String, reason: String },

    #[error("invalid format rule '{rule}': {reason}")]
    FormatRule { rule: String, reason: &'static str },

    #[error("invalid generator expression '{expr}': {reason}")]
    GeneratorExpression { expr: String, reason: String },

    #[error("parameter '{label}' has no value at index {index} (holds {len})")]
    IndexOutOfRange {
        label: String,
        index: usize,
        len: usize,
    },
}

impl ParameterError {
    pub(crate) fn configuration(label: &str, reason: impl Into<String>) -> Self {
        ParameterError::Configuration {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{file}' references unbound placeholder '{name}'")]
    Unbound { file: String, name: String },

    #[error("template '{file}' has an unterminated placeholder")]
    Unterminated { file: String },
}

/// Errors raised while materializing simulation directories
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The target directory already exists
    #[error("simulation directory already exists: {}", .0.display())]
    Conflict(PathBuf),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed database line {line} in {}", path.display())]
    Database { path: PathBuf, line: usize },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

impl DirectoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DirectoryError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while computing a particle's fitness
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to launch analysis tool '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis tool '{program}' failed on {} (exit code {code:?})", dir.display())]
    ToolFailed {
        program: String,
        dir: PathBuf,
        code: Option<i32>,
    },

    #[error("fitness result {} could not be read: {source}", path.display())]
    MissingResult {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fitness result {} could not be parsed: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("fitness result {} is missing required key '{key}'", path.display())]
    MissingKey { path: PathBuf, key: &'static str },

    #[error("mock fitness needs {needed} position values, particle has {found}")]
    Position { needed: usize, found: usize },
}

/// Errors raised by the particle swarm engine
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("swarm needs at least one parameter and one particle")]
    Empty,

    #[error("swarm is {found:?}, operation requires {expected}")]
    Phase {
        expected: &'static str,
        found: SwarmPhase,
    },

    #[error("expected {expected} values, found {found}")]
    Shape { expected: usize, found: usize },

    #[error("particle {id} does not exist (swarm has {count})")]
    UnknownParticle { id: usize, count: usize },

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}

/// Top-level error for campaign driving
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Swarm(#[from] SwarmError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("no parameters defined")]
    NoParameters,

    #[error("particle count unknown: no literal values and none configured")]
    ParticleCount,
}

/// Errors raised while loading a campaign file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("campaign file {} could not be read: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid campaign file: {0}")]
    Yaml(String),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Campaign(#[from] CampaignError),
}
