//! Simulation directory creation
//!
//! A simulation directory is named either by the joined directory fragments
//! of its parameter values (`Named`) or by the SHA-256 of that joined string
//! (`ContentAddressed`). Content-addressed directories are logged to
//! `gen<N>_database.txt`, the only way back from a hash to its values. The
//! database header names each column by its parameter's format rule, so
//! headers stay readable by tools written against older databases.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::DirectoryError;
use crate::parameter::{ParameterSpec, ValueSource};
use crate::seeds::{SeedEnumerator, SeedOptions};
use crate::template::{Bindings, ConfigTemplate};

const NAME_SEPARATOR: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    Named,
    #[default]
    ContentAddressed,
}

impl NamingPolicy {
    pub fn dir_name(&self, sim_name: &str) -> String {
        match self {
            NamingPolicy::Named => sim_name.to_string(),
            NamingPolicy::ContentAddressed => content_hash(sim_name),
        }
    }
}

/// Hex SHA-256 of a joined simulation name
pub fn content_hash(sim_name: &str) -> String {
    format!("{:x}", Sha256::digest(sim_name.as_bytes()))
}

/// Joined fragments, one per source, each at its own index
pub fn sim_name<S: ValueSource>(
    sources: &[S],
    indices: &[usize],
) -> Result<String, DirectoryError> {
    let fragments = sources
        .iter()
        .zip(indices)
        .map(|(source, &index)| source.fragment(index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fragments.join(NAME_SEPARATOR))
}

pub fn database_path(dir: &Path, generation: usize) -> PathBuf {
    dir.join(format!("gen{generation}_database.txt"))
}

/// One line of a generation database
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRow {
    pub values: Vec<String>,
    pub hash: String,
}

/// Data rows of a generation database, header skipped
pub fn read_database(path: &Path) -> Result<Vec<DatabaseRow>, DirectoryError> {
    let content = fs::read_to_string(path).map_err(|e| DirectoryError::io(path, e))?;
    let mut rows = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let mut fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let Some(hash) = fields.pop() else {
            continue;
        };
        if number == 0 && hash == "hash" {
            continue;
        }
        if fields.is_empty() {
            return Err(DirectoryError::Database {
                path: path.to_path_buf(),
                line: number + 1,
            });
        }
        rows.push(DatabaseRow {
            values: fields,
            hash,
        });
    }
    Ok(rows)
}

/// A freshly created simulation directory
#[derive(Debug, Clone)]
pub struct SimDirectory {
    pub path: PathBuf,
    /// Joined fragments the directory name derives from
    pub sim_name: String,
    pub seed_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryBuilder {
    pub policy: NamingPolicy,
    pub seeds: SeedEnumerator,
    pub template: ConfigTemplate,
    pub options: SeedOptions,
}

impl DirectoryBuilder {
    pub fn new(policy: NamingPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn with_seeds(mut self, seeds: SeedEnumerator) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_template(mut self, template: ConfigTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_options(mut self, options: SeedOptions) -> Self {
        self.options = options;
        self
    }

    /// Start a generation database with its header of format rules, truncating
    /// any previous file. A parameter without a rule is named by its label.
    pub fn write_database_header(
        &self,
        dir: &Path,
        generation: usize,
        specs: &[ParameterSpec],
    ) -> Result<PathBuf, DirectoryError> {
        fs::create_dir_all(dir).map_err(|e| DirectoryError::io(dir, e))?;
        let columns: Vec<&str> = specs
            .iter()
            .map(|s| match s.format_rule.as_str() {
                "" => s.label.as_str(),
                rule => rule,
            })
            .collect();
        let path = database_path(dir, generation);
        fs::write(&path, format!("{} hash\n", columns.join(" ")))
            .map_err(|e| DirectoryError::io(&path, e))?;
        Ok(path)
    }

    /// Create one simulation directory from `specs[d].values[indices[d]]`.
    pub fn create(
        &self,
        dir: &Path,
        generation: usize,
        specs: &[ParameterSpec],
        indices: &[usize],
    ) -> Result<SimDirectory, DirectoryError> {
        fs::create_dir_all(dir).map_err(|e| DirectoryError::io(dir, e))?;

        let mut bindings = Bindings::new();
        let mut raw_values = Vec::with_capacity(specs.len());
        for (spec, &index) in specs.iter().zip(indices) {
            let (label, raw) = spec.push_value(index)?;
            raw_values.push(raw.clone());
            bindings.insert(label, raw);
        }

        let sim_name = sim_name(specs, indices)?;
        let dir_name = self.policy.dir_name(&sim_name);

        if self.policy == NamingPolicy::ContentAddressed {
            let db_path = database_path(dir, generation);
            let mut db = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&db_path)
                .map_err(|e| DirectoryError::io(&db_path, e))?;
            writeln!(db, "{} {}", raw_values.join(" "), dir_name)
                .map_err(|e| DirectoryError::io(&db_path, e))?;
        }

        let path = dir.join(&dir_name);
        fs::create_dir(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => DirectoryError::Conflict(path.clone()),
            _ => DirectoryError::io(&path, e),
        })?;
        match self.policy {
            NamingPolicy::Named => info!("   {}", path.display()),
            NamingPolicy::ContentAddressed => info!("   {} (from {})", path.display(), sim_name),
        }

        let seed_dirs = self
            .seeds
            .materialize(&path, &self.template, &bindings, &self.options)?;

        Ok(SimDirectory {
            path,
            sim_name,
            seed_dirs,
        })
    }
}
