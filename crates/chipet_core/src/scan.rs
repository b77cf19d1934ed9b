//! Work-directory scanning
//!
//! Finds seed directories that still have processing stages to run. A stage
//! is requested by an empty `sim.<state>` marker file; a seed directory is
//! skipped while it holds a `.running` flag or after it was marked `.error`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::DirectoryError;

const MARKER_PREFIX: &str = "sim.";
/// Marker-shaped names that are outputs, not requested stages
const NON_STATES: [&str; 2] = ["err", "log"];

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, DirectoryError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| DirectoryError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DirectoryError::io(dir, e))?;
    entries.sort();
    Ok(entries)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Non-hidden subdirectories of every simulation directory.
///
/// `*.txt` arguments are generation databases and are skipped, so a shell
/// glob over a run directory can be passed straight in.
pub fn seed_directories<P: AsRef<Path>>(sim_dirs: &[P]) -> Result<Vec<PathBuf>, DirectoryError> {
    let mut seeds = Vec::new();
    for sim_dir in sim_dirs {
        let sim_dir = sim_dir.as_ref();
        if sim_dir.extension().is_some_and(|ext| ext == "txt") {
            debug!("skipping database {}", sim_dir.display());
            continue;
        }
        if !sim_dir.exists() {
            return Err(DirectoryError::io(
                sim_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "simulation directory not found"),
            ));
        }
        seeds.extend(
            sorted_entries(sim_dir)?
                .into_iter()
                .filter(|p| p.is_dir() && !is_hidden(p)),
        );
    }
    Ok(seeds)
}

/// Requested stages of one seed directory, sorted
pub fn pending_states(seed_dir: &Path) -> Result<Vec<String>, DirectoryError> {
    let states = sorted_entries(seed_dir)?
        .iter()
        .filter(|p| p.is_file())
        .filter_map(|p| p.file_name()?.to_str()?.strip_prefix(MARKER_PREFIX).map(str::to_string))
        .filter(|state| !state.is_empty() && !NON_STATES.contains(&state.as_str()))
        .collect();
    Ok(states)
}

pub fn is_running(seed_dir: &Path) -> bool {
    seed_dir.join(".running").exists()
}

pub fn is_error(seed_dir: &Path) -> bool {
    seed_dir.join(".error").exists()
}

/// Seed directories ready to run, with their pending stages.
///
/// With a `filter`, only those stages count.
pub fn runnable(
    seed_dirs: &[PathBuf],
    filter: Option<&[String]>,
) -> Result<Vec<(PathBuf, Vec<String>)>, DirectoryError> {
    let mut ready = Vec::new();
    for seed_dir in seed_dirs {
        if is_running(seed_dir) || is_error(seed_dir) {
            debug!("{} is busy or failed", seed_dir.display());
            continue;
        }
        let states: Vec<String> = pending_states(seed_dir)?
            .into_iter()
            .filter(|s| filter.is_none_or(|wanted| wanted.contains(s)))
            .collect();
        if !states.is_empty() {
            ready.push((seed_dir.clone(), states));
        }
    }
    Ok(ready)
}
