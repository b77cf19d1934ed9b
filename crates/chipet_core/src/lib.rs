//! Parameter-sweep campaigns and particle swarm search over simulations
//!
//! This crate builds simulation campaigns on a shared filesystem:
//! - Parameter definitions with bounds, value generators and directory-name
//!   format rules
//! - One directory per parameter combination, named directly or by content
//!   hash with a per-generation database
//! - Repeat-seed subdirectories with rendered config templates and stage
//!   markers
//! - A particle swarm optimizer that scores each particle with an external
//!   analysis tool
//! - Versioned snapshots so a long search can be resumed
//!
//! # Example
//!
//! ```ignore
//! use chipet_core::{CampaignConfig, SwarmSnapshot};
//!
//! let config = CampaignConfig::load(Path::new("campaign.yaml"))?;
//! let mut campaign = config.into_campaign()?;
//! let mut evaluator = config.fitness.evaluator();
//! campaign.run(Path::new("run"), 20, Some(Path::new("run/swarm.json")), evaluator.as_mut())?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod campaign;
pub mod directory;
pub mod error;
pub mod fitness;
pub mod parameter;
pub mod scan;
pub mod seeds;
pub mod swarm;
pub mod template;

// ============================================================================
// Persistence modules
// ============================================================================

pub mod config;
pub mod io;
pub mod snapshot;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use campaign::{Campaign, ConflictPolicy, GenerationSummary, OptimizerKind};
pub use config::CampaignConfig;
pub use directory::{DirectoryBuilder, NamingPolicy};
pub use fitness::FitnessEvaluator;
pub use parameter::ParameterSpec;
pub use snapshot::SwarmSnapshot;
pub use swarm::{BiasRow, ParticleSwarm, SwarmConfig};
