//! Integration tests for the chipet campaign engine
//!
//! Tests are organized by topic:
//! - `generators` - Value generation properties
//! - `directories` - Sweep and shotgun directory layouts, generation databases
//! - `swarm_convergence` - End-to-end particle swarm search
//! - `campaign` - Generation loop through real directories
//! - `snapshot` - Save, load and resume

mod campaign;
mod snapshot;
