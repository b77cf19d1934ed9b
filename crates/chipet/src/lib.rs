//! Command-line front end for chipet campaigns
//!
//! Loads YAML campaign files, sets up run logging and dispatches to the
//! `chipet_core` campaign driver.

pub mod bias;
pub mod commands;
pub mod logging;

pub use logging::init_logging;
