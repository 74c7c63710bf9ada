// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame-driven runner for Lumen node scripts.
//!
//! Loads runner settings (RON), seeds an in-memory data model, loads the
//! configured node script and ticks it once per frame.

pub mod error;
pub mod runner;
pub mod settings;

pub use error::RunnerError;
pub use runner::{RunSummary, Runner};
pub use settings::{DataModelEntry, RunnerSettings};
