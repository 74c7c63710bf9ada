// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner settings.
//!
//! Settings are a RON document naming the script to run, how often to tick
//! it, and the data model entries the script can bind to.

use crate::error::RunnerError;
use lumen_nodescript::{DataModelPath, MemoryDataModel, Value, ValueType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file used when none is given
pub const SETTINGS_FILE_NAME: &str = "lumen.ron";

/// One data model entry to create before the script loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataModelEntry {
    /// Full path of the entry
    pub path: DataModelPath,
    /// Declared type
    pub value_type: ValueType,
    /// Initial value
    pub value: Value,
}

/// Runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Settings format version
    pub version: u32,
    /// Ticks per second
    pub frame_rate: u32,
    /// Script file, relative to the settings file
    pub script: PathBuf,
    /// Result type of the script; scripts without one have no exit node
    pub result_type: Option<ValueType>,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Frames between result log lines (0 disables them)
    pub log_every: u64,
    /// Initial data model
    pub data_model: Vec<DataModelEntry>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            frame_rate: 30,
            script: PathBuf::from("script.json"),
            result_type: None,
            max_frames: None,
            log_every: 30,
            data_model: Vec::new(),
        }
    }
}

impl RunnerSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunnerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse settings from RON, checking version and frame rate
    pub fn parse(content: &str) -> Result<Self, RunnerError> {
        let settings: RunnerSettings = ron::from_str(content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(RunnerError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        if settings.frame_rate == 0 {
            return Err(RunnerError::InvalidFrameRate);
        }

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), RunnerError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content).map_err(|source| RunnerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Time between two ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    /// Create every configured entry in `model`
    pub fn seed(&self, model: &MemoryDataModel) -> Result<(), RunnerError> {
        for entry in &self.data_model {
            model.insert(&entry.path, entry.value_type.clone(), entry.value.clone())?;
        }
        tracing::debug!("Seeded {} data model entries", self.data_model.len());
        Ok(())
    }
}
