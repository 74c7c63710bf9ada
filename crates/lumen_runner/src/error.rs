// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner errors.

use lumen_nodescript::datamodel::DataModelError;
use lumen_nodescript::ScriptError;
use std::path::PathBuf;

/// Error that stops the runner
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A file could not be read or written
    #[error("Failed to access {path}: {source}")]
    Io {
        /// The file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Settings are not valid RON
    #[error("Invalid settings: {0}")]
    Settings(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    SettingsWrite(#[from] ron::Error),

    /// Settings are newer than supported
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// Frame rate is zero
    #[error("Frame rate must be at least 1")]
    InvalidFrameRate,

    /// A data model entry could not be seeded
    #[error(transparent)]
    DataModel(#[from] DataModelError),

    /// The script file is not a valid script
    #[error("Invalid script file: {0}")]
    ScriptFormat(#[from] serde_json::Error),

    /// The script could not be loaded
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The async runtime could not start
    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
