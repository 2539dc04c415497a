// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings stored as RON next to the working directory.

use crate::persistence::PersistenceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "blueprint_editor.ron";

/// Editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Graph document to open
    pub graph_path: PathBuf,
    /// Write the graph back after compiling
    pub save_on_exit: bool,
    /// Snap node positions to the grid when the graph is written back
    pub snap_to_grid: bool,
    /// Grid size used by `snap_to_grid`
    pub grid_size: f32,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            graph_path: PathBuf::from("blueprint_graph.json"),
            save_on_exit: false,
            snap_to_grid: false,
            grid_size: 16.0,
            log_filter: "info,blueprint_graph=info,blueprint_editor_app=debug".to_string(),
        }
    }
}

impl EditorSettings {
    /// Grid to snap to on write-back, if snapping is enabled
    pub fn snap_grid(&self) -> Option<f32> {
        (self.snap_to_grid && self.grid_size > 0.0).then_some(self.grid_size)
    }

    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Load settings, falling back to defaults when the file is missing.
    ///
    /// A file that exists but cannot be parsed is reported as the second value
    /// so the caller can log it once logging is up.
    pub fn load_or_default(path: &Path) -> (Self, Option<PersistenceError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load(path) {
            Ok(settings) => (settings, None),
            Err(err) => (Self::default(), Some(err)),
        }
    }
}
