// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reading and writing graph documents.
//!
//! This is the boundary where corrupt data becomes an error. The graph core
//! itself only skips what it cannot use.

use blueprint_graph::{Blueprint, GraphState, LoadReport, SelectMode};
use std::path::Path;

/// Error reading or writing editor files
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Graph document is not valid JSON
    #[error("Invalid graph document: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings file could not be parsed
    #[error("Invalid settings: {0}")]
    RonParse(#[from] ron::error::SpannedError),
}

/// Read a graph document
pub fn load_graph(path: &Path) -> Result<GraphState, PersistenceError> {
    let content = std::fs::read_to_string(path)?;
    Ok(GraphState::from_json(&content)?)
}

/// Write a graph document
pub fn save_graph(path: &Path, state: &GraphState) -> Result<(), PersistenceError> {
    let content = state.to_json()?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Write `blueprint` back to `path`. Node positions are only changed when a
/// snap grid is given.
pub fn write_back(blueprint: &mut Blueprint, path: &Path, snap_grid: Option<f32>) -> Result<(), PersistenceError> {
    if let Some(grid) = snap_grid {
        let selection = blueprint.graph.selected_nodes().to_vec();
        blueprint.select_all();
        blueprint.snap_selected_to_grid(grid);
        blueprint.graph.clear_selection();
        for node_id in &selection {
            blueprint.select_node(node_id, SelectMode::Add);
        }
    }
    save_graph(path, &blueprint.save_state())
}

/// Load a document into `blueprint`, or reset it to the starter graph when
/// the file is missing or corrupt.
///
/// Returns the load report when the file was used.
pub fn load_or_default(blueprint: &mut Blueprint, path: &Path) -> Option<LoadReport> {
    match load_graph(path) {
        Ok(state) => Some(blueprint.load_state(&state)),
        Err(PersistenceError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No graph at {}; starting from the default graph", path.display());
            blueprint.reset_to_default_graph();
            None
        }
        Err(err) => {
            tracing::error!("Failed to load {}: {}; starting from the default graph", path.display(), err);
            blueprint.reset_to_default_graph();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("blueprint-{}.{ext}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("json");
        let mut blueprint = Blueprint::default_graph();
        blueprint.create_variable("Lives", blueprint_graph::PinType::Int).unwrap();
        save_graph(&path, &blueprint.save_state()).unwrap();

        let mut restored = Blueprint::default();
        let report = load_or_default(&mut restored, &path).unwrap();
        assert_eq!(report.nodes_loaded, 2);
        assert_eq!(report.links_loaded, 1);
        assert!(restored.variables.by_name("Lives").is_some());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_back_snaps_only_on_request() {
        let path = temp_path("json");
        let mut blueprint = Blueprint::default();
        let branch = blueprint.add_node("Branch", 13.0, 29.0).unwrap();

        write_back(&mut blueprint, &path, None).unwrap();
        let saved = &load_graph(&path).unwrap().nodes[0];
        assert_eq!((saved.x, saved.y), (13.0, 29.0));

        write_back(&mut blueprint, &path, Some(16.0)).unwrap();
        let saved = &load_graph(&path).unwrap().nodes[0];
        assert_eq!((saved.x, saved.y), (16.0, 32.0));
        assert_eq!(blueprint.graph.node(&branch).unwrap().position, [16.0, 32.0]);
        assert!(blueprint.graph.selected_nodes().is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let path = temp_path("json");
        std::fs::write(&path, "{ nodes: [").unwrap();
        assert!(matches!(load_graph(&path), Err(PersistenceError::Json(_))));

        let mut blueprint = Blueprint::default();
        assert!(load_or_default(&mut blueprint, &path).is_none());
        assert_eq!(blueprint.graph.node_count(), 2);
        assert_eq!(blueprint.graph.link_count(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_falls_back() {
        let mut blueprint = Blueprint::default();
        assert!(load_or_default(&mut blueprint, &temp_path("json")).is_none());
        assert!(blueprint.compile());
    }
}
