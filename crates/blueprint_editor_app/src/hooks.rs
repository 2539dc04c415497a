// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host callbacks for the headless editor.

use blueprint_graph::{EditorHooks, Node, NodeId};
use std::cell::Cell;
use std::rc::Rc;

/// Logs what a UI would redraw and counts autosave requests
#[derive(Debug, Default)]
pub struct LoggingHooks {
    autosaves: Rc<Cell<usize>>,
}

impl LoggingHooks {
    /// Create hooks plus a handle to read the autosave count
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let autosaves = Rc::new(Cell::new(0));
        (
            Self {
                autosaves: Rc::clone(&autosaves),
            },
            autosaves,
        )
    }
}

impl EditorHooks for LoggingHooks {
    fn render_node(&mut self, node: &Node) {
        tracing::debug!("render {} '{}' at ({}, {})", node.id, node.title, node.x(), node.y());
    }

    fn remove_node(&mut self, node_id: &NodeId) {
        tracing::debug!("remove {}", node_id);
    }

    fn update_visuals(&mut self, node: &Node) {
        tracing::trace!("update visuals of {}", node.id);
    }

    fn redraw_all_wires(&mut self) {
        tracing::trace!("redraw all wires");
    }

    fn auto_save(&mut self) {
        self.autosaves.set(self.autosaves.get() + 1);
    }

    fn show_node_details(&mut self, node: &Node) {
        tracing::debug!("details for '{}'", node.title);
    }
}
