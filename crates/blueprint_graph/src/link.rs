// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use crate::pin::PinId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a link
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub String);

impl LinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(format!("link-{}", Uuid::new_v4().simple()))
    }

    /// The raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for LinkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directed link from an output pin to an input pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Output pin the link starts at
    pub start: PinId,
    /// Input pin the link ends at
    pub end: PinId,
}

impl Link {
    /// Create a new link with a fresh ID
    pub fn new(start: PinId, end: PinId) -> Self {
        Self {
            id: LinkId::new(),
            start,
            end,
        }
    }

    /// Check if this link touches a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.start.node == *node_id || self.end.node == *node_id
    }

    /// Check if this link touches a specific pin
    pub fn involves_pin(&self, pin_id: &PinId) -> bool {
        self.start == *pin_id || self.end == *pin_id
    }

    /// The endpoint opposite `pin_id`, if the link touches it
    pub fn other_end(&self, pin_id: &PinId) -> Option<&PinId> {
        if self.start == *pin_id {
            Some(&self.end)
        } else if self.end == *pin_id {
            Some(&self.start)
        } else {
            None
        }
    }
}
