// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node templates.

use crate::node::{Node, NodeTemplate};
use indexmap::IndexMap;

/// Registry of available node types, keyed by template key.
///
/// Generated variable templates are replaced wholesale whenever a variable
/// changes, so callers look templates up again after every variable edit
/// instead of holding on to them.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    /// Registered templates by key
    templates: IndexMap<String, NodeTemplate>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Register a template, replacing any template with the same key
    pub fn register(&mut self, template: NodeTemplate) {
        self.templates.insert(template.key.clone(), template);
    }

    /// Remove a template
    pub fn unregister(&mut self, key: &str) -> Option<NodeTemplate> {
        self.templates.shift_remove(key)
    }

    /// Remove every template whose key matches `predicate`; returns how many went
    pub fn unregister_where(&mut self, mut predicate: impl FnMut(&str) -> bool) -> usize {
        let before = self.templates.len();
        self.templates.retain(|key, _| !predicate(key));
        before - self.templates.len()
    }

    /// Get a template by key
    pub fn get(&self, key: &str) -> Option<&NodeTemplate> {
        self.templates.get(key)
    }

    /// Whether a key is registered
    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    /// Get all registered templates
    pub fn templates(&self) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values()
    }

    /// Get templates in a palette category
    pub fn templates_in_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a NodeTemplate> + 'a {
        self.templates.values().filter(move |t| t.category == category)
    }

    /// Number of registered templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Create a detached node from a template key
    pub fn create_node(&self, key: &str) -> Option<Node> {
        self.get(key).map(Node::new)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
