// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compile pass: applies queued variable renames, then validates the graph.
//!
//! Validation never fails with an error value. Problems accumulate as
//! [`CompileMessage`]s and decide whether the graph may run.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::registry::NodeRegistry;
use crate::variable::{VariableAccess, VariableStore};
use indexmap::IndexMap;

/// Compile state of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileState {
    /// Edited since the last compile
    #[default]
    Dirty,
    /// Compile in progress
    Compiling,
    /// Last compile found no errors
    Valid,
    /// Last compile found errors
    Invalid,
}

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something was repaired
    Info,
    /// Blocks running the graph
    Error,
}

/// Problem found (or fixed) during validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileIssue {
    /// Get/Set node whose variable no longer exists
    #[error("'{node_key}' references missing variable '{name}'")]
    MissingVariable {
        /// Node key
        node_key: String,
        /// Variable name taken from the key
        name: String,
    },

    /// Stale Get/Set node retargeted through its variable ID
    #[error("Repaired variable reference '{old_key}' -> '{new_key}'")]
    RepairedVariableReference {
        /// Key before repair
        old_key: String,
        /// Key after repair
        new_key: String,
    },

    /// Extra instance of a single-instance node
    #[error("Only one '{title}' node is allowed ({key})")]
    DuplicateSingleton {
        /// Template key
        key: String,
        /// Node title
        title: String,
    },

    /// Two custom events share a name
    #[error("Custom event name '{title}' is used more than once")]
    DuplicateCustomEvent {
        /// Shared title
        title: String,
    },
}

/// A validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileMessage {
    /// Severity
    pub severity: Severity,
    /// Node concerned
    pub node: Option<NodeId>,
    /// What was found
    pub issue: CompileIssue,
}

/// Tracks compile state and the messages of the last validation
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    state: CompileState,
    messages: Vec<CompileMessage>,
    error_count: usize,
}

impl Compiler {
    /// Create a compiler in the dirty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the graph as edited
    pub fn mark_dirty(&mut self) {
        self.state = CompileState::Dirty;
    }

    /// Current state
    pub fn state(&self) -> CompileState {
        self.state
    }

    /// Whether the last compile succeeded and nothing changed since
    pub fn can_run(&self) -> bool {
        self.state == CompileState::Valid
    }

    /// Whether the graph changed since the last compile
    pub fn is_dirty(&self) -> bool {
        self.state == CompileState::Dirty
    }

    /// Messages of the last validation
    pub fn messages(&self) -> &[CompileMessage] {
        &self.messages
    }

    /// Errors found by the last validation
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Apply queued renames, validate, and settle on `Valid` or `Invalid`.
    ///
    /// Returns whether the graph is valid.
    pub fn compile(&mut self, graph: &mut Graph, registry: &NodeRegistry, variables: &mut VariableStore) -> bool {
        self.state = CompileState::Compiling;

        for rename in variables.drain_pending_renames() {
            let updated = graph.update_variable_nodes(&rename, registry);
            tracing::debug!("Applied rename '{}' -> '{}' to {} node(s)", rename.old_name, rename.new_name, updated);
        }

        let valid = self.validate(graph, registry, variables);
        self.state = if valid { CompileState::Valid } else { CompileState::Invalid };
        graph.request_full_redraw();
        tracing::info!("Compile finished: {} error(s)", self.error_count);
        valid
    }

    /// Check the graph and repair what can be repaired. Messages are rebuilt
    /// from scratch on every call.
    ///
    /// Returns `true` when no errors were found.
    pub fn validate(&mut self, graph: &mut Graph, registry: &NodeRegistry, variables: &VariableStore) -> bool {
        self.messages.clear();
        self.error_count = 0;

        let node_ids: Vec<NodeId> = graph.node_ids().cloned().collect();
        let mut singletons: IndexMap<String, usize> = IndexMap::new();
        let mut custom_events: IndexMap<String, usize> = IndexMap::new();

        for node_id in &node_ids {
            if !self.check_variable_reference(graph, registry, variables, node_id) {
                continue;
            }
            let Some(node) = graph.node(node_id) else {
                continue;
            };

            if registry.get(node.node_key()).is_some_and(|t| t.is_singleton) {
                let seen = singletons.entry(node.node_key().to_string()).or_insert(0);
                *seen += 1;
                if *seen > 1 {
                    let issue = CompileIssue::DuplicateSingleton {
                        key: node.node_key().to_string(),
                        title: node.title.clone(),
                    };
                    self.error(Some(node_id.clone()), issue);
                }
            }

            if node.supports_dynamic_pins() {
                let seen = custom_events.entry(node.title.clone()).or_insert(0);
                *seen += 1;
                if *seen > 1 {
                    let issue = CompileIssue::DuplicateCustomEvent { title: node.title.clone() };
                    self.error(Some(node_id.clone()), issue);
                }
            }
        }

        self.error_count == 0
    }

    /// Returns `false` when the node references a variable that cannot be found.
    ///
    /// A node carrying a variable ID is checked against that variable only: a
    /// stale name is moved to the variable's current one, and an ID that no
    /// longer resolves is an error even if some other variable has the name.
    fn check_variable_reference(
        &mut self,
        graph: &mut Graph,
        registry: &NodeRegistry,
        variables: &VariableStore,
        node_id: &NodeId,
    ) -> bool {
        let Some(node) = graph.node(node_id) else {
            return false;
        };
        let Some((access, name)) = VariableAccess::parse(node.node_key()) else {
            return true;
        };
        let bound = match &node.variable_id {
            Some(id) => variables.get(id),
            None => variables.by_name(name),
        };
        let Some(variable) = bound else {
            let issue = CompileIssue::MissingVariable {
                node_key: node.node_key().to_string(),
                name: name.to_string(),
            };
            self.error(Some(node_id.clone()), issue);
            return false;
        };
        if variable.name == name {
            return true;
        }

        let old_key = node.node_key().to_string();
        let new_key = access.key_for(&variable.name);
        graph.retarget_node(node_id, &new_key, registry);
        tracing::info!("Repaired variable reference {} -> {}", old_key, new_key);
        self.messages.push(CompileMessage {
            severity: Severity::Info,
            node: Some(node_id.clone()),
            issue: CompileIssue::RepairedVariableReference { old_key, new_key },
        });
        true
    }

    fn error(&mut self, node: Option<NodeId>, issue: CompileIssue) {
        tracing::warn!("Compile error: {}", issue);
        self.messages.push(CompileMessage {
            severity: Severity::Error,
            node,
            issue,
        });
        self.error_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::blueprint::create_blueprint_registry;
    use crate::node::Node;
    use crate::pin::PinType;

    #[test]
    fn test_empty_graph_is_valid() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut variables = VariableStore::new();
        let mut compiler = Compiler::new();
        assert_eq!(compiler.state(), CompileState::Dirty);
        assert!(compiler.compile(&mut graph, &registry, &mut variables));
        assert!(compiler.can_run());

        compiler.mark_dirty();
        assert!(!compiler.can_run());
    }

    #[test]
    fn test_duplicate_singleton_is_error() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut variables = VariableStore::new();
        let template = registry.get("EventBeginPlay").unwrap();
        graph.insert_node(Node::new(template));
        graph.insert_node(Node::new(template));
        graph.insert_node(Node::new(template));

        let mut compiler = Compiler::new();
        assert!(!compiler.compile(&mut graph, &registry, &mut variables));
        assert_eq!(compiler.state(), CompileState::Invalid);
        assert_eq!(compiler.error_count(), 2);
    }

    #[test]
    fn test_custom_event_title_collision() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let variables = VariableStore::new();
        let a = graph.add_node(&registry, "CustomEvent", 0.0, 0.0).unwrap();
        let b = graph.add_node(&registry, "CustomEvent", 0.0, 100.0).unwrap();

        let mut compiler = Compiler::new();
        assert!(!compiler.validate(&mut graph, &registry, &variables));
        assert_eq!(
            compiler.messages()[0].issue,
            CompileIssue::DuplicateCustomEvent { title: "Custom Event".to_string() }
        );

        graph.node_mut(&b).unwrap().title = "OnReset".to_string();
        assert!(compiler.validate(&mut graph, &registry, &variables));
        assert!(compiler.messages().is_empty());
        assert_eq!(graph.node(&a).unwrap().title, "Custom Event");
    }

    #[test]
    fn test_validate_repairs_stale_key_by_id() {
        let mut registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut variables = VariableStore::new();
        let id = variables.create_variable("Speed", PinType::Float, &mut registry).unwrap();
        let node = graph.add_node(&registry, "Set_Speed", 0.0, 0.0).unwrap();
        variables.rename_variable(&id, "Velocity", &mut registry).unwrap();

        let mut compiler = Compiler::new();
        assert!(compiler.validate(&mut graph, &registry, &variables));
        assert_eq!(compiler.messages()[0].severity, Severity::Info);
        assert_eq!(graph.node(&node).unwrap().node_key(), "Set_Velocity");
    }
}
