// SPDX-License-Identifier: MIT OR Apache-2.0
//! User variables and the Get/Set templates generated from them.
//!
//! Edits follow two paths. Type and container changes apply to the graph
//! immediately, because they can invalidate links. Renames only relabel
//! nodes, so they are queued and applied in one batch when the graph is
//! compiled.

use crate::graph::Graph;
use crate::node::{NodeKind, NodeTemplate};
use crate::pin::{ContainerType, PinTemplate, PinType, PinValue};
use crate::registry::NodeRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// Key prefix of generated getter templates
pub const GET_PREFIX: &str = "Get_";
/// Key prefix of generated setter templates
pub const SET_PREFIX: &str = "Set_";

/// Unique identifier for a variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub String);

impl VariableId {
    /// Create a new random variable ID
    pub fn new() -> Self {
        Self(format!("var-{}", Uuid::new_v4().simple()))
    }
}

impl Default for VariableId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for VariableId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a generated node reads or writes its variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableAccess {
    /// `Get_<name>`
    Get,
    /// `Set_<name>`
    Set,
}

impl VariableAccess {
    /// Split a template key into access kind and variable name
    pub fn parse(key: &str) -> Option<(Self, &str)> {
        if let Some(name) = key.strip_prefix(GET_PREFIX) {
            Some((Self::Get, name))
        } else {
            key.strip_prefix(SET_PREFIX).map(|name| (Self::Set, name))
        }
    }

    /// Template key for a variable name
    pub fn key_for(self, name: &str) -> String {
        match self {
            Self::Get => format!("{GET_PREFIX}{name}"),
            Self::Set => format!("{SET_PREFIX}{name}"),
        }
    }
}

/// Network replication of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Replication {
    /// Not replicated
    #[default]
    None,
    /// Replicated to clients
    Replicated,
    /// Replicated with a change notification
    RepNotify,
}

/// Descriptive and behavioral flags; not interpreted by the graph core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableFlags {
    /// Palette category
    pub category: String,
    /// Tooltip text
    pub tooltip: String,
    /// Editable per instance
    pub instance_editable: bool,
    /// Read-only from graphs
    pub read_only: bool,
    /// Exposed when spawning
    pub expose_on_spawn: bool,
    /// Hidden from derived graphs
    pub private: bool,
    /// Replication mode
    pub replication: Replication,
    /// Replication condition
    pub replication_condition: String,
    /// Any other flags, kept as-is
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Default for VariableFlags {
    fn default() -> Self {
        Self {
            category: "Default".to_string(),
            tooltip: String::new(),
            instance_editable: false,
            read_only: false,
            expose_on_spawn: false,
            private: false,
            replication: Replication::None,
            replication_condition: "None".to_string(),
            extra: IndexMap::new(),
        }
    }
}

/// A user-defined variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Unique variable ID
    pub id: VariableId,
    /// Name, unique among variables (case-sensitive)
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub pin_type: PinType,
    /// Container shape
    #[serde(default)]
    pub container_type: ContainerType,
    /// Initial value
    #[serde(default)]
    pub default_value: PinValue,
    /// Other flags
    #[serde(flatten)]
    pub flags: VariableFlags,
}

impl Variable {
    /// Create a single-valued variable with the type default
    pub fn new(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            id: VariableId::new(),
            name: name.into(),
            pin_type,
            container_type: ContainerType::Single,
            default_value: pin_type.default_value(),
            flags: VariableFlags::default(),
        }
    }

    /// Getter template key
    pub fn get_key(&self) -> String {
        VariableAccess::Get.key_for(&self.name)
    }

    /// Setter template key
    pub fn set_key(&self) -> String {
        VariableAccess::Set.key_for(&self.name)
    }

    fn value_pin(&self, id: &str, direction_in: bool) -> PinTemplate {
        let pin = if direction_in {
            PinTemplate::input(id, self.name.clone(), self.pin_type)
        } else {
            PinTemplate::output(id, self.name.clone(), self.pin_type)
        };
        pin.with_container(self.container_type)
            .with_default(self.default_value.clone())
    }

    /// Pure getter: a single value output
    pub fn get_template(&self) -> NodeTemplate {
        let mut template = NodeTemplate::new(self.get_key(), format!("Get {}", self.name), NodeKind::Pure)
            .with_category("Variables")
            .with_icon("fa-arrow-down")
            .with_pins(vec![self.value_pin("val_out", false)]);
        template.variable_id = Some(self.id.clone());
        template
    }

    /// Impure setter: exec in, value in, exec out, value out
    pub fn set_template(&self) -> NodeTemplate {
        let mut template = NodeTemplate::new(self.set_key(), format!("Set {}", self.name), NodeKind::Variable)
            .with_category("Variables")
            .with_icon("fa-arrow-up")
            .with_pins(vec![
                PinTemplate::exec_in(),
                self.value_pin("val_in", true),
                PinTemplate::exec_out(),
                self.value_pin("val_out", false),
            ]);
        template.variable_id = Some(self.id.clone());
        template
    }
}

/// A rename waiting for the next compile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRename {
    /// Name the graph nodes still use
    pub old_name: String,
    /// Name to retarget them to
    pub new_name: String,
    /// Variable that was renamed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_id: Option<VariableId>,
}

/// A variable edit as it reaches the graph.
///
/// Renames are queued until compile; retype and recontainer edits are applied
/// as soon as they are made.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingVariableEdit {
    /// Relabel Get/Set nodes
    Rename(PendingRename),
    /// Value type changed
    Retype {
        /// Variable
        id: VariableId,
        /// New type
        pin_type: PinType,
    },
    /// Container shape changed
    RecontainerChange {
        /// Variable
        id: VariableId,
        /// New container
        container_type: ContainerType,
    },
}

/// Error when editing variables
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// Variable not found
    #[error("Variable not found: {0}")]
    NotFound(VariableId),

    /// Empty or whitespace-only name
    #[error("Variable name cannot be empty")]
    EmptyName,

    /// Name already used by another variable
    #[error("A variable named '{0}' already exists")]
    DuplicateName(String),
}

/// The set of user variables plus the queue of renames not yet applied
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: IndexMap<VariableId, Variable>,
    pending_renames: VecDeque<PendingRename>,
}

impl VariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a variable by ID
    pub fn get(&self, id: &VariableId) -> Option<&Variable> {
        self.variables.get(id)
    }

    /// Get a variable by name
    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.values().find(|v| v.name == name)
    }

    /// All variables, in creation order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether there are no variables
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// `base` if unused, otherwise `base_1`, `base_2`, ...
    pub fn unique_name(&self, base: &str) -> String {
        if self.by_name(base).is_none() {
            return base.to_string();
        }
        (1u32..)
            .map(|i| format!("{base}_{i}"))
            .find(|name| self.by_name(name).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    fn validate_name(&self, name: &str, except: Option<&VariableId>) -> Result<(), VariableError> {
        if name.trim().is_empty() {
            return Err(VariableError::EmptyName);
        }
        match self.by_name(name) {
            Some(existing) if Some(&existing.id) != except => Err(VariableError::DuplicateName(name.to_string())),
            _ => Ok(()),
        }
    }

    /// Drop every generated template and emit fresh Get/Set templates for the
    /// current variables
    pub fn regenerate_templates(&self, registry: &mut NodeRegistry) {
        registry.unregister_where(|key| VariableAccess::parse(key).is_some());
        for variable in self.variables.values() {
            registry.register(variable.get_template());
            registry.register(variable.set_template());
        }
    }

    /// Create a single-valued variable
    pub fn create_variable(
        &mut self,
        name: &str,
        pin_type: PinType,
        registry: &mut NodeRegistry,
    ) -> Result<VariableId, VariableError> {
        self.insert_variable(Variable::new(name, pin_type), registry)
    }

    /// Add a fully described variable
    pub fn insert_variable(
        &mut self,
        variable: Variable,
        registry: &mut NodeRegistry,
    ) -> Result<VariableId, VariableError> {
        self.validate_name(&variable.name, None)?;
        let id = variable.id.clone();
        tracing::debug!("Created variable '{}' ({})", variable.name, id);
        self.variables.insert(id.clone(), variable);
        self.regenerate_templates(registry);
        Ok(id)
    }

    /// Rename a variable. Templates are regenerated now; graph nodes are
    /// retargeted at the next compile.
    pub fn rename_variable(
        &mut self,
        id: &VariableId,
        new_name: &str,
        registry: &mut NodeRegistry,
    ) -> Result<(), VariableError> {
        self.validate_name(new_name, Some(id))?;
        let variable = self
            .variables
            .get_mut(id)
            .ok_or_else(|| VariableError::NotFound(id.clone()))?;
        if variable.name == new_name {
            return Ok(());
        }

        let old_name = std::mem::replace(&mut variable.name, new_name.to_string());
        tracing::debug!("Renamed variable '{}' -> '{}'", old_name, new_name);
        self.regenerate_templates(registry);
        let rename = PendingRename {
            old_name,
            new_name: new_name.to_string(),
            variable_id: Some(id.clone()),
        };
        self.dispatch(PendingVariableEdit::Rename(rename), registry, None);
        Ok(())
    }

    /// Change a variable's type. Returns how many graph nodes were resynchronized.
    pub fn set_variable_type(
        &mut self,
        id: &VariableId,
        pin_type: PinType,
        registry: &mut NodeRegistry,
        graph: &mut Graph,
    ) -> Result<usize, VariableError> {
        let variable = self
            .variables
            .get_mut(id)
            .ok_or_else(|| VariableError::NotFound(id.clone()))?;
        if variable.pin_type == pin_type {
            return Ok(0);
        }
        variable.pin_type = pin_type;
        variable.default_value = PinValue::default_for(pin_type, variable.container_type);
        self.regenerate_templates(registry);
        Ok(self.dispatch(PendingVariableEdit::Retype { id: id.clone(), pin_type }, registry, Some(graph)))
    }

    /// Change a variable's container. Returns how many graph nodes were resynchronized.
    pub fn set_variable_container(
        &mut self,
        id: &VariableId,
        container_type: ContainerType,
        registry: &mut NodeRegistry,
        graph: &mut Graph,
    ) -> Result<usize, VariableError> {
        let variable = self
            .variables
            .get_mut(id)
            .ok_or_else(|| VariableError::NotFound(id.clone()))?;
        if variable.container_type == container_type {
            return Ok(0);
        }
        variable.container_type = container_type;
        variable.default_value = PinValue::default_for(variable.pin_type, container_type);
        self.regenerate_templates(registry);
        Ok(self.dispatch(
            PendingVariableEdit::RecontainerChange { id: id.clone(), container_type },
            registry,
            Some(graph),
        ))
    }

    /// Change a variable's initial value. Existing nodes keep their literals.
    pub fn set_variable_default(
        &mut self,
        id: &VariableId,
        value: PinValue,
        registry: &mut NodeRegistry,
    ) -> Result<(), VariableError> {
        let variable = self
            .variables
            .get_mut(id)
            .ok_or_else(|| VariableError::NotFound(id.clone()))?;
        variable.default_value = value;
        self.regenerate_templates(registry);
        Ok(())
    }

    /// Route an edit: renames wait in the queue, type and container changes
    /// resynchronize every bound node right away. Returns how many nodes were
    /// resynchronized.
    fn dispatch(&mut self, edit: PendingVariableEdit, registry: &NodeRegistry, graph: Option<&mut Graph>) -> usize {
        match edit {
            PendingVariableEdit::Rename(rename) => {
                self.pending_renames.push_back(rename);
                0
            }
            PendingVariableEdit::Retype { id, .. } | PendingVariableEdit::RecontainerChange { id, .. } => {
                graph.map_or(0, |graph| self.resynchronize_bound_nodes(&id, registry, graph))
            }
        }
    }

    /// A node still carrying a name with a queued rename is moved to the
    /// current name first, since the old template no longer exists.
    fn resynchronize_bound_nodes(&self, id: &VariableId, registry: &NodeRegistry, graph: &mut Graph) -> usize {
        let Some(variable) = self.variables.get(id) else {
            return 0;
        };

        let node_ids = graph.variable_node_ids(&variable.id, &variable.name);
        for node_id in &node_ids {
            let key = graph
                .node(node_id)
                .and_then(|node| VariableAccess::parse(node.node_key()))
                .map(|(access, _)| access.key_for(&variable.name));
            if let Some(key) = key {
                graph.retarget_node(node_id, &key, registry);
            }
        }
        tracing::debug!("Resynchronized {} node(s) of '{}'", node_ids.len(), variable.name);
        node_ids.len()
    }

    /// Delete a variable together with every Get/Set node that uses it
    pub fn delete_variable(
        &mut self,
        id: &VariableId,
        registry: &mut NodeRegistry,
        graph: &mut Graph,
    ) -> Result<Variable, VariableError> {
        let variable = self
            .variables
            .shift_remove(id)
            .ok_or_else(|| VariableError::NotFound(id.clone()))?;

        for node_id in graph.variable_node_ids(&variable.id, &variable.name) {
            graph.delete_node(&node_id);
        }
        self.pending_renames.retain(|r| match &r.variable_id {
            Some(renamed) => renamed != id,
            None => r.new_name != variable.name,
        });
        self.regenerate_templates(registry);
        tracing::debug!("Deleted variable '{}'", variable.name);
        Ok(variable)
    }

    /// Renames waiting for the next compile, oldest first
    pub fn pending_renames(&self) -> impl Iterator<Item = &PendingRename> {
        self.pending_renames.iter()
    }

    /// Take every queued rename, oldest first
    pub fn drain_pending_renames(&mut self) -> Vec<PendingRename> {
        self.pending_renames.drain(..).collect()
    }

    /// Replace the whole store, e.g. when loading saved state. Variables whose
    /// name is already taken are skipped.
    pub fn restore(
        &mut self,
        variables: Vec<Variable>,
        pending_renames: Vec<PendingRename>,
        registry: &mut NodeRegistry,
    ) {
        self.variables.clear();
        for variable in variables {
            if self.validate_name(&variable.name, None).is_err() || self.variables.contains_key(&variable.id) {
                tracing::warn!("Skipping variable '{}' during load: duplicate or empty", variable.name);
                continue;
            }
            self.variables.insert(variable.id.clone(), variable);
        }
        // records saved without a variable ID are bound to the variable that
        // ends up with their name
        let bound: Vec<Option<VariableId>> = pending_renames
            .iter()
            .enumerate()
            .map(|(i, rename)| {
                rename.variable_id.clone().or_else(|| {
                    let name = pending_renames[i + 1..].iter().fold(rename.new_name.as_str(), |name, later| {
                        if later.old_name == name {
                            later.new_name.as_str()
                        } else {
                            name
                        }
                    });
                    self.by_name(name).map(|v| v.id.clone())
                })
            })
            .collect();
        self.pending_renames = pending_renames
            .into_iter()
            .zip(bound)
            .map(|(rename, variable_id)| PendingRename { variable_id, ..rename })
            .collect();
        self.regenerate_templates(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::blueprint::create_blueprint_registry;

    #[test]
    fn test_templates_generated() {
        let mut registry = NodeRegistry::new();
        let mut store = VariableStore::new();
        store.create_variable("Score", PinType::Int, &mut registry).unwrap();

        let get = registry.get("Get_Score").unwrap();
        assert_eq!(get.kind, NodeKind::Pure);
        assert_eq!(get.pins.len(), 1);
        assert_eq!(get.pins[0].id, "val_out");

        let set = registry.get("Set_Score").unwrap();
        let ids: Vec<&str> = set.pins.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["exec_in", "val_in", "exec_out", "val_out"]);
    }

    #[test]
    fn test_names_are_unique() {
        let mut registry = NodeRegistry::new();
        let mut store = VariableStore::new();
        let score = store.create_variable("Score", PinType::Int, &mut registry).unwrap();
        assert_eq!(
            store.create_variable("Score", PinType::Float, &mut registry),
            Err(VariableError::DuplicateName("Score".to_string()))
        );
        // case-sensitive
        assert!(store.create_variable("score", PinType::Float, &mut registry).is_ok());
        assert_eq!(store.rename_variable(&score, "  ", &mut registry), Err(VariableError::EmptyName));
        assert_eq!(store.unique_name("Score"), "Score_1");
        assert_eq!(store.unique_name("Health"), "Health");
    }

    #[test]
    fn test_rename_is_deferred() {
        let mut registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut store = VariableStore::new();
        let id = store.create_variable("Score", PinType::Int, &mut registry).unwrap();
        let node = graph.add_node(&registry, "Get_Score", 0.0, 0.0).unwrap();

        store.rename_variable(&id, "Points", &mut registry).unwrap();
        assert!(registry.contains("Get_Points"));
        assert!(!registry.contains("Get_Score"));
        assert_eq!(graph.node(&node).unwrap().node_key(), "Get_Score");

        let renames = store.drain_pending_renames();
        assert_eq!(
            renames,
            vec![PendingRename { old_name: "Score".into(), new_name: "Points".into(), variable_id: Some(id) }]
        );
        assert_eq!(graph.update_variable_nodes(&renames[0], &registry), 1);
        assert_eq!(graph.node(&node).unwrap().node_key(), "Get_Points");
        assert_eq!(graph.node(&node).unwrap().title, "Get Points");
    }

    #[test]
    fn test_retype_is_immediate() {
        let mut registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut store = VariableStore::new();
        let id = store.create_variable("Ready", PinType::Int, &mut registry).unwrap();
        let node = graph.add_node(&registry, "Set_Ready", 0.0, 0.0).unwrap();

        let touched = store.set_variable_type(&id, PinType::Bool, &mut registry, &mut graph).unwrap();
        assert_eq!(touched, 1);
        let node = graph.node(&node).unwrap();
        assert_eq!(node.pin("val_in").unwrap().pin_type, PinType::Bool);
        assert_eq!(node.literal("val_in"), Some(&PinValue::Bool(false)));
    }

    #[test]
    fn test_retype_follows_queued_rename() {
        let mut registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut store = VariableStore::new();
        let id = store.create_variable("Score", PinType::Int, &mut registry).unwrap();
        let node = graph.add_node(&registry, "Get_Score", 0.0, 0.0).unwrap();

        store.rename_variable(&id, "Points", &mut registry).unwrap();
        store.set_variable_type(&id, PinType::Float, &mut registry, &mut graph).unwrap();

        let node = graph.node(&node).unwrap();
        assert_eq!(node.node_key(), "Get_Points");
        assert_eq!(node.pin("val_out").unwrap().pin_type, PinType::Float);
    }

    #[test]
    fn test_recontainer_prunes_links() {
        let mut registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut store = VariableStore::new();
        let id = store.create_variable("Count", PinType::Int, &mut registry).unwrap();
        let get = graph.add_node(&registry, "Get_Count", 0.0, 0.0).unwrap();
        let add = graph.add_node(&registry, "AddInt", 200.0, 0.0).unwrap();
        let out = graph.node(&get).unwrap().pin_id("val_out");
        let input = graph.node(&add).unwrap().pin_id("a");
        graph.connect(&out, &input).unwrap();

        store
            .set_variable_container(&id, ContainerType::Array, &mut registry, &mut graph)
            .unwrap();
        assert_eq!(graph.link_count(), 0);
        assert!(graph.find_pin(&input).unwrap().links.is_empty());
    }

    #[test]
    fn test_delete_cascades() {
        let mut registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let mut store = VariableStore::new();
        let id = store.create_variable("Score", PinType::Int, &mut registry).unwrap();
        graph.add_node(&registry, "Get_Score", 0.0, 0.0).unwrap();
        graph.add_node(&registry, "Set_Score", 0.0, 100.0).unwrap();
        graph.add_node(&registry, "Branch", 0.0, 200.0).unwrap();

        let removed = store.delete_variable(&id, &mut registry, &mut graph).unwrap();
        assert_eq!(removed.name, "Score");
        assert_eq!(graph.node_count(), 1);
        assert!(!registry.contains("Get_Score"));
    }

    #[test]
    fn test_restore_binds_saved_renames() {
        let mut registry = NodeRegistry::new();
        let mut store = VariableStore::new();
        let points = Variable::new("Points", PinType::Int);
        let id = points.id.clone();
        let renames = vec![
            PendingRename { old_name: "Score".into(), new_name: "Total".into(), variable_id: None },
            PendingRename { old_name: "Total".into(), new_name: "Points".into(), variable_id: None },
        ];
        store.restore(vec![points], renames, &mut registry);
        assert_eq!(store.pending_renames().count(), 2);
        assert!(store.pending_renames().all(|r| r.variable_id.as_ref() == Some(&id)));
    }

    #[test]
    fn test_variable_json_keeps_unknown_flags() {
        let json = r#"{"id": "var-1", "name": "Health", "type": "float", "containerType": "single",
                       "defaultValue": 100.0, "category": "Stats", "sliderRange": [0, 100]}"#;
        let variable: Variable = serde_json::from_str(json).unwrap();
        assert_eq!(variable.pin_type, PinType::Float);
        assert_eq!(variable.default_value, PinValue::Float(100.0));
        assert_eq!(variable.flags.category, "Stats");
        assert!(variable.flags.extra.contains_key("sliderRange"));
    }
}
