// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node templates and node instances.

use crate::pin::{Pin, PinDirection, PinId, PinTemplate, PinValue};
use crate::variable::VariableId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(format!("node-{}", Uuid::new_v4().simple()))
    }

    /// The raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node category, which drives how the editor draws it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Graph entry point
    Event,
    /// Flow control (branch, loops, gates)
    Flow,
    /// Impure function call
    Function,
    /// Pure computation without exec pins
    Pure,
    /// Variable setter
    Variable,
    /// Free-floating comment box
    Comment,
}

impl NodeKind {
    /// Name used in saved data
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Flow => "flow",
            Self::Function => "function",
            Self::Pure => "pure",
            Self::Variable => "variable",
            Self::Comment => "comment",
        }
    }
}

/// Node type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    /// Registry key (e.g. `Branch`, `Get_Score`)
    pub key: String,
    /// Display title
    pub title: String,
    /// Node category
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Palette category (e.g. `Math|Float`)
    pub category: String,
    /// Description
    pub description: String,
    /// Icon name
    pub icon: Option<String>,
    /// Pins, in display order
    pub pins: Vec<PinTemplate>,
    /// At most one instance per graph
    pub is_singleton: bool,
    /// Instances accept user-added parameter pins
    pub dynamic_pins: bool,
    /// Backing variable, for generated Get/Set templates
    pub variable_id: Option<VariableId>,
    /// Initial per-node settings
    pub custom_data: Option<serde_json::Value>,
}

impl NodeTemplate {
    /// Create a template with no pins
    pub fn new(key: impl Into<String>, title: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            kind,
            category: String::new(),
            description: String::new(),
            icon: None,
            pins: Vec::new(),
            is_singleton: false,
            dynamic_pins: false,
            variable_id: None,
            custom_data: None,
        }
    }

    /// Set the palette category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the icon
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the pins
    pub fn with_pins(mut self, pins: Vec<PinTemplate>) -> Self {
        self.pins = pins;
        self
    }

    /// Set the initial per-node settings
    pub fn with_custom_data(mut self, data: serde_json::Value) -> Self {
        self.custom_data = Some(data);
        self
    }

    /// Restrict to one instance per graph
    pub fn singleton(mut self) -> Self {
        self.is_singleton = true;
        self
    }

    /// Allow user-added parameter pins
    pub fn dynamic(mut self) -> Self {
        self.dynamic_pins = true;
        self
    }

    /// Get a pin template by local ID
    pub fn pin(&self, id: &str) -> Option<&PinTemplate> {
        self.pins.iter().find(|p| p.id == id)
    }
}

/// Where a node's pin list comes from
#[derive(Debug, Clone, PartialEq)]
pub enum NodeVariant {
    /// Pins come from the template alone
    Static {
        /// Template key
        key: String,
    },
    /// Template pins followed by user-added parameter pins
    DynamicEvent {
        /// Template key
        key: String,
        /// User-added parameters
        params: Vec<PinTemplate>,
    },
}

impl NodeVariant {
    fn for_template(template: &NodeTemplate) -> Self {
        if template.dynamic_pins {
            Self::DynamicEvent {
                key: template.key.clone(),
                params: Vec::new(),
            }
        } else {
            Self::Static {
                key: template.key.clone(),
            }
        }
    }

    /// Template key
    pub fn key(&self) -> &str {
        match self {
            Self::Static { key } | Self::DynamicEvent { key, .. } => key,
        }
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Template key and dynamic pin storage
    pub(crate) variant: NodeVariant,
    /// Display title (can be customized)
    pub title: String,
    /// Node category
    pub kind: NodeKind,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Icon name
    pub icon: Option<String>,
    /// Whether the node is collapsed in the UI
    pub collapsed: bool,
    /// Pins, in display order
    pub(crate) pins: Vec<Pin>,
    /// Literal per data pin (by local ID), used while the pin is unconnected
    pub(crate) pin_literals: IndexMap<String, PinValue>,
    /// Free-form per-node settings
    pub custom_data: serde_json::Value,
    /// Backing variable for Get/Set nodes
    pub variable_id: Option<VariableId>,
}

impl Node {
    /// Create a new node from a template
    pub fn new(template: &NodeTemplate) -> Self {
        Self::with_id(NodeId::new(), template)
    }

    /// Create a node with a known ID from a template
    pub fn with_id(id: NodeId, template: &NodeTemplate) -> Self {
        let mut node = Self {
            id,
            variant: NodeVariant::for_template(template),
            title: template.title.clone(),
            kind: template.kind,
            position: [0.0, 0.0],
            icon: template.icon.clone(),
            collapsed: false,
            pins: Vec::new(),
            pin_literals: IndexMap::new(),
            custom_data: template
                .custom_data
                .clone()
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            variable_id: template.variable_id.clone(),
        };
        node.pins = node.build_pins(template);
        node.pin_literals = seed_literals(&node.pins);
        node
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Template key this node was instantiated from
    pub fn node_key(&self) -> &str {
        self.variant.key()
    }

    pub(crate) fn set_node_key(&mut self, new_key: impl Into<String>) {
        let new_key = new_key.into();
        match &mut self.variant {
            NodeVariant::Static { key } | NodeVariant::DynamicEvent { key, .. } => *key = new_key,
        }
    }

    /// Template key and dynamic pin storage
    pub fn variant(&self) -> &NodeVariant {
        &self.variant
    }

    /// Whether the node accepts user-added parameter pins
    pub fn supports_dynamic_pins(&self) -> bool {
        matches!(self.variant, NodeVariant::DynamicEvent { .. })
    }

    /// User-added parameter pins
    pub fn params(&self) -> &[PinTemplate] {
        match &self.variant {
            NodeVariant::Static { .. } => &[],
            NodeVariant::DynamicEvent { params, .. } => params,
        }
    }

    pub(crate) fn params_mut(&mut self) -> Option<&mut Vec<PinTemplate>> {
        match &mut self.variant {
            NodeVariant::Static { .. } => None,
            NodeVariant::DynamicEvent { params, .. } => Some(params),
        }
    }

    /// Fresh pins for this node: the template's followed by any parameters
    pub(crate) fn build_pins(&self, template: &NodeTemplate) -> Vec<Pin> {
        template
            .pins
            .iter()
            .chain(self.params())
            .map(|p| Pin::from_template(&self.id, p))
            .collect()
    }

    /// X position
    pub fn x(&self) -> f32 {
        self.position[0]
    }

    /// Y position
    pub fn y(&self) -> f32 {
        self.position[1]
    }

    /// All pins
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Input pins
    pub fn inputs(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter().filter(|p| p.direction == PinDirection::In)
    }

    /// Output pins
    pub fn outputs(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter().filter(|p| p.direction == PinDirection::Out)
    }

    /// Get a pin by local ID
    pub fn pin(&self, local: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id.local == local)
    }

    pub(crate) fn pin_mut(&mut self, local: &str) -> Option<&mut Pin> {
        self.pins.iter_mut().find(|p| p.id.local == local)
    }

    /// Get a pin by full ID
    pub fn pin_by_id(&self, pin_id: &PinId) -> Option<&Pin> {
        if pin_id.node != self.id {
            return None;
        }
        self.pin(&pin_id.local)
    }

    /// Full ID of a local pin
    pub fn pin_id(&self, local: &str) -> PinId {
        PinId::new(self.id.clone(), local)
    }

    /// Literal held by a pin
    pub fn literal(&self, local: &str) -> Option<&PinValue> {
        self.pin_literals.get(local)
    }

    /// All literals, keyed by local pin ID
    pub fn literals(&self) -> &IndexMap<String, PinValue> {
        &self.pin_literals
    }

    /// Copy of this node under a fresh ID, without links
    pub(crate) fn duplicate(&self) -> Self {
        let id = NodeId::new();
        let pins = self
            .pins
            .iter()
            .map(|p| Pin {
                id: PinId::new(id.clone(), p.id.local.clone()),
                links: Vec::new(),
                ..p.clone()
            })
            .collect();
        Self {
            id,
            pins,
            ..self.clone()
        }
    }
}

/// Literal seed for freshly built pins: every data pin gets its default
pub(crate) fn seed_literals(pins: &[Pin]) -> IndexMap<String, PinValue> {
    pins.iter()
        .filter(|p| !p.is_exec())
        .map(|p| (p.id.local.clone(), p.default_value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::PinType;

    fn add_int() -> NodeTemplate {
        NodeTemplate::new("AddInt", "Add (Integer)", NodeKind::Pure).with_pins(vec![
            PinTemplate::input("a", "A", PinType::Int).with_default(PinValue::Int(1)),
            PinTemplate::input("b", "B", PinType::Int),
            PinTemplate::output("result", "Result", PinType::Int),
        ])
    }

    #[test]
    fn test_node_from_template() {
        let node = Node::new(&add_int()).with_position(10.0, 20.0);
        assert_eq!(node.node_key(), "AddInt");
        assert_eq!(node.pins().len(), 3);
        assert_eq!(node.inputs().count(), 2);
        assert_eq!(node.literal("a"), Some(&PinValue::Int(1)));
        assert_eq!(node.literal("b"), Some(&PinValue::Int(0)));
        assert_eq!(node.pin("a").map(|p| p.id.to_string()), Some(format!("{}-a", node.id)));
        assert!(!node.supports_dynamic_pins());
    }

    #[test]
    fn test_exec_pins_have_no_literal() {
        let template = NodeTemplate::new("PrintString", "Print String", NodeKind::Function)
            .with_pins(vec![PinTemplate::exec_in(), PinTemplate::exec_out()]);
        let node = Node::new(&template);
        assert!(node.literals().is_empty());
    }

    #[test]
    fn test_duplicate_gets_fresh_pin_ids() {
        let node = Node::new(&add_int());
        let copy = node.duplicate();
        assert_ne!(copy.id, node.id);
        assert!(copy.pins().iter().all(|p| p.id.node == copy.id && p.links.is_empty()));
        assert_eq!(copy.literals(), node.literals());
    }
}
