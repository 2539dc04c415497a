// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions for node inputs/outputs.

use crate::link::LinkId;
use crate::node::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a pin: the owning node plus the pin's local name.
///
/// Lookups go through the structured pair. The `Display` form
/// (`"{node}-{local}"`) is only used for persisted link endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PinId {
    /// Owning node
    pub node: NodeId,
    /// Local pin name within the node (e.g. `val_in`)
    pub local: String,
}

impl PinId {
    /// Create a pin ID from its parts
    pub fn new(node: NodeId, local: impl Into<String>) -> Self {
        Self {
            node,
            local: local.into(),
        }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.node, self.local)
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    /// Input pin
    In,
    /// Output pin
    Out,
}

impl PinDirection {
    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }
}

/// Container shape of the value flowing through a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    /// A single value
    #[default]
    Single,
    /// Ordered list
    Array,
    /// Unordered unique values
    Set,
    /// Key/value pairs
    Map,
}

/// Data type that can flow through pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    /// Boolean value
    Bool,
    /// 8-bit unsigned integer
    Byte,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Int64,
    /// Floating point value
    Float,
    /// Interned name
    Name,
    /// Plain string
    String,
    /// Localizable text
    Text,
    /// 3D vector
    Vector,
    /// Pitch/yaw/roll rotation
    Rotator,
    /// Location, rotation and scale
    Transform,
    /// Object reference
    Object,
    /// Execution flow
    Exec,
}

/// Implicit conversions, keyed by the conversion node that performs them.
///
/// Any pair absent from this table cannot be connected.
const CONVERSIONS: &[(PinType, PinType, &str)] = &[
    (PinType::Float, PinType::String, "Conv_FloatToString"),
    (PinType::Int, PinType::String, "Conv_IntToString"),
    (PinType::Bool, PinType::String, "Conv_BoolToString"),
    (PinType::Byte, PinType::String, "Conv_ByteToString"),
    (PinType::Name, PinType::String, "Conv_NameToString"),
    (PinType::Text, PinType::String, "Conv_TextToString"),
    (PinType::Int, PinType::Float, "Conv_IntToFloat"),
    (PinType::Byte, PinType::Int, "Conv_ByteToInt"),
];

impl PinType {
    /// Every pin type, in declaration order
    pub fn all() -> &'static [PinType] {
        &[
            Self::Bool,
            Self::Byte,
            Self::Int,
            Self::Int64,
            Self::Float,
            Self::Name,
            Self::String,
            Self::Text,
            Self::Vector,
            Self::Rotator,
            Self::Transform,
            Self::Object,
            Self::Exec,
        ]
    }

    /// Human-readable type name
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Bool => "Boolean",
            Self::Byte => "Byte",
            Self::Int => "Integer",
            Self::Int64 => "Integer64",
            Self::Float => "Float",
            Self::Name => "Name",
            Self::String => "String",
            Self::Text => "Text",
            Self::Vector => "Vector",
            Self::Rotator => "Rotator",
            Self::Transform => "Transform",
            Self::Object => "Object",
            Self::Exec => "Exec",
        }
    }

    /// Get the color for this pin type (for UI)
    pub fn color(self) -> [u8; 3] {
        match self {
            Self::Bool => [140, 0, 0],
            Self::Byte => [0, 110, 100],
            Self::Int => [30, 225, 175],
            Self::Int64 => [170, 225, 175],
            Self::Float => [160, 250, 70],
            Self::Name => [200, 130, 250],
            Self::String => [250, 0, 210],
            Self::Text => [230, 115, 140],
            Self::Vector => [250, 200, 40],
            Self::Rotator => [160, 175, 250],
            Self::Transform => [240, 115, 0],
            Self::Object => [0, 170, 240],
            Self::Exec => [255, 255, 255],
        }
    }

    /// Whether this is a control-flow pin type
    pub fn is_exec(self) -> bool {
        self == Self::Exec
    }

    /// Literal a pin of this type holds when nothing else is known
    pub fn default_value(self) -> PinValue {
        match self {
            Self::Bool => PinValue::Bool(false),
            Self::Byte | Self::Int | Self::Int64 => PinValue::Int(0),
            Self::Float => PinValue::Float(0.0),
            Self::Name => PinValue::String("None".to_string()),
            Self::String | Self::Text => PinValue::String(String::new()),
            Self::Vector | Self::Rotator => PinValue::Vector([0.0; 3]),
            Self::Transform => PinValue::Transform(TransformValue::default()),
            Self::Object | Self::Exec => PinValue::None,
        }
    }

    /// Key of the node that converts `self` into `to`, if an implicit conversion exists
    pub fn conversion_node_key(self, to: PinType) -> Option<&'static str> {
        CONVERSIONS
            .iter()
            .find(|(from, target, _)| *from == self && *target == to)
            .map(|(_, _, key)| *key)
    }

    /// Check if an output of this type can feed an input of `other`
    pub fn can_connect_to(self, other: PinType) -> bool {
        if self == other {
            return true;
        }
        if self.is_exec() && other.is_exec() {
            return true;
        }
        self.conversion_node_key(other).is_some()
    }

    /// All `(from, to, conversion key)` triples
    pub fn conversions() -> &'static [(PinType, PinType, &'static str)] {
        CONVERSIONS
    }
}

/// Location/rotation/scale literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformValue {
    /// Translation
    pub location: [f64; 3],
    /// Pitch, yaw, roll in degrees
    pub rotation: [f64; 3],
    /// Per-axis scale
    pub scale: [f64; 3],
}

impl Default for TransformValue {
    fn default() -> Self {
        Self {
            location: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

/// Literal value held by an unconnected pin.
///
/// Serialized untagged so saved literals read as plain JSON values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PinValue {
    /// No value (object references, exec pins)
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Any integer type
    Int(i64),
    /// Float
    Float(f64),
    /// Name, string or text
    String(String),
    /// Vector or rotator
    Vector([f64; 3]),
    /// Transform
    Transform(TransformValue),
    /// Array or set contents
    List(Vec<PinValue>),
    /// Map contents
    Map(IndexMap<String, PinValue>),
}

impl PinValue {
    /// Default literal for a pin of the given type and container
    pub fn default_for(pin_type: PinType, container: ContainerType) -> Self {
        match container {
            ContainerType::Single => pin_type.default_value(),
            ContainerType::Array | ContainerType::Set => Self::List(Vec::new()),
            ContainerType::Map => Self::Map(IndexMap::new()),
        }
    }
}

/// Pin definition inside a node template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinTemplate {
    /// Local pin ID, unique within the node
    pub id: String,
    /// Display name
    pub name: String,
    /// Data type
    #[serde(rename = "type")]
    pub pin_type: PinType,
    /// Pin direction
    #[serde(rename = "dir")]
    pub direction: PinDirection,
    /// Container shape
    #[serde(default)]
    pub container_type: ContainerType,
    /// Default literal; the type default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<PinValue>,
    /// Added by the user rather than the template
    #[serde(default)]
    pub is_custom: bool,
}

impl PinTemplate {
    /// Create a new pin template
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pin_type: PinType,
        direction: PinDirection,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pin_type,
            direction,
            container_type: ContainerType::Single,
            default_value: None,
            is_custom: false,
        }
    }

    /// Create a new input pin template
    pub fn input(id: impl Into<String>, name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(id, name, pin_type, PinDirection::In)
    }

    /// Create a new output pin template
    pub fn output(id: impl Into<String>, name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(id, name, pin_type, PinDirection::Out)
    }

    /// Execution input named `exec_in`
    pub fn exec_in() -> Self {
        Self::input("exec_in", "", PinType::Exec)
    }

    /// Execution output named `exec_out`
    pub fn exec_out() -> Self {
        Self::output("exec_out", "", PinType::Exec)
    }

    /// Set the default value
    pub fn with_default(mut self, value: PinValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the container type
    pub fn with_container(mut self, container: ContainerType) -> Self {
        self.container_type = container;
        self
    }

    /// Mark as user-added
    pub fn custom(mut self) -> Self {
        self.is_custom = true;
        self
    }

    /// The default literal, falling back to the type default
    pub fn resolved_default(&self) -> PinValue {
        self.default_value
            .clone()
            .unwrap_or_else(|| PinValue::default_for(self.pin_type, self.container_type))
    }
}

/// A pin on a node instance
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    /// Unique pin ID
    pub id: PinId,
    /// Display name
    pub name: String,
    /// Data type
    pub pin_type: PinType,
    /// Pin direction
    pub direction: PinDirection,
    /// Container shape
    pub container_type: ContainerType,
    /// Added by the user rather than the template
    pub is_custom: bool,
    /// Default literal
    pub default_value: PinValue,
    /// Links this pin participates in
    pub links: Vec<LinkId>,
}

impl Pin {
    /// Instantiate a pin for `node` from its template
    pub fn from_template(node: &NodeId, template: &PinTemplate) -> Self {
        Self {
            id: PinId::new(node.clone(), template.id.clone()),
            name: template.name.clone(),
            pin_type: template.pin_type,
            direction: template.direction,
            container_type: template.container_type,
            is_custom: template.is_custom,
            default_value: template.resolved_default(),
            links: Vec::new(),
        }
    }

    /// Owning node
    pub fn node_id(&self) -> &NodeId {
        &self.id.node
    }

    /// Whether this is a control-flow pin
    pub fn is_exec(&self) -> bool {
        self.pin_type.is_exec()
    }

    /// Whether this is an input pin
    pub fn is_input(&self) -> bool {
        self.direction == PinDirection::In
    }

    /// Maximum number of links; `None` for unbounded fan-out
    pub fn max_links(&self) -> Option<usize> {
        match self.direction {
            PinDirection::In => Some(1),
            PinDirection::Out => None,
        }
    }

    /// Whether any link is attached
    pub fn is_connected(&self) -> bool {
        !self.links.is_empty()
    }

    /// Whether another link may be attached
    pub fn has_capacity(&self) -> bool {
        self.max_links().map_or(true, |max| self.links.len() < max)
    }

    /// Whether a link may run from `start` (an output) into `end` (an input),
    /// ignoring fan-in capacity
    pub fn accepts_link(start: &Pin, end: &Pin) -> bool {
        start.direction == PinDirection::Out
            && end.direction == PinDirection::In
            && start.container_type == end.container_type
            && start.pin_type.can_connect_to(end.pin_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_table() {
        assert_eq!(PinType::Int.conversion_node_key(PinType::Float), Some("Conv_IntToFloat"));
        assert_eq!(PinType::Float.conversion_node_key(PinType::String), Some("Conv_FloatToString"));
        assert!(PinType::Float.conversion_node_key(PinType::Int).is_none());
        assert!(PinType::String.conversion_node_key(PinType::Bool).is_none());
        assert!(PinType::Float.conversion_node_key(PinType::Bool).is_none());
    }

    #[test]
    fn test_can_connect_to() {
        assert!(PinType::Exec.can_connect_to(PinType::Exec));
        assert!(PinType::Byte.can_connect_to(PinType::Int));
        assert!(!PinType::Int.can_connect_to(PinType::Byte));
        assert!(!PinType::Exec.can_connect_to(PinType::Bool));
    }

    #[test]
    fn test_container_defaults() {
        assert_eq!(PinValue::default_for(PinType::Int, ContainerType::Array), PinValue::List(vec![]));
        assert_eq!(PinValue::default_for(PinType::Bool, ContainerType::Single), PinValue::Bool(false));
        assert_eq!(
            PinValue::default_for(PinType::Name, ContainerType::Single),
            PinValue::String("None".to_string())
        );
    }

    #[test]
    fn test_pin_value_json_shape() {
        let values: Vec<PinValue> = serde_json::from_str(
            r#"[null, true, 3, 2.5, "hi", [1.0, 2.0, 3.0],
                {"location": [0,0,0], "rotation": [0,0,0], "scale": [1,1,1]}, [], {"k": 1}]"#,
        )
        .unwrap();
        assert_eq!(values[0], PinValue::None);
        assert_eq!(values[1], PinValue::Bool(true));
        assert_eq!(values[2], PinValue::Int(3));
        assert_eq!(values[3], PinValue::Float(2.5));
        assert_eq!(values[4], PinValue::String("hi".to_string()));
        assert_eq!(values[5], PinValue::Vector([1.0, 2.0, 3.0]));
        assert_eq!(values[6], PinValue::Transform(TransformValue::default()));
        assert_eq!(values[7], PinValue::List(vec![]));
        assert!(matches!(values[8], PinValue::Map(_)));
    }

    #[test]
    fn test_fan_in_capacity() {
        let node = NodeId::from("node-a");
        let mut input = Pin::from_template(&node, &PinTemplate::input("val_in", "Value", PinType::Int));
        let output = Pin::from_template(&node, &PinTemplate::output("val_out", "Value", PinType::Int));
        assert!(input.has_capacity());
        input.links.push(LinkId::from("link-1"));
        assert!(!input.has_capacity());
        assert!(output.has_capacity());
        assert_eq!(input.id.to_string(), "node-a-val_in");
    }
}
