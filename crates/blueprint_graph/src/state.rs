// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted graph state.
//!
//! Loading is tolerant: malformed entries, unknown node keys and links that
//! cannot be resolved are skipped with a warning. Only a document that is not
//! JSON at all fails to load.

use crate::graph::Graph;
use crate::link::{Link, LinkId};
use crate::node::{seed_literals, Node, NodeId, NodeTemplate};
use crate::pin::{ContainerType, PinDirection, PinTemplate, PinType, PinValue};
use crate::registry::NodeRegistry;
use crate::variable::{PendingRename, Variable, VariableId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Legacy output pin that older saves carry on custom events
const LEGACY_DELEGATE_PIN: &str = "delegate_out";
const LEGACY_DELEGATE_NAME: &str = "Output Delegate";

/// Whole-graph snapshot as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphState {
    /// Nodes
    #[serde(default, deserialize_with = "lenient_list")]
    pub nodes: Vec<NodeData>,
    /// Links
    #[serde(default, deserialize_with = "lenient_list")]
    pub links: Vec<LinkData>,
    /// Variables
    #[serde(default, deserialize_with = "lenient_list")]
    pub variables: Vec<Variable>,
    /// Renames not yet applied to the graph
    #[serde(default, deserialize_with = "lenient_list")]
    pub pending_renames: Vec<PendingRename>,
    /// View pan
    #[serde(default)]
    pub pan: PanData,
    /// View zoom
    #[serde(default = "default_zoom")]
    pub zoom: f32,
}

fn default_zoom() -> f32 {
    1.0
}

impl Default for GraphState {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            variables: Vec::new(),
            pending_renames: Vec::new(),
            pan: PanData::default(),
            zoom: default_zoom(),
        }
    }
}

impl GraphState {
    /// Parse a saved document
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// View pan offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanData {
    /// Horizontal offset
    pub x: f32,
    /// Vertical offset
    pub y: f32,
}

/// A saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Node ID
    pub id: NodeId,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// X position
    #[serde(default)]
    pub x: f32,
    /// Y position
    #[serde(default)]
    pub y: f32,
    /// Node category, informational only
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Template key
    pub node_key: String,
    /// Icon name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Collapsed in the UI
    #[serde(default)]
    pub is_collapsed: bool,
    /// Saved pins
    #[serde(default, deserialize_with = "lenient_list")]
    pub pins: Vec<PinData>,
    /// Per-node settings
    #[serde(default)]
    pub custom_data: serde_json::Value,
    /// Backing variable of Get/Set nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_id: Option<VariableId>,
}

/// A saved pin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinData {
    /// Full (`node-local`) or local pin ID
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Data type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub pin_type: Option<PinType>,
    /// Direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PinDirection>,
    /// Container shape
    #[serde(default)]
    pub container_type: ContainerType,
    /// Literal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_value: Option<PinValue>,
    /// User-added pin
    #[serde(default)]
    pub is_custom: bool,
}

impl PinData {
    /// Local ID, whether the saved ID was full or local
    fn local_id<'a>(&'a self, node_id: &NodeId) -> &'a str {
        self.id
            .strip_prefix(node_id.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(&self.id)
    }

    fn is_legacy_delegate(&self, local: &str) -> bool {
        local == LEGACY_DELEGATE_PIN || self.name == LEGACY_DELEGATE_NAME
    }
}

/// A saved link; endpoints use the `"{node}-{local}"` string form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkData {
    /// Link ID
    pub id: LinkId,
    /// Output pin
    pub start_pin_id: String,
    /// Input pin
    pub end_pin_id: String,
}

/// What [`Graph::load_state`] restored and what it skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Nodes restored
    pub nodes_loaded: usize,
    /// Nodes skipped
    pub nodes_skipped: usize,
    /// Links restored
    pub links_loaded: usize,
    /// Links skipped
    pub links_skipped: usize,
}

/// Accept any JSON value for a list field: non-arrays become empty and
/// entries that fail to parse are dropped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        if !value.is_null() {
            tracing::warn!("Expected a list, found {}; treating as empty", value);
        }
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!("Skipping malformed entry: {}", err);
                None
            }
        })
        .collect())
}

impl Graph {
    /// Replace the graph content with saved nodes and links.
    ///
    /// Nodes are rebuilt from their current templates; saved literals are
    /// applied where the pin still exists. Custom event pins beyond the
    /// template become parameters.
    pub fn load_state(&mut self, registry: &NodeRegistry, nodes: &[NodeData], links: &[LinkData]) -> LoadReport {
        self.clear();
        let mut report = LoadReport::default();

        for data in nodes {
            if self.node(&data.id).is_some() {
                tracing::warn!("Skipping node {}: duplicate ID", data.id);
                report.nodes_skipped += 1;
                continue;
            }
            let Some(template) = registry.get(&data.node_key) else {
                tracing::warn!("Skipping node {}: unknown key '{}'", data.id, data.node_key);
                report.nodes_skipped += 1;
                continue;
            };

            let mut node = Node::with_id(data.id.clone(), template).with_position(data.x, data.y);
            if let Some(params) = node.params_mut() {
                params.extend(
                    data.pins
                        .iter()
                        .filter_map(|pin| saved_param(template, &data.id, pin)),
                );
                node.pins = node.build_pins(template);
                node.pin_literals = seed_literals(&node.pins);
            }

            if !data.title.is_empty() {
                node.title = data.title.clone();
            }
            if data.icon.is_some() {
                node.icon = data.icon.clone();
            }
            node.collapsed = data.is_collapsed;
            if !data.custom_data.is_null() {
                node.custom_data = data.custom_data.clone();
            }
            if data.variable_id.is_some() {
                node.variable_id = data.variable_id.clone();
            }

            for saved in &data.pins {
                let local = saved.local_id(&data.id);
                let Some(value) = &saved.literal_value else {
                    continue;
                };
                if node.pin(local).is_some_and(|p| !p.is_exec()) {
                    node.pin_literals.insert(local.to_string(), value.clone());
                }
            }

            self.insert_node(node);
            report.nodes_loaded += 1;
        }

        for data in links {
            if self.link(&data.id).is_some() {
                tracing::warn!("Skipping link {}: duplicate ID", data.id);
                report.links_skipped += 1;
                continue;
            }
            let (Some(a), Some(b)) = (
                self.resolve_pin_str(&data.start_pin_id),
                self.resolve_pin_str(&data.end_pin_id),
            ) else {
                tracing::warn!("Skipping link {}: endpoint not found", data.id);
                report.links_skipped += 1;
                continue;
            };
            match self.check_connection(&a, &b) {
                Ok((start, end)) => {
                    self.insert_link(Link {
                        id: data.id.clone(),
                        start,
                        end,
                    });
                    report.links_loaded += 1;
                }
                Err(err) => {
                    tracing::warn!("Skipping link {}: {}", data.id, err);
                    report.links_skipped += 1;
                }
            }
        }

        tracing::info!(
            "Loaded {} node(s), {} link(s); skipped {} node(s), {} link(s)",
            report.nodes_loaded,
            report.links_loaded,
            report.nodes_skipped,
            report.links_skipped
        );
        report
    }

    /// Snapshot every node
    pub fn to_node_data(&self) -> Vec<NodeData> {
        self.nodes()
            .map(|node| NodeData {
                id: node.id.clone(),
                title: node.title.clone(),
                x: node.x(),
                y: node.y(),
                kind: Some(node.kind.as_str().to_string()),
                node_key: node.node_key().to_string(),
                icon: node.icon.clone(),
                is_collapsed: node.collapsed,
                pins: node
                    .pins()
                    .iter()
                    .map(|pin| PinData {
                        id: pin.id.to_string(),
                        name: pin.name.clone(),
                        pin_type: Some(pin.pin_type),
                        dir: Some(pin.direction),
                        container_type: pin.container_type,
                        literal_value: node.literal(&pin.id.local).cloned(),
                        is_custom: pin.is_custom,
                    })
                    .collect(),
                custom_data: node.custom_data.clone(),
                variable_id: node.variable_id.clone(),
            })
            .collect()
    }

    /// Snapshot every link
    pub fn to_link_data(&self) -> Vec<LinkData> {
        self.links()
            .map(|link| LinkData {
                id: link.id.clone(),
                start_pin_id: link.start.to_string(),
                end_pin_id: link.end.to_string(),
            })
            .collect()
    }
}

/// A saved pin that is not part of the template, as a parameter template
fn saved_param(template: &NodeTemplate, node_id: &NodeId, pin: &PinData) -> Option<PinTemplate> {
    let local = pin.local_id(node_id);
    if template.pin(local).is_some() {
        return None;
    }
    if pin.is_legacy_delegate(local) {
        tracing::debug!("Dropping legacy delegate pin on {}", node_id);
        return None;
    }
    let Some(pin_type) = pin.pin_type.filter(|t| !t.is_exec()) else {
        tracing::warn!("Skipping parameter '{}' on {}: no data type", local, node_id);
        return None;
    };
    let template = PinTemplate::new(local, pin.name.clone(), pin_type, pin.dir.unwrap_or(PinDirection::Out))
        .with_container(pin.container_type)
        .custom();
    Some(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::blueprint::create_blueprint_registry;

    #[test]
    fn test_round_trip_keeps_links_and_literals() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let begin = graph.add_node(&registry, "EventBeginPlay", 50.0, 50.0).unwrap();
        let print = graph.add_node(&registry, "PrintString", 300.0, 50.0).unwrap();
        let exec_out = graph.node(&begin).unwrap().pin_id("exec_out");
        let exec_in = graph.node(&print).unwrap().pin_id("exec_in");
        let link = graph.connect(&exec_out, &exec_in).unwrap();
        let text = graph.node(&print).unwrap().pin_id("in_string");
        graph.set_pin_literal(&text, PinValue::String("Hi".into()));

        let nodes = graph.to_node_data();
        let links = graph.to_link_data();
        let mut restored = Graph::default();
        let report = restored.load_state(&registry, &nodes, &links);

        assert_eq!(report, LoadReport { nodes_loaded: 2, links_loaded: 1, ..Default::default() });
        assert!(restored.link(&link).is_some());
        assert_eq!(
            restored.node(&print).unwrap().literal("in_string"),
            Some(&PinValue::String("Hi".into()))
        );
    }

    #[test]
    fn test_malformed_lists_are_empty() {
        let state = GraphState::from_json(r#"{"nodes": "oops", "links": [{"id": 3}], "zoom": 2.0}"#).unwrap();
        assert!(state.nodes.is_empty());
        assert!(state.links.is_empty());
        assert_eq!(state.zoom, 2.0);

        let state = GraphState::from_json("{}").unwrap();
        assert_eq!(state, GraphState::default());
        assert!(GraphState::from_json("not json").is_err());
    }

    #[test]
    fn test_unknown_keys_and_dangling_links_skipped() {
        let registry = create_blueprint_registry();
        let json = r#"{
            "nodes": [
                {"id": "node-1", "nodeKey": "EventBeginPlay", "x": 0, "y": 0},
                {"id": "node-2", "nodeKey": "Teleport", "x": 0, "y": 0}
            ],
            "links": [
                {"id": "link-1", "startPinId": "node-1-exec_out", "endPinId": "node-2-exec_in"}
            ]
        }"#;
        let state = GraphState::from_json(json).unwrap();
        let mut graph = Graph::default();
        let report = graph.load_state(&registry, &state.nodes, &state.links);
        assert_eq!(report.nodes_skipped, 1);
        assert_eq!(report.links_skipped, 1);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_custom_event_params_restored() {
        let registry = create_blueprint_registry();
        let json = r#"{
            "nodes": [{
                "id": "node-ev", "nodeKey": "CustomEvent", "title": "OnHit", "x": 0, "y": 0,
                "pins": [
                    {"id": "node-ev-exec_out", "name": "", "type": "exec", "dir": "out"},
                    {"id": "delegate_out", "name": "Output Delegate", "type": "object", "dir": "out"},
                    {"id": "param_0", "name": "Damage", "type": "float", "dir": "out",
                     "isCustom": true, "literalValue": 5.5}
                ]
            }]
        }"#;
        let state = GraphState::from_json(json).unwrap();
        let mut graph = Graph::default();
        graph.load_state(&registry, &state.nodes, &state.links);

        let node = graph.node(&NodeId::from("node-ev")).unwrap();
        assert_eq!(node.title, "OnHit");
        assert_eq!(node.params().len(), 1);
        assert!(node.pin(LEGACY_DELEGATE_PIN).is_none());
        assert_eq!(node.pin("param_0").map(|p| p.pin_type), Some(PinType::Float));
        assert_eq!(node.literal("param_0"), Some(&PinValue::Float(5.5)));
    }

    #[test]
    fn test_fan_in_enforced_on_load() {
        let registry = create_blueprint_registry();
        let json = r#"{
            "nodes": [
                {"id": "node-a", "nodeKey": "AddInt"},
                {"id": "node-b", "nodeKey": "AddInt"},
                {"id": "node-c", "nodeKey": "AddInt"}
            ],
            "links": [
                {"id": "link-1", "startPinId": "node-a-result", "endPinId": "node-c-a"},
                {"id": "link-2", "startPinId": "node-b-result", "endPinId": "node-c-a"}
            ]
        }"#;
        let state = GraphState::from_json(json).unwrap();
        let mut graph = Graph::default();
        let report = graph.load_state(&registry, &state.nodes, &state.links);
        assert_eq!(report.links_loaded, 1);
        assert_eq!(report.links_skipped, 1);
        assert!(graph.link(&LinkId::from("link-1")).is_some());
    }
}
