// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and links.
//!
//! Every public mutation runs to completion and either fully applies or does
//! nothing. Links are stored once in the graph and referenced by ID from both
//! endpoint pins; a link never outlives either endpoint.

use crate::link::{Link, LinkId};
use crate::node::{Node, NodeId};
use crate::pin::{ContainerType, Pin, PinDirection, PinId, PinTemplate, PinType, PinValue};
use crate::registry::NodeRegistry;
use crate::variable::{PendingRename, VariableAccess, VariableId};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Something the presentation or persistence layer should react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A node was added and needs rendering
    NodeAdded(NodeId),
    /// A node was removed
    NodeRemoved(NodeId),
    /// A node's pins, literals or title changed
    NodeVisualsChanged(NodeId),
    /// Wires attached to a node need redrawing
    NodeWiresChanged(NodeId),
    /// Every wire needs redrawing
    AllWiresChanged,
    /// The node or link selection changed
    SelectionChanged,
    /// Graph content changed (autosave, compiler dirty flag)
    Modified,
}

/// Selection mode for multi-select operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Replace current selection
    #[default]
    Set,
    /// Add to current selection (Shift+Click)
    Add,
    /// Remove from current selection (Alt+Click)
    Remove,
    /// Toggle in current selection (Ctrl+Click)
    Toggle,
}

/// Pan and zoom of the graph view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Pan offset in screen pixels
    pub pan: [f32; 2],
    /// Zoom factor
    pub zoom: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            pan: [0.0, 0.0],
            zoom: 1.0,
        }
    }
}

/// A node graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Links between pins
    links: IndexMap<LinkId, Link>,
    /// Selected nodes, in selection order
    selection: Vec<NodeId>,
    /// Selected links
    link_selection: Vec<LinkId>,
    /// View pan/zoom
    pub view: ViewTransform,
    /// Events not yet collected by the host
    events: Vec<GraphEvent>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            selection: Vec::new(),
            link_selection: Vec::new(),
            view: ViewTransform::default(),
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Instantiate a template at a position.
    ///
    /// Returns `None` if the key is unknown, or if the template is a singleton
    /// that already has an instance; in that case the existing instance is
    /// selected instead.
    pub fn add_node(
        &mut self,
        registry: &NodeRegistry,
        key: &str,
        x: f32,
        y: f32,
    ) -> Option<NodeId> {
        let Some(template) = registry.get(key) else {
            tracing::warn!("Cannot add node: key '{key}' not found in registry");
            return None;
        };

        if template.is_singleton {
            let existing = self
                .nodes
                .values()
                .find(|n| n.node_key() == key)
                .map(|n| n.id.clone());
            if let Some(existing) = existing {
                tracing::warn!("Cannot add {}: only one instance allowed", template.title);
                self.select_node(&existing, SelectMode::Set);
                return None;
            }
        }

        let node = Node::new(template).with_position(x, y);
        Some(self.insert_node(node))
    }

    /// Insert an already-built node
    pub fn insert_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        tracing::debug!("Added node {} ({})", id, node.node_key());
        self.nodes.insert(id.clone(), node);
        self.events.push(GraphEvent::NodeAdded(id.clone()));
        self.events.push(GraphEvent::Modified);
        id
    }

    /// Remove a node, breaking every link on its pins first
    pub fn delete_node(&mut self, node_id: &NodeId) -> Option<Node> {
        let pin_ids: Vec<PinId> = self
            .nodes
            .get(node_id)?
            .pins()
            .iter()
            .map(|p| p.id.clone())
            .collect();
        for pin_id in &pin_ids {
            self.break_pin_links(pin_id);
        }

        let node = self.nodes.shift_remove(node_id)?;
        if self.selection.contains(node_id) {
            self.selection.retain(|id| id != node_id);
            self.events.push(GraphEvent::SelectionChanged);
        }
        tracing::debug!("Deleted node {} ({})", node_id, node.node_key());
        self.events.push(GraphEvent::NodeRemoved(node_id.clone()));
        self.events.push(GraphEvent::Modified);
        Some(node)
    }

    /// Delete every selected node; returns how many were removed
    pub fn delete_selected(&mut self) -> usize {
        let selected = std::mem::take(&mut self.selection);
        let removed = selected
            .iter()
            .filter(|id| self.delete_node(id).is_some())
            .count();
        if !selected.is_empty() {
            self.events.push(GraphEvent::SelectionChanged);
        }
        removed
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.nodes.keys()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes instantiated from a template key
    pub fn nodes_with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |n| n.node_key() == key)
    }

    /// Move a node
    pub fn move_node(&mut self, node_id: &NodeId, x: f32, y: f32) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        node.position = [x, y];
        self.events.push(GraphEvent::NodeWiresChanged(node_id.clone()));
        self.events.push(GraphEvent::Modified);
        true
    }

    /// Set the literal a data pin falls back to while unconnected
    pub fn set_pin_literal(&mut self, pin_id: &PinId, value: PinValue) -> bool {
        let Some(node) = self.nodes.get_mut(&pin_id.node) else {
            return false;
        };
        match node.pin(&pin_id.local) {
            Some(pin) if !pin.is_exec() => {}
            _ => return false,
        }
        node.pin_literals.insert(pin_id.local.clone(), value);
        self.events.push(GraphEvent::NodeVisualsChanged(pin_id.node.clone()));
        self.events.push(GraphEvent::Modified);
        true
    }

    // ------------------------------------------------------------------
    // Pins
    // ------------------------------------------------------------------

    /// Get a pin by ID
    pub fn find_pin(&self, pin_id: &PinId) -> Option<&Pin> {
        self.nodes.get(&pin_id.node)?.pin(&pin_id.local)
    }

    /// Get a pin together with its owning node
    pub fn find_pin_with_node(&self, pin_id: &PinId) -> Option<(&Node, &Pin)> {
        let node = self.nodes.get(&pin_id.node)?;
        Some((node, node.pin(&pin_id.local)?))
    }

    fn find_pin_mut(&mut self, pin_id: &PinId) -> Option<&mut Pin> {
        self.nodes.get_mut(&pin_id.node)?.pin_mut(&pin_id.local)
    }

    /// Resolve a `"{node}-{local}"` string back to a pin.
    ///
    /// Node IDs and local names may both contain `-`, so the string is matched
    /// against every known node ID and the longest prefix naming an existing
    /// pin wins.
    pub fn resolve_pin_str(&self, full_id: &str) -> Option<PinId> {
        self.nodes
            .values()
            .filter_map(|node| {
                let local = full_id.strip_prefix(node.id.as_str())?.strip_prefix('-')?;
                node.pin(local)?;
                Some((node.id.as_str().len(), node.pin_id(local)))
            })
            .max_by_key(|(prefix_len, _)| *prefix_len)
            .map(|(_, pin_id)| pin_id)
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Check whether two pins may be linked, in either argument order
    pub fn can_connect(&self, a: &PinId, b: &PinId) -> bool {
        self.check_connection(a, b).is_ok()
    }

    /// Like [`Graph::can_connect`], but says why a connection is refused.
    ///
    /// On success returns `(start, end)`: the output pin and the input pin.
    pub fn check_connection(&self, a: &PinId, b: &PinId) -> Result<(PinId, PinId), ConnectionError> {
        let pin_a = self
            .find_pin(a)
            .ok_or_else(|| ConnectionError::PinNotFound(a.clone()))?;
        let pin_b = self
            .find_pin(b)
            .ok_or_else(|| ConnectionError::PinNotFound(b.clone()))?;

        if a.node == b.node {
            return Err(ConnectionError::SameNode);
        }
        if pin_a.direction == pin_b.direction {
            return Err(ConnectionError::SameDirection);
        }

        let (start, end) = if pin_a.direction == PinDirection::Out {
            (pin_a, pin_b)
        } else {
            (pin_b, pin_a)
        };

        if !end.has_capacity() {
            return Err(ConnectionError::PinAlreadyConnected(end.id.clone()));
        }
        if start.container_type != end.container_type {
            return Err(ConnectionError::ContainerMismatch {
                start: start.container_type,
                end: end.container_type,
            });
        }
        if !start.pin_type.can_connect_to(end.pin_type) {
            return Err(ConnectionError::IncompatibleTypes {
                from: start.pin_type,
                to: end.pin_type,
            });
        }

        Ok((start.id.clone(), end.id.clone()))
    }

    /// Link two pins without re-validating.
    ///
    /// Callers check [`Graph::can_connect`] first. An input that already holds a
    /// link keeps it; breaking on rewire is the caller's job.
    pub fn create_connection(&mut self, a: &PinId, b: &PinId) -> Option<LinkId> {
        let direction_a = self.find_pin(a)?.direction;
        let direction_b = self.find_pin(b)?.direction;
        let (start, end) = match (direction_a, direction_b) {
            (PinDirection::Out, PinDirection::In) => (a.clone(), b.clone()),
            (PinDirection::In, PinDirection::Out) => (b.clone(), a.clone()),
            _ => return None,
        };

        let link = Link::new(start, end);
        let id = link.id.clone();
        self.insert_link(link);
        Some(id)
    }

    /// Validate and link two pins
    pub fn connect(&mut self, a: &PinId, b: &PinId) -> Result<LinkId, ConnectionError> {
        let (start, end) = self.check_connection(a, b)?;
        self.create_connection(&start, &end)
            .ok_or(ConnectionError::PinNotFound(start))
    }

    /// Validate and link two pins, routing a convertible type pair through a
    /// conversion node placed between the two nodes.
    ///
    /// Returns the link that ends at the input pin. When a conversion node was
    /// inserted, that link starts at the conversion node's `val_out`.
    pub fn connect_with_conversion(
        &mut self,
        registry: &NodeRegistry,
        a: &PinId,
        b: &PinId,
    ) -> Result<LinkId, ConnectionError> {
        let (start, end) = self.check_connection(a, b)?;
        let conversion = self
            .find_pin(&start)
            .zip(self.find_pin(&end))
            .filter(|(from, to)| !from.is_exec() && from.pin_type != to.pin_type)
            .and_then(|(from, to)| from.pin_type.conversion_node_key(to.pin_type))
            .filter(|key| registry.contains(key));
        let Some(key) = conversion else {
            return self
                .create_connection(&start, &end)
                .ok_or(ConnectionError::PinNotFound(start));
        };

        let [x, y] = match (self.nodes.get(&start.node), self.nodes.get(&end.node)) {
            (Some(from), Some(to)) => [(from.x() + to.x()) / 2.0 - 40.0, (from.y() + to.y()) / 2.0 - 15.0],
            _ => return Err(ConnectionError::PinNotFound(start)),
        };
        let converter = self
            .add_node(registry, key, x, y)
            .ok_or_else(|| ConnectionError::PinNotFound(start.clone()))?;
        tracing::debug!("Inserted {} between {} and {}", key, start, end);
        self.create_connection(&start, &PinId::new(converter.clone(), "val_in"));
        self.create_connection(&PinId::new(converter, "val_out"), &end)
            .ok_or(ConnectionError::PinNotFound(end))
    }

    /// Register a link and attach it to both endpoint pins
    pub(crate) fn insert_link(&mut self, link: Link) {
        let id = link.id.clone();
        if let Some(pin) = self.find_pin_mut(&link.start) {
            pin.links.push(id.clone());
        }
        if let Some(pin) = self.find_pin_mut(&link.end) {
            pin.links.push(id.clone());
        }
        tracing::debug!("Linked {} -> {} ({})", link.start, link.end, id);
        self.push_link_events(&link);
        self.links.insert(id, link);
    }

    fn push_link_events(&mut self, link: &Link) {
        for node in [&link.end.node, &link.start.node] {
            self.events.push(GraphEvent::NodeVisualsChanged(node.clone()));
            self.events.push(GraphEvent::NodeWiresChanged(node.clone()));
        }
        self.events.push(GraphEvent::Modified);
    }

    /// Remove a single link, detaching it from both pins
    pub fn break_link(&mut self, link_id: &LinkId) -> Option<Link> {
        let link = self.links.shift_remove(link_id)?;
        for pin_id in [&link.start, &link.end] {
            if let Some(pin) = self.find_pin_mut(pin_id) {
                pin.links.retain(|id| id != link_id);
            }
        }
        if self.link_selection.contains(link_id) {
            self.link_selection.retain(|id| id != link_id);
            self.events.push(GraphEvent::SelectionChanged);
        }
        tracing::debug!("Broke link {} ({} -> {})", link_id, link.start, link.end);
        self.push_link_events(&link);
        Some(link)
    }

    /// Remove every link touching a pin; returns how many were broken
    pub fn break_pin_links(&mut self, pin_id: &PinId) -> usize {
        let link_ids: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.involves_pin(pin_id))
            .map(|l| l.id.clone())
            .collect();
        link_ids
            .iter()
            .filter(|id| self.break_link(id).is_some())
            .count()
    }

    /// Start a new wire drag from `pin_id`. A connected input pin gives up its
    /// link first, since it can only hold one.
    pub fn detach_for_rewire(&mut self, pin_id: &PinId) -> usize {
        match self.find_pin(pin_id) {
            Some(pin) if pin.is_input() && pin.is_connected() => self.break_pin_links(pin_id),
            _ => 0,
        }
    }

    /// Get a link by ID
    pub fn link(&self, link_id: &LinkId) -> Option<&Link> {
        self.links.get(link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get links touching a specific pin
    pub fn links_for_pin<'a>(&'a self, pin_id: &'a PinId) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.values().filter(move |l| l.involves_pin(pin_id))
    }

    /// Get links touching a node
    pub fn links_for_node<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.values().filter(move |l| l.involves_node(node_id))
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    // ------------------------------------------------------------------
    // Template synchronization
    // ------------------------------------------------------------------

    /// Rebuild a node's pins from its current template.
    ///
    /// Pins are matched to the old set by full ID. A matching pin with the same
    /// shape keeps its links and literal. A matching pin whose type, container
    /// or direction changed keeps only the links that are still valid and gets
    /// the template default literal. Old pins with no counterpart lose their
    /// links. Returns `false` if the node or its template is missing.
    pub fn synchronize_node_with_template(&mut self, node_id: &NodeId, registry: &NodeRegistry) -> bool {
        let Some(node) = self.nodes.get(node_id) else {
            return false;
        };
        let Some(template) = registry.get(node.node_key()) else {
            tracing::debug!("No template '{}' for node {}", node.node_key(), node_id);
            return false;
        };

        let mut rebuilt = node.build_pins(template);
        let mut literals = IndexMap::new();
        let mut stale_links: Vec<LinkId> = Vec::new();

        for pin in &mut rebuilt {
            let local = pin.id.local.clone();
            let literal = match node.pin(&local) {
                Some(old)
                    if old.pin_type == pin.pin_type
                        && old.container_type == pin.container_type
                        && old.direction == pin.direction =>
                {
                    pin.links = old.links.clone();
                    node.literal(&local).cloned()
                }
                Some(old) => {
                    for link_id in &old.links {
                        if self.link_still_fits(link_id, pin) {
                            pin.links.push(link_id.clone());
                        } else {
                            stale_links.push(link_id.clone());
                        }
                    }
                    None
                }
                None => None,
            };
            if !pin.is_exec() {
                literals.insert(local, literal.unwrap_or_else(|| pin.default_value.clone()));
            }
        }

        for old in node.pins() {
            if !rebuilt.iter().any(|p| p.id == old.id) {
                stale_links.extend(old.links.iter().cloned());
            }
        }

        let title = (!node.supports_dynamic_pins()).then(|| template.title.clone());
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        if let Some(title) = title {
            node.title = title;
        }
        node.pins = rebuilt;
        node.pin_literals = literals;

        self.events.push(GraphEvent::NodeVisualsChanged(node_id.clone()));
        self.events.push(GraphEvent::NodeWiresChanged(node_id.clone()));

        stale_links.sort();
        stale_links.dedup();
        for link_id in &stale_links {
            self.break_link(link_id);
        }
        true
    }

    /// Whether an existing link would still be valid with `pin` as its endpoint
    fn link_still_fits(&self, link_id: &LinkId, pin: &Pin) -> bool {
        let Some(other) = self
            .links
            .get(link_id)
            .and_then(|link| link.other_end(&pin.id))
            .and_then(|other| self.find_pin(other))
        else {
            return false;
        };
        match pin.direction {
            PinDirection::Out => Pin::accepts_link(pin, other),
            PinDirection::In => Pin::accepts_link(other, pin),
        }
    }

    /// Point a node at a different template key and resynchronize it
    pub fn retarget_node(&mut self, node_id: &NodeId, key: &str, registry: &NodeRegistry) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        node.set_node_key(key);
        self.events.push(GraphEvent::Modified);
        self.synchronize_node_with_template(node_id, registry)
    }

    /// Retarget the Get/Set nodes a queued rename applies to. A node that
    /// carries a variable ID only follows a rename of that variable; a node
    /// without one follows any rename of its name. Returns how many nodes were
    /// retargeted.
    pub fn update_variable_nodes(&mut self, rename: &PendingRename, registry: &NodeRegistry) -> usize {
        let targets: Vec<(NodeId, String)> = self
            .nodes
            .values()
            .filter_map(|node| {
                let (access, name) = VariableAccess::parse(node.node_key())?;
                let follows = match (&node.variable_id, &rename.variable_id) {
                    (Some(bound), Some(renamed)) => bound == renamed,
                    _ => true,
                };
                (name == rename.old_name && follows).then(|| (node.id.clone(), access.key_for(&rename.new_name)))
            })
            .collect();
        for (node_id, key) in &targets {
            self.retarget_node(node_id, key, registry);
        }
        targets.len()
    }

    /// Get/Set nodes bound to a variable: by stored ID, or by key for nodes
    /// that carry no ID
    pub fn variable_node_ids(&self, variable_id: &VariableId, name: &str) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| match &node.variable_id {
                Some(bound) => bound == variable_id,
                None => VariableAccess::parse(node.node_key()).is_some_and(|(_, n)| n == name),
            })
            .map(|node| node.id.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Dynamic pins
    // ------------------------------------------------------------------

    /// Add a parameter output to a node that supports dynamic pins
    pub fn add_event_parameter(&mut self, node_id: &NodeId, name: &str, pin_type: PinType) -> Option<PinId> {
        if pin_type.is_exec() {
            return None;
        }
        let node = self.nodes.get_mut(node_id)?;
        if !node.supports_dynamic_pins() {
            tracing::warn!("Node {} does not accept parameters", node_id);
            return None;
        }

        let local = (0u32..)
            .map(|i| format!("param_{i}"))
            .find(|id| node.pin(id).is_none())?;
        let template = PinTemplate::output(local.clone(), name, pin_type).custom();
        let pin = Pin::from_template(node_id, &template);
        node.pin_literals.insert(local.clone(), pin.default_value.clone());
        node.pins.push(pin);
        node.params_mut()?.push(template);

        self.events.push(GraphEvent::NodeVisualsChanged(node_id.clone()));
        self.events.push(GraphEvent::Modified);
        Some(PinId::new(node_id.clone(), local))
    }

    /// Remove a user-added parameter, breaking its links first
    pub fn remove_event_parameter(&mut self, pin_id: &PinId) -> bool {
        let is_param = self
            .nodes
            .get(&pin_id.node)
            .is_some_and(|node| node.params().iter().any(|p| p.id == pin_id.local));
        if !is_param {
            return false;
        }

        self.break_pin_links(pin_id);
        let Some(node) = self.nodes.get_mut(&pin_id.node) else {
            return false;
        };
        if let Some(params) = node.params_mut() {
            params.retain(|p| p.id != pin_id.local);
        }
        node.pins.retain(|p| p.id.local != pin_id.local);
        node.pin_literals.shift_remove(&pin_id.local);

        self.events.push(GraphEvent::NodeVisualsChanged(pin_id.node.clone()));
        self.events.push(GraphEvent::Modified);
        true
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Change the selection; returns `false` for unknown nodes
    pub fn select_node(&mut self, node_id: &NodeId, mode: SelectMode) -> bool {
        if !self.nodes.contains_key(node_id) {
            return false;
        }
        let selected = self.selection.contains(node_id);
        match mode {
            SelectMode::Set => self.selection = vec![node_id.clone()],
            SelectMode::Add if !selected => self.selection.push(node_id.clone()),
            SelectMode::Remove | SelectMode::Toggle if selected => {
                self.selection.retain(|id| id != node_id);
            }
            SelectMode::Toggle => self.selection.push(node_id.clone()),
            SelectMode::Add | SelectMode::Remove => {}
        }
        self.events.push(GraphEvent::SelectionChanged);
        true
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.events.push(GraphEvent::SelectionChanged);
        }
    }

    /// Select every node
    pub fn select_all(&mut self) {
        self.selection = self.nodes.keys().cloned().collect();
        self.events.push(GraphEvent::SelectionChanged);
    }

    /// Selected nodes, in selection order
    pub fn selected_nodes(&self) -> &[NodeId] {
        &self.selection
    }

    /// Check if a node is selected
    pub fn is_selected(&self, node_id: &NodeId) -> bool {
        self.selection.contains(node_id)
    }

    /// Select the nodes whose center lies inside the rectangle `min..=max`.
    /// `node_size` gives each node's rendered size. With [`SelectMode::Set`]
    /// the previous selection is replaced, the other modes apply per node.
    /// Returns how many nodes were inside.
    pub fn select_nodes_in_rect(
        &mut self,
        min: [f32; 2],
        max: [f32; 2],
        mode: SelectMode,
        node_size: impl Fn(&Node) -> [f32; 2],
    ) -> usize {
        let inside: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|&node| {
                let [w, h] = node_size(node);
                let center = [node.x() + w / 2.0, node.y() + h / 2.0];
                (0..2).all(|axis| center[axis] >= min[axis] && center[axis] <= max[axis])
            })
            .map(|node| node.id.clone())
            .collect();

        if mode == SelectMode::Set {
            self.selection.clear();
        }
        let per_node = match mode {
            SelectMode::Set => SelectMode::Add,
            other => other,
        };
        for node_id in &inside {
            self.select_node(node_id, per_node);
        }
        self.events.push(GraphEvent::SelectionChanged);
        inside.len()
    }

    /// Select a single link, or deselect it if it already is. Clears the node
    /// selection. Returns `false` for unknown links.
    pub fn toggle_link_selection(&mut self, link_id: &LinkId) -> bool {
        if !self.links.contains_key(link_id) {
            return false;
        }
        self.selection.clear();
        if self.link_selection.contains(link_id) {
            self.link_selection.retain(|id| id != link_id);
        } else {
            self.link_selection = vec![link_id.clone()];
        }
        self.events.push(GraphEvent::SelectionChanged);
        true
    }

    /// Clear the link selection
    pub fn clear_link_selection(&mut self) {
        if !self.link_selection.is_empty() {
            self.link_selection.clear();
            self.events.push(GraphEvent::SelectionChanged);
        }
    }

    /// Selected links
    pub fn selected_links(&self) -> &[LinkId] {
        &self.link_selection
    }

    /// Break every selected link; returns how many were removed
    pub fn delete_selected_links(&mut self) -> usize {
        let selected = std::mem::take(&mut self.link_selection);
        selected
            .iter()
            .filter(|id| self.break_link(id).is_some())
            .count()
    }

    /// Duplicate the selected nodes, offset by `offset`, together with the links
    /// running between them. Singleton nodes are not duplicated. The copies
    /// become the new selection. With no node selected, the selected links are
    /// deleted instead.
    pub fn duplicate_selected(&mut self, registry: &NodeRegistry, offset: f32) -> Vec<NodeId> {
        if self.selection.is_empty() {
            self.delete_selected_links();
            return Vec::new();
        }
        let originals = self.selection.clone();
        let mut pin_map: HashMap<PinId, PinId> = HashMap::new();
        let mut created = Vec::new();

        for node_id in &originals {
            let Some(node) = self.nodes.get(node_id) else {
                continue;
            };
            if registry.get(node.node_key()).is_some_and(|t| t.is_singleton) {
                tracing::warn!("Skipping duplicate of singleton {}", node.title);
                continue;
            }
            let mut copy = node.duplicate();
            copy.position = [node.x() + offset, node.y() + offset];
            for (old, new) in node.pins().iter().zip(copy.pins()) {
                pin_map.insert(old.id.clone(), new.id.clone());
            }
            created.push(self.insert_node(copy));
        }

        let internal: Vec<(PinId, PinId)> = self
            .links
            .values()
            .filter_map(|l| Some((pin_map.get(&l.start)?.clone(), pin_map.get(&l.end)?.clone())))
            .collect();
        for (start, end) in &internal {
            self.create_connection(start, end);
        }

        self.selection = created.clone();
        self.events.push(GraphEvent::SelectionChanged);
        created
    }

    /// Round selected node positions to a grid
    pub fn snap_selected_to_grid(&mut self, grid: f32) {
        if grid <= 0.0 {
            return;
        }
        for node_id in self.selection.clone() {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.position = node.position.map(|v| (v / grid).round() * grid);
                self.events.push(GraphEvent::NodeWiresChanged(node_id));
            }
        }
        self.events.push(GraphEvent::Modified);
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Take all pending events
    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    /// Pending events, oldest first
    pub fn pending_events(&self) -> &[GraphEvent] {
        &self.events
    }

    /// Request a redraw of every wire
    pub fn request_full_redraw(&mut self) {
        self.events.push(GraphEvent::AllWiresChanged);
    }

    /// Flag a change made outside the graph (e.g. a variable edit)
    pub fn mark_modified(&mut self) {
        self.events.push(GraphEvent::Modified);
    }

    /// Remove every node and link
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.selection.clear();
        self.link_selection.clear();
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("EventGraph")
    }
}

/// Reason two pins cannot be linked
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Pin not found
    #[error("Pin not found: {0}")]
    PinNotFound(PinId),

    /// Both pins are on the same node
    #[error("Cannot link a node to itself")]
    SameNode,

    /// Both pins are inputs or both are outputs
    #[error("Pins must be one input and one output")]
    SameDirection,

    /// Input already holds its one link
    #[error("Pin already connected: {0}")]
    PinAlreadyConnected(PinId),

    /// Container shapes differ
    #[error("Container mismatch: {start:?} -> {end:?}")]
    ContainerMismatch {
        /// Output container
        start: ContainerType,
        /// Input container
        end: ContainerType,
    },

    /// No implicit conversion between the pin types
    #[error("Cannot convert {} to {}", .from.display_name(), .to.display_name())]
    IncompatibleTypes {
        /// Output type
        from: PinType,
        /// Input type
        to: PinType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::blueprint::create_blueprint_registry;
    use crate::node::{NodeKind, NodeTemplate};

    fn pin(graph: &Graph, node: &NodeId, local: &str) -> PinId {
        graph.node(node).map(|n| n.pin_id(local)).unwrap()
    }

    #[test]
    fn test_add_node_unknown_key() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        assert!(graph.add_node(&registry, "NoSuchNode", 0.0, 0.0).is_none());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_singleton_selects_existing() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let first = graph.add_node(&registry, "EventBeginPlay", 50.0, 50.0).unwrap();
        graph.clear_selection();

        assert!(graph.add_node(&registry, "EventBeginPlay", 90.0, 90.0).is_none());
        assert_eq!(graph.nodes_with_key("EventBeginPlay").count(), 1);
        assert_eq!(graph.selected_nodes(), &[first]);
    }

    #[test]
    fn test_can_connect_rules() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let add = graph.add_node(&registry, "AddInt", 0.0, 0.0).unwrap();
        let add_float = graph.add_node(&registry, "AddFloat", 200.0, 0.0).unwrap();
        let not = graph.add_node(&registry, "NOT", 200.0, 100.0).unwrap();
        let print = graph.add_node(&registry, "PrintString", 400.0, 0.0).unwrap();

        let int_out = pin(&graph, &add, "result");
        let float_in = pin(&graph, &add_float, "a");
        let bool_in = pin(&graph, &not, "a");
        let string_in = pin(&graph, &print, "in_string");

        // int -> float and int -> string convert, int -> bool does not
        assert!(graph.can_connect(&int_out, &float_in));
        assert!(graph.can_connect(&string_in, &int_out));
        assert_eq!(
            graph.check_connection(&int_out, &bool_in),
            Err(ConnectionError::IncompatibleTypes { from: PinType::Int, to: PinType::Bool })
        );

        // same node and same direction
        assert_eq!(
            graph.check_connection(&int_out, &pin(&graph, &add, "a")),
            Err(ConnectionError::SameNode)
        );
        assert_eq!(
            graph.check_connection(&float_in, &bool_in),
            Err(ConnectionError::SameDirection)
        );

        // exec only with exec
        let exec_in = pin(&graph, &print, "exec_in");
        assert!(!graph.can_connect(&int_out, &exec_in));
    }

    #[test]
    fn test_fan_in_is_one() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let a = graph.add_node(&registry, "AddInt", 0.0, 0.0).unwrap();
        let b = graph.add_node(&registry, "AddInt", 0.0, 100.0).unwrap();
        let sum = graph.add_node(&registry, "AddInt", 200.0, 0.0).unwrap();

        let target = pin(&graph, &sum, "a");
        graph.connect(&pin(&graph, &a, "result"), &target).unwrap();
        assert_eq!(
            graph.connect(&pin(&graph, &b, "result"), &target),
            Err(ConnectionError::PinAlreadyConnected(target.clone()))
        );

        // rewiring from the input releases the old link
        assert_eq!(graph.detach_for_rewire(&target), 1);
        graph.connect(&pin(&graph, &b, "result"), &target).unwrap();
        assert_eq!(graph.find_pin(&target).unwrap().links.len(), 1);
    }

    #[test]
    fn test_output_fans_out() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let source = graph.add_node(&registry, "AddInt", 0.0, 0.0).unwrap();
        let out = pin(&graph, &source, "result");
        for i in 0..3 {
            let target = graph.add_node(&registry, "AddInt", 200.0, i as f32 * 100.0).unwrap();
            graph.connect(&out, &pin(&graph, &target, "b")).unwrap();
        }
        assert_eq!(graph.find_pin(&out).unwrap().links.len(), 3);
        assert_eq!(graph.break_pin_links(&out), 3);
        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.break_pin_links(&out), 0);
    }

    #[test]
    fn test_break_single_link() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let source = graph.add_node(&registry, "AddInt", 0.0, 0.0).unwrap();
        let sink = graph.add_node(&registry, "AddInt", 200.0, 0.0).unwrap();
        let out = pin(&graph, &source, "result");
        let first = graph.connect(&out, &pin(&graph, &sink, "a")).unwrap();
        let second = graph.connect(&out, &pin(&graph, &sink, "b")).unwrap();

        assert_eq!(graph.links_for_node(&sink).count(), 2);
        assert_eq!(graph.links_for_pin(&out).count(), 2);

        let removed = graph.break_link(&first).unwrap();
        assert_eq!(removed.end, pin(&graph, &sink, "a"));
        assert!(graph.break_link(&first).is_none());
        assert_eq!(graph.find_pin(&out).unwrap().links, vec![second]);
        assert!(graph.find_pin(&removed.end).unwrap().links.is_empty());
        assert_eq!(graph.links_for_node(&source).count(), 1);
    }

    #[test]
    fn test_link_selection() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let source = graph.add_node(&registry, "AddInt", 0.0, 0.0).unwrap();
        let sink = graph.add_node(&registry, "AddInt", 200.0, 0.0).unwrap();
        let out = pin(&graph, &source, "result");
        let first = graph.connect(&out, &pin(&graph, &sink, "a")).unwrap();
        let second = graph.connect(&out, &pin(&graph, &sink, "b")).unwrap();

        graph.select_node(&source, SelectMode::Set);
        assert!(graph.toggle_link_selection(&first));
        assert!(graph.selected_nodes().is_empty());
        assert!(graph.toggle_link_selection(&second));
        assert_eq!(graph.selected_links(), &[second.clone()]);
        assert!(graph.toggle_link_selection(&second));
        assert!(graph.selected_links().is_empty());
        assert!(!graph.toggle_link_selection(&LinkId::new()));

        // breaking a selected link drops it from the selection
        graph.toggle_link_selection(&first);
        graph.break_pin_links(&pin(&graph, &sink, "a"));
        assert!(graph.selected_links().is_empty());

        graph.toggle_link_selection(&second);
        assert_eq!(graph.delete_selected_links(), 1);
        assert_eq!(graph.link_count(), 0);
        assert!(graph.find_pin(&out).unwrap().links.is_empty());
        assert!(graph.selected_links().is_empty());
    }

    #[test]
    fn test_duplicate_without_nodes_deletes_selected_links() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let begin = graph.add_node(&registry, "EventBeginPlay", 0.0, 0.0).unwrap();
        let print = graph.add_node(&registry, "PrintString", 200.0, 0.0).unwrap();
        let link = graph
            .connect(&pin(&graph, &begin, "exec_out"), &pin(&graph, &print, "exec_in"))
            .unwrap();

        graph.toggle_link_selection(&link);
        assert!(graph.duplicate_selected(&registry, 20.0).is_empty());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_select_nodes_in_rect() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let near = graph.add_node(&registry, "Branch", 10.0, 10.0).unwrap();
        let edge = graph.add_node(&registry, "Sequence", 150.0, 10.0).unwrap();
        let far = graph.add_node(&registry, "FlipFlop", 400.0, 400.0).unwrap();
        let size = |_: &Node| [100.0, 40.0];

        // centers at (60, 30), (200, 30) and (450, 420)
        assert_eq!(graph.select_nodes_in_rect([0.0, 0.0], [200.0, 100.0], SelectMode::Set, size), 2);
        assert_eq!(graph.selected_nodes(), &[near.clone(), edge.clone()]);

        assert_eq!(graph.select_nodes_in_rect([300.0, 300.0], [500.0, 500.0], SelectMode::Add, size), 1);
        assert!(graph.is_selected(&far));

        graph.select_nodes_in_rect([0.0, 0.0], [100.0, 100.0], SelectMode::Toggle, size);
        assert!(!graph.is_selected(&near));
        assert!(graph.is_selected(&edge));

        assert_eq!(graph.select_nodes_in_rect([900.0, 900.0], [950.0, 950.0], SelectMode::Set, size), 0);
        assert!(graph.selected_nodes().is_empty());
    }

    #[test]
    fn test_delete_node_breaks_links() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let begin = graph.add_node(&registry, "EventBeginPlay", 0.0, 0.0).unwrap();
        let print = graph.add_node(&registry, "PrintString", 200.0, 0.0).unwrap();
        let exec_in = pin(&graph, &print, "exec_in");
        graph.connect(&pin(&graph, &begin, "exec_out"), &exec_in).unwrap();

        graph.select_node(&begin, SelectMode::Set);
        assert_eq!(graph.delete_selected(), 1);
        assert_eq!(graph.link_count(), 0);
        assert!(graph.find_pin(&exec_in).unwrap().links.is_empty());
        assert!(graph.selected_nodes().is_empty());
    }

    #[test]
    fn test_resolve_pin_str_longest_prefix() {
        let mut registry = NodeRegistry::new();
        registry.register(
            NodeTemplate::new("Tap", "Tap", NodeKind::Pure).with_pins(vec![
                PinTemplate::output("val_out", "Out", PinType::Int),
                PinTemplate::output("b-val_out", "Out", PinType::Int),
            ]),
        );
        let mut graph = Graph::default();
        let short = Node::with_id(NodeId::from("node-a"), registry.get("Tap").unwrap());
        let long = Node::with_id(NodeId::from("node-a-b"), registry.get("Tap").unwrap());
        graph.insert_node(short);
        graph.insert_node(long);

        // "node-a" + "b-val_out" and "node-a-b" + "val_out" both exist; the longer node ID wins
        let resolved = graph.resolve_pin_str("node-a-b-val_out").unwrap();
        assert_eq!(resolved.node, NodeId::from("node-a-b"));
        assert_eq!(resolved.local, "val_out");

        let resolved = graph.resolve_pin_str("node-a-val_out").unwrap();
        assert_eq!(resolved.node, NodeId::from("node-a"));
        assert!(graph.resolve_pin_str("node-z-val_out").is_none());
    }

    #[test]
    fn test_custom_event_parameters() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let event = graph.add_node(&registry, "CustomEvent", 0.0, 0.0).unwrap();
        let print = graph.add_node(&registry, "PrintString", 200.0, 0.0).unwrap();

        let param = graph.add_event_parameter(&event, "Message", PinType::String).unwrap();
        assert!(graph.find_pin(&param).unwrap().is_custom);
        graph.connect(&param, &pin(&graph, &print, "in_string")).unwrap();

        // survives resynchronization
        assert!(graph.synchronize_node_with_template(&event, &registry));
        assert_eq!(graph.link_count(), 1);

        assert!(graph.remove_event_parameter(&param));
        assert_eq!(graph.link_count(), 0);
        assert!(graph.find_pin(&param).is_none());

        // static nodes refuse parameters
        assert!(graph.add_event_parameter(&print, "Extra", PinType::Int).is_none());
    }

    #[test]
    fn test_duplicate_selected_keeps_internal_links() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let begin = graph.add_node(&registry, "EventBeginPlay", 0.0, 0.0).unwrap();
        let add = graph.add_node(&registry, "AddInt", 0.0, 100.0).unwrap();
        let sum = graph.add_node(&registry, "AddInt", 200.0, 100.0).unwrap();
        graph.connect(&pin(&graph, &add, "result"), &pin(&graph, &sum, "a")).unwrap();
        graph.set_pin_literal(&pin(&graph, &add, "b"), PinValue::Int(7));

        graph.select_node(&begin, SelectMode::Set);
        graph.select_node(&add, SelectMode::Add);
        graph.select_node(&sum, SelectMode::Add);
        let copies = graph.duplicate_selected(&registry, 20.0);

        // singleton skipped, internal link recreated
        assert_eq!(copies.len(), 2);
        assert_eq!(graph.link_count(), 2);
        let copy = graph.node(&copies[0]).unwrap();
        assert_eq!(copy.position, [20.0, 120.0]);
        assert_eq!(copy.literal("b"), Some(&PinValue::Int(7)));
        assert_eq!(graph.selected_nodes(), copies.as_slice());
    }

    #[test]
    fn test_select_modes() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let a = graph.add_node(&registry, "AddInt", 0.0, 0.0).unwrap();
        let b = graph.add_node(&registry, "AddInt", 0.0, 0.0).unwrap();

        graph.select_node(&a, SelectMode::Set);
        graph.select_node(&b, SelectMode::Toggle);
        assert_eq!(graph.selected_nodes().len(), 2);
        graph.select_node(&a, SelectMode::Remove);
        assert_eq!(graph.selected_nodes(), &[b.clone()]);
        graph.select_node(&b, SelectMode::Toggle);
        assert!(graph.selected_nodes().is_empty());
    }

    #[test]
    fn test_snap_to_grid() {
        let registry = create_blueprint_registry();
        let mut graph = Graph::default();
        let a = graph.add_node(&registry, "AddInt", 13.0, 27.0).unwrap();
        graph.select_node(&a, SelectMode::Set);
        graph.snap_selected_to_grid(10.0);
        assert_eq!(graph.node(&a).unwrap().position, [10.0, 30.0]);
    }
}
