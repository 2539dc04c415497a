// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application root: one registry, one variable store, one graph and one
//! compiler, plus the host callbacks they report to.

use crate::compiler::Compiler;
use crate::graph::{ConnectionError, Graph, GraphEvent, SelectMode};
use crate::graphs::blueprint::create_blueprint_registry;
use crate::graphs::material::create_material_registry;
use crate::link::LinkId;
use crate::node::{Node, NodeId};
use crate::pin::{ContainerType, PinDirection, PinId, PinType, PinValue};
use crate::registry::NodeRegistry;
use crate::state::{GraphState, LoadReport, NodeData, PanData};
use crate::variable::{PendingRename, Variable, VariableAccess, VariableError, VariableId, VariableStore};

/// Callbacks into the presentation and persistence layers.
///
/// Every method has an empty default so hosts implement only what they need.
pub trait EditorHooks {
    /// A node was added or loaded
    fn render_node(&mut self, _node: &Node) {}
    /// A node was removed
    fn remove_node(&mut self, _node_id: &NodeId) {}
    /// A node's pins, literals or title changed
    fn update_visuals(&mut self, _node: &Node) {}
    /// Wires attached to a node moved or changed
    fn redraw_node_wires(&mut self, _node_id: &NodeId) {}
    /// Every wire needs redrawing
    fn redraw_all_wires(&mut self) {}
    /// Graph content changed and should be persisted
    fn auto_save(&mut self) {}
    /// A single node is selected
    fn show_node_details(&mut self, _node: &Node) {}
    /// Selection is empty or spans several nodes
    fn clear_details(&mut self) {}
}

/// Hooks that ignore everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl EditorHooks for NoopHooks {}

/// An open graph document
pub struct Blueprint {
    /// Node templates, including generated variable templates
    pub registry: NodeRegistry,
    /// User variables
    pub variables: VariableStore,
    /// The graph
    pub graph: Graph,
    /// Compile state
    pub compiler: Compiler,
    hooks: Box<dyn EditorHooks>,
}

impl Blueprint {
    /// Create an empty document over a node catalog
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            registry,
            variables: VariableStore::new(),
            graph: Graph::default(),
            compiler: Compiler::new(),
            hooks: Box::new(NoopHooks),
        }
    }

    /// Create an empty material document
    pub fn material() -> Self {
        let mut blueprint = Self::new(create_material_registry());
        blueprint.graph.name = "MaterialGraph".to_string();
        blueprint
    }

    /// Replace the host callbacks
    pub fn with_hooks(mut self, hooks: Box<dyn EditorHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Deliver queued graph events to the hooks. A batch containing any
    /// modification marks the compiler dirty and autosaves once.
    pub fn flush_events(&mut self) {
        let events = self.graph.take_events();
        let mut modified = false;
        for event in events {
            match event {
                GraphEvent::NodeAdded(id) => {
                    if let Some(node) = self.graph.node(&id) {
                        self.hooks.render_node(node);
                    }
                }
                GraphEvent::NodeRemoved(id) => self.hooks.remove_node(&id),
                GraphEvent::NodeVisualsChanged(id) => {
                    if let Some(node) = self.graph.node(&id) {
                        self.hooks.update_visuals(node);
                    }
                }
                GraphEvent::NodeWiresChanged(id) => {
                    if self.graph.node(&id).is_some() {
                        self.hooks.redraw_node_wires(&id);
                    }
                }
                GraphEvent::AllWiresChanged => self.hooks.redraw_all_wires(),
                GraphEvent::SelectionChanged => match self.graph.selected_nodes() {
                    [single] => {
                        if let Some(node) = self.graph.node(single) {
                            self.hooks.show_node_details(node);
                        }
                    }
                    _ => self.hooks.clear_details(),
                },
                GraphEvent::Modified => modified = true,
            }
        }
        if modified {
            self.compiler.mark_dirty();
            self.hooks.auto_save();
        }
    }

    // ------------------------------------------------------------------
    // Graph edits
    // ------------------------------------------------------------------

    /// Add a node from the catalog
    pub fn add_node(&mut self, key: &str, x: f32, y: f32) -> Option<NodeId> {
        let id = self.graph.add_node(&self.registry, key, x, y);
        self.flush_events();
        id
    }

    /// Delete a node and its links
    pub fn delete_node(&mut self, node_id: &NodeId) -> bool {
        let removed = self.graph.delete_node(node_id).is_some();
        self.flush_events();
        removed
    }

    /// Delete the selected nodes
    pub fn delete_selected(&mut self) -> usize {
        let removed = self.graph.delete_selected();
        self.flush_events();
        removed
    }

    /// Change the selection
    pub fn select_node(&mut self, node_id: &NodeId, mode: SelectMode) -> bool {
        let changed = self.graph.select_node(node_id, mode);
        self.flush_events();
        changed
    }

    /// Select every node
    pub fn select_all(&mut self) {
        self.graph.select_all();
        self.flush_events();
    }

    /// Select the nodes inside a rectangle, given each node's rendered size
    pub fn select_nodes_in_rect(
        &mut self,
        min: [f32; 2],
        max: [f32; 2],
        mode: SelectMode,
        node_size: impl Fn(&Node) -> [f32; 2],
    ) -> usize {
        let inside = self.graph.select_nodes_in_rect(min, max, mode, node_size);
        self.flush_events();
        inside
    }

    /// Select or deselect a single link
    pub fn toggle_link_selection(&mut self, link_id: &LinkId) -> bool {
        let known = self.graph.toggle_link_selection(link_id);
        self.flush_events();
        known
    }

    /// Break the selected links
    pub fn delete_selected_links(&mut self) -> usize {
        let removed = self.graph.delete_selected_links();
        self.flush_events();
        removed
    }

    /// Move a node
    pub fn move_node(&mut self, node_id: &NodeId, x: f32, y: f32) -> bool {
        let moved = self.graph.move_node(node_id, x, y);
        self.flush_events();
        moved
    }

    /// Round selected node positions to a grid
    pub fn snap_selected_to_grid(&mut self, grid: f32) {
        self.graph.snap_selected_to_grid(grid);
        self.flush_events();
    }

    /// Duplicate the selected nodes
    pub fn duplicate_selected(&mut self, offset: f32) -> Vec<NodeId> {
        let copies = self.graph.duplicate_selected(&self.registry, offset);
        self.flush_events();
        copies
    }

    /// Validate and link two pins. A convertible type pair gets a conversion
    /// node in between; the returned link is the one ending at the input.
    pub fn connect(&mut self, a: &PinId, b: &PinId) -> Result<LinkId, ConnectionError> {
        let result = self.graph.connect_with_conversion(&self.registry, a, b);
        self.flush_events();
        result
    }

    /// Link two pins that the caller already checked
    pub fn create_connection(&mut self, a: &PinId, b: &PinId) -> Option<LinkId> {
        let link = self.graph.create_connection(a, b);
        self.flush_events();
        link
    }

    /// Break every link on a pin
    pub fn break_pin_links(&mut self, pin_id: &PinId) -> usize {
        let broken = self.graph.break_pin_links(pin_id);
        self.flush_events();
        broken
    }

    /// Set an unconnected pin's literal
    pub fn set_pin_literal(&mut self, pin_id: &PinId, value: PinValue) -> bool {
        let changed = self.graph.set_pin_literal(pin_id, value);
        self.flush_events();
        changed
    }

    /// Add a parameter to a custom event
    pub fn add_event_parameter(&mut self, node_id: &NodeId, name: &str, pin_type: PinType) -> Option<PinId> {
        let pin = self.graph.add_event_parameter(node_id, name, pin_type);
        self.flush_events();
        pin
    }

    /// Remove a custom event parameter
    pub fn remove_event_parameter(&mut self, pin_id: &PinId) -> bool {
        let removed = self.graph.remove_event_parameter(pin_id);
        self.flush_events();
        removed
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Create a variable
    pub fn create_variable(&mut self, name: &str, pin_type: PinType) -> Result<VariableId, VariableError> {
        let id = self.variables.create_variable(name, pin_type, &mut self.registry)?;
        self.variables_changed();
        Ok(id)
    }

    /// Rename a variable; nodes follow at the next compile
    pub fn rename_variable(&mut self, id: &VariableId, name: &str) -> Result<(), VariableError> {
        self.variables.rename_variable(id, name, &mut self.registry)?;
        self.variables_changed();
        Ok(())
    }

    /// Change a variable's type; nodes follow immediately
    pub fn set_variable_type(&mut self, id: &VariableId, pin_type: PinType) -> Result<usize, VariableError> {
        let touched = self
            .variables
            .set_variable_type(id, pin_type, &mut self.registry, &mut self.graph)?;
        self.variables_changed();
        Ok(touched)
    }

    /// Change a variable's container; nodes follow immediately
    pub fn set_variable_container(
        &mut self,
        id: &VariableId,
        container_type: ContainerType,
    ) -> Result<usize, VariableError> {
        let touched = self
            .variables
            .set_variable_container(id, container_type, &mut self.registry, &mut self.graph)?;
        self.variables_changed();
        Ok(touched)
    }

    /// Change a variable's initial value
    pub fn set_variable_default(&mut self, id: &VariableId, value: PinValue) -> Result<(), VariableError> {
        self.variables.set_variable_default(id, value, &mut self.registry)?;
        self.variables_changed();
        Ok(())
    }

    /// Delete a variable and its Get/Set nodes
    pub fn delete_variable(&mut self, id: &VariableId) -> Result<Variable, VariableError> {
        let variable = self
            .variables
            .delete_variable(id, &mut self.registry, &mut self.graph)?;
        self.variables_changed();
        Ok(variable)
    }

    fn variables_changed(&mut self) {
        self.graph.mark_modified();
        self.flush_events();
    }

    /// Turn a data pin into a variable: creates a variable of the pin's type,
    /// places a getter (for inputs) or setter (for outputs) left of the node
    /// and wires it to the pin.
    ///
    /// Returns `None` for exec pins and unknown pins.
    pub fn promote_pin_to_variable(&mut self, pin_id: &PinId) -> Option<(VariableId, NodeId)> {
        let (node, pin) = self.graph.find_pin_with_node(pin_id)?;
        if pin.is_exec() {
            return None;
        }
        let base: String = pin.name.chars().filter(|c| !c.is_whitespace()).collect();
        let base = if base.is_empty() { "NewVar".to_string() } else { base };
        let mut variable = Variable::new(self.variables.unique_name(&base), pin.pin_type);
        variable.container_type = pin.container_type;
        variable.default_value = PinValue::default_for(pin.pin_type, pin.container_type);
        let direction = pin.direction;
        let position = [node.x() - 200.0, node.y() + 50.0];

        let access = match direction {
            PinDirection::In => VariableAccess::Get,
            PinDirection::Out => VariableAccess::Set,
        };
        let key = access.key_for(&variable.name);
        let variable_id = match self.variables.insert_variable(variable, &mut self.registry) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!("Cannot promote {}: {}", pin_id, err);
                return None;
            }
        };

        let spawned = self.graph.add_node(&self.registry, &key, position[0], position[1])?;
        let linked = match direction {
            PinDirection::In => {
                self.graph.detach_for_rewire(pin_id);
                self.graph.connect(&PinId::new(spawned.clone(), "val_out"), pin_id)
            }
            PinDirection::Out => self.graph.connect(pin_id, &PinId::new(spawned.clone(), "val_in")),
        };
        if let Err(err) = linked {
            tracing::warn!("Promoted {} but could not wire it: {}", pin_id, err);
        }
        self.variables_changed();
        Some((variable_id, spawned))
    }

    // ------------------------------------------------------------------
    // Compile
    // ------------------------------------------------------------------

    /// Apply queued renames and validate
    pub fn compile(&mut self) -> bool {
        let valid = self
            .compiler
            .compile(&mut self.graph, &self.registry, &mut self.variables);
        self.deliver_after_compile();
        valid
    }

    /// Validate without applying queued renames
    pub fn validate(&mut self) -> bool {
        let valid = self
            .compiler
            .validate(&mut self.graph, &self.registry, &self.variables);
        self.deliver_after_compile();
        valid
    }

    /// Forward what compile repairs changed. Modification events are dropped
    /// so the compile result stands.
    fn deliver_after_compile(&mut self) {
        for event in self.graph.take_events() {
            match event {
                GraphEvent::NodeVisualsChanged(id) => {
                    if let Some(node) = self.graph.node(&id) {
                        self.hooks.update_visuals(node);
                    }
                }
                GraphEvent::NodeWiresChanged(id) => self.hooks.redraw_node_wires(&id),
                GraphEvent::AllWiresChanged => self.hooks.redraw_all_wires(),
                _ => {}
            }
        }
    }

    /// Whether the last compile succeeded and nothing changed since
    pub fn can_run(&self) -> bool {
        self.compiler.can_run()
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Snapshot the document
    pub fn save_state(&self) -> GraphState {
        GraphState {
            nodes: self.graph.to_node_data(),
            links: self.graph.to_link_data(),
            variables: self.variables.variables().cloned().collect(),
            pending_renames: self.variables.pending_renames().cloned().collect(),
            pan: PanData {
                x: self.graph.view.pan[0],
                y: self.graph.view.pan[1],
            },
            zoom: self.graph.view.zoom,
        }
    }

    /// Replace the document with a snapshot. Variables are restored first so
    /// their Get/Set templates exist when nodes are rebuilt.
    pub fn load_state(&mut self, state: &GraphState) -> LoadReport {
        self.variables.restore(
            state.variables.clone(),
            state.pending_renames.clone(),
            &mut self.registry,
        );
        let nodes = self.remap_stale_variable_keys(&state.nodes, &state.pending_renames);
        let report = self.graph.load_state(&self.registry, &nodes, &state.links);
        self.graph.view.pan = [state.pan.x, state.pan.y];
        self.graph.view.zoom = if state.zoom > 0.0 { state.zoom } else { 1.0 };

        self.graph.take_events();
        for node in self.graph.nodes() {
            self.hooks.render_node(node);
        }
        self.hooks.redraw_all_wires();
        self.hooks.clear_details();
        self.compiler.mark_dirty();
        report
    }

    /// Saved Get/Set nodes may still carry a name whose rename was queued but
    /// never compiled. Their old templates no longer exist, so point them at
    /// the current name through the variable ID or the rename queue.
    fn remap_stale_variable_keys(&self, nodes: &[NodeData], renames: &[PendingRename]) -> Vec<NodeData> {
        nodes
            .iter()
            .map(|data| {
                let mut data = data.clone();
                if self.registry.contains(&data.node_key) {
                    return data;
                }
                let Some((access, name)) = VariableAccess::parse(&data.node_key) else {
                    return data;
                };
                let current = match data.variable_id.as_ref().and_then(|id| self.variables.get(id)) {
                    Some(variable) => Some(variable.name.clone()),
                    None => follow_renames(name, renames).filter(|n| self.variables.by_name(n).is_some()),
                };
                if let Some(current) = current {
                    let key = access.key_for(&current);
                    tracing::info!("Remapped stale node {} from '{}' to '{}'", data.id, data.node_key, key);
                    data.node_key = key;
                }
                data
            })
            .collect()
    }

    /// Replace the document with the starter graph: BeginPlay wired into a
    /// Print String
    pub fn reset_to_default_graph(&mut self) {
        self.load_state(&GraphState::default());
        let begin = self.graph.add_node(&self.registry, "EventBeginPlay", 50.0, 50.0);
        let print = self.graph.add_node(&self.registry, "PrintString", 300.0, 50.0);
        if let (Some(begin), Some(print)) = (begin, print) {
            let linked = self
                .graph
                .connect(&PinId::new(begin, "exec_out"), &PinId::new(print, "exec_in"));
            if let Err(err) = linked {
                tracing::warn!("Default graph is missing its exec link: {}", err);
            }
        }
        self.flush_events();
    }

    /// A blueprint document holding the starter graph
    pub fn default_graph() -> Self {
        let mut blueprint = Self::default();
        blueprint.reset_to_default_graph();
        blueprint
    }
}

/// Final name after applying every queued rename that starts at `name`
fn follow_renames(name: &str, renames: &[PendingRename]) -> Option<String> {
    let mut current = name.to_string();
    let mut changed = false;
    for rename in renames {
        if rename.old_name == current {
            current = rename.new_name.clone();
            changed = true;
        }
    }
    changed.then_some(current)
}

impl Default for Blueprint {
    fn default() -> Self {
        Self::new(create_blueprint_registry())
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("graph", &self.graph.name)
            .field("nodes", &self.graph.node_count())
            .field("links", &self.graph.link_count())
            .field("variables", &self.variables.len())
            .field("compile_state", &self.compiler.state())
            .finish_non_exhaustive()
    }
}
