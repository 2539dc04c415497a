// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph core for the Blueprint and Material editors.
//!
//! This crate holds everything the editors agree on about a graph:
//! - Typed pins, nodes and links
//! - The node registry and the built-in node catalogs
//! - User variables and their generated Get/Set templates
//! - The compile pass that validates and repairs a graph
//! - The persisted state shape
//!
//! ## Architecture
//!
//! Presentation, input handling and persistence mechanics live outside this
//! crate. The [`Blueprint`] aggregate owns one registry, one variable store, one
//! graph and one compiler, and reports side effects to the host through
//! [`EditorHooks`].

pub mod pin;
pub mod link;
pub mod node;
pub mod registry;
pub mod variable;
pub mod graph;
pub mod compiler;
pub mod state;
pub mod blueprint;
pub mod graphs;

pub use pin::{ContainerType, Pin, PinDirection, PinId, PinTemplate, PinType, PinValue};
pub use link::{Link, LinkId};
pub use node::{Node, NodeId, NodeKind, NodeTemplate, NodeVariant};
pub use registry::NodeRegistry;
pub use variable::{PendingRename, PendingVariableEdit, Variable, VariableError, VariableId, VariableStore};
pub use graph::{ConnectionError, Graph, GraphEvent, SelectMode, ViewTransform};
pub use compiler::{CompileIssue, CompileMessage, CompileState, Compiler, Severity};
pub use state::{GraphState, LinkData, LoadReport, NodeData, PanData, PinData};
pub use blueprint::{Blueprint, EditorHooks, NoopHooks};
