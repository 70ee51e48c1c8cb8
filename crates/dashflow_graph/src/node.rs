// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions: instance data, the behavior trait, and the factory
//! registry.
//!
//! A node is a data/behavior pair: the data half (id, title, position,
//! ordered attributes, state) lives in [`Node`]; the behavior half is a
//! boxed [`NodeKind`] selected at construction time through the
//! [`NodeRegistry`], never by type inspection during evaluation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::attribute::{Attribute, AttributeId, AttributeIo, Value};
#[cfg(test)]
use crate::attribute::ValueType;
use crate::evaluation::{EvalError, ProcessContext};

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel for a node that has not been assigned an id yet
    pub const UNSET: Self = Self(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node status bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeState(u8);

impl NodeState {
    /// Nominal state
    pub const OK: Self = Self(1);
    /// The node fell behind during continuous evaluation
    pub const OVERRUN: Self = Self(1 << 1);
    /// A structural error was recorded against the node
    pub const LOGIC_ERROR: Self = Self(1 << 2);
    /// The node's editor content failed to draw
    pub const DRAW_ERROR: Self = Self(1 << 3);

    /// Whether all bits of `other` are set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether only the nominal bit is set
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::OK
    }
}

/// Error raised by a node's custom draw content
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct DrawError(pub String);

impl DrawError {
    /// Create a draw error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of a custom draw call
pub type DrawResult = Result<(), DrawError>;

/// Advisory diagnostics produced by [`NodeKind::check_for_errors`].
///
/// Neither field affects evaluation; both are presentation hints cleared by
/// the host after each refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Blocking condition, e.g. an inconsistent configuration
    pub error: Option<String>,
    /// Non-fatal advisory, e.g. a value out of range
    pub warning: Option<String>,
}

/// Non-recursive view of a node's current attribute values.
///
/// For a connected input this is the upstream output slot as last computed;
/// for anything else it is the attribute's own output-or-default. Built by
/// [`Graph::refresh_diagnostics`](crate::graph::Graph::refresh_diagnostics);
/// reading it never triggers evaluation.
#[derive(Debug, Clone)]
pub struct InputProbe {
    values: Vec<Option<Value>>,
}

impl InputProbe {
    pub(crate) fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    /// The peeked value at an attribute index
    pub fn value(&self, index: usize) -> Option<Value> {
        self.values.get(index).copied().flatten()
    }

    /// The peeked float at an attribute index, or 0.0
    pub fn float(&self, index: usize) -> f32 {
        self.value(index).and_then(|v| v.as_float()).unwrap_or(0.0)
    }

    /// The peeked bool at an attribute index, or false
    pub fn bool(&self, index: usize) -> bool {
        self.value(index).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// The peeked integer at an attribute index, or 0
    pub fn int(&self, index: usize) -> i64 {
        self.value(index).and_then(|v| v.as_int()).unwrap_or(0)
    }
}

/// Behavior of a concrete node kind.
///
/// `process` is the only required computation hook; the draw pair is invoked
/// by the presentation layer, and `dump`/`load` round-trip kind-specific
/// state through the serialized document.
pub trait NodeKind: Send {
    /// Compute this node's output attribute values, pulling inputs through
    /// the context as needed
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError>;

    /// Inspect current input values and report advisory diagnostics
    fn check_for_errors(&mut self, probe: &InputProbe) -> Diagnostics {
        let _ = probe;
        Diagnostics::default()
    }

    /// Draw custom content inside the node's editor body
    fn draw_editor(&mut self, node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        let _ = (node, ui);
        Ok(())
    }

    /// Draw the node's dashboard (viewer) content
    fn draw_viewer(&mut self, node: &mut Node, ui: &mut egui::Ui) -> DrawResult;

    /// Dump kind-specific state into the serialized document
    fn dump(&self) -> Option<serde_json::Value> {
        None
    }

    /// Restore kind-specific state from the serialized document
    fn load(&mut self, state: &serde_json::Value) {
        let _ = state;
    }
}

/// A node instance: an ordered sequence of attributes plus a behavior.
pub struct Node {
    id: NodeId,
    title: String,
    name: String,
    position: [f32; 2],
    attributes: Vec<Attribute>,
    state: NodeState,
    state_message: String,
    error: Option<String>,
    warning: Option<String>,
    stateful: bool,
    should_update: bool,
    processing_inputs: BTreeSet<usize>,
    kind: Option<Box<dyn NodeKind>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("title", &self.title)
            .field("attributes", &self.attributes)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Create a node from its attributes and behavior.
    ///
    /// Ids stay [`NodeId::UNSET`] until the node is inserted into a graph.
    pub fn new(
        title: impl Into<String>,
        attributes: Vec<Attribute>,
        kind: impl NodeKind + 'static,
    ) -> Self {
        let title = title.into();
        Self {
            id: NodeId::UNSET,
            name: title.clone(),
            title,
            position: [0.0, 0.0],
            attributes,
            state: NodeState::OK,
            state_message: String::new(),
            error: None,
            warning: None,
            stateful: false,
            should_update: true,
            processing_inputs: BTreeSet::new(),
            kind: Some(Box::new(kind)),
        }
    }

    /// Mark the node as carrying cross-call memory
    pub fn with_stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    /// The node id
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    /// The user-editable display title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Change the display title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// The factory key this node was created under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The layout position; opaque to the engine, persisted only
    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    /// Move the node
    pub fn set_position(&mut self, position: [f32; 2]) {
        self.position = position;
    }

    /// The ordered attribute sequence
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut [Attribute] {
        &mut self.attributes
    }

    /// An attribute by declaration index
    pub fn attribute(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    /// A mutable attribute by declaration index
    pub fn attribute_mut(&mut self, index: usize) -> Option<&mut Attribute> {
        self.attributes.get_mut(index)
    }

    /// The declaration index of an attribute id, if owned by this node
    pub fn attribute_index(&self, id: AttributeId) -> Option<usize> {
        self.attributes.iter().position(|a| a.id() == id)
    }

    /// Whether this node is an evaluation entry point: at least one input
    /// attribute and no outputs
    pub fn is_terminal(&self) -> bool {
        let mut has_input = false;
        for attr in &self.attributes {
            match attr.io() {
                AttributeIo::In => has_input = true,
                AttributeIo::Out => return false,
            }
        }
        has_input
    }

    /// The status bitmask
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Set status bits together with a message
    pub fn set_state(&mut self, bits: NodeState, message: impl Into<String>) {
        self.state.insert(bits);
        self.state_message = message.into();
    }

    /// Clear status bits and the associated message
    pub fn clear_state(&mut self, bits: NodeState) {
        self.state.remove(bits);
        self.state_message.clear();
    }

    /// The message recorded with the last status change
    pub fn state_message(&self) -> &str {
        &self.state_message
    }

    /// The advisory error string, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The advisory warning string, if any
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Whether an advisory error is set
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether an advisory warning is set
    pub fn has_warning(&self) -> bool {
        self.warning.is_some()
    }

    /// Clear the advisory error; called by the host after each refresh
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Clear the advisory warning; called by the host after each refresh
    pub fn clear_warning(&mut self) {
        self.warning = None;
    }

    pub(crate) fn apply_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.error = diagnostics.error;
        self.warning = diagnostics.warning;
    }

    /// Whether this node carries cross-call memory
    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    /// Whether stateful memory may still advance this pass
    pub fn should_update(&self) -> bool {
        self.should_update
    }

    /// Consume the per-pass update latch
    pub fn mark_updated(&mut self) {
        self.should_update = false;
    }

    pub(crate) fn rearm_update(&mut self) {
        self.should_update = true;
    }

    /// Clear every attribute's output slot back to absent
    pub fn reset_outputs(&mut self) {
        for attribute in &mut self.attributes {
            attribute.reset_output();
        }
    }

    /// Clear the per-pass recursion guard
    pub fn reset_processed_inputs(&mut self) {
        self.processing_inputs.clear();
    }

    /// Mark an input index as being resolved; false if already on this path
    pub(crate) fn mark_input_processing(&mut self, index: usize) -> bool {
        self.processing_inputs.insert(index)
    }

    pub(crate) fn unmark_input_processing(&mut self, index: usize) {
        self.processing_inputs.remove(&index);
    }

    /// Store a value into an output attribute's slot.
    ///
    /// Fails structurally on an out-of-bounds index, a non-output attribute,
    /// or a scalar type mismatch.
    pub fn set_on_output(&mut self, index: usize, value: Value) -> Result<(), EvalError> {
        let node = self.id;
        let attribute = self
            .attributes
            .get_mut(index)
            .ok_or(EvalError::AttributeOutOfBounds { node, index })?;
        if attribute.io() != AttributeIo::Out {
            return Err(EvalError::NotAnOutput { node, index });
        }
        if attribute.value_type() != value.value_type() {
            return Err(EvalError::ValueTypeMismatch {
                node,
                index,
                expected: attribute.value_type(),
                got: value.value_type(),
            });
        }
        attribute.set_output(value);
        Ok(())
    }

    pub(crate) fn take_kind(&mut self) -> Option<Box<dyn NodeKind>> {
        self.kind.take()
    }

    pub(crate) fn put_kind(&mut self, kind: Box<dyn NodeKind>) {
        self.kind = Some(kind);
    }

    pub(crate) fn check_kind(&mut self, probe: &InputProbe) -> Diagnostics {
        self.kind
            .as_mut()
            .map(|kind| kind.check_for_errors(probe))
            .unwrap_or_default()
    }

    /// Dump kind-specific state for persistence
    pub fn dump_state(&self) -> Option<serde_json::Value> {
        self.kind.as_ref().and_then(|kind| kind.dump())
    }

    /// Restore kind-specific state from a persisted document
    pub fn load_state(&mut self, state: &serde_json::Value) {
        if let Some(kind) = self.kind.as_mut() {
            kind.load(state);
        }
    }

    /// Draw the node's custom editor content, containing failures.
    ///
    /// A failed draw sets the sticky [`NodeState::DRAW_ERROR`] bit with a
    /// placeholder message; a later successful draw clears it. Failures never
    /// propagate to the caller.
    pub fn draw_editor(&mut self, ui: &mut egui::Ui) {
        let Some(mut kind) = self.kind.take() else {
            return;
        };
        let result = kind.draw_editor(self, ui);
        self.kind = Some(kind);
        match result {
            Ok(()) => {
                if self.state.contains(NodeState::DRAW_ERROR) {
                    self.clear_state(NodeState::DRAW_ERROR);
                }
            }
            Err(err) => {
                tracing::debug!(node = %self.id, error = %err, "editor draw failed");
                self.set_state(NodeState::DRAW_ERROR, "failed to draw editor content");
            }
        }
    }

    /// Draw the node's dashboard content
    pub fn draw_viewer(&mut self, ui: &mut egui::Ui) -> DrawResult {
        let Some(mut kind) = self.kind.take() else {
            return Ok(());
        };
        let result = kind.draw_viewer(self, ui);
        self.kind = Some(kind);
        result
    }
}

/// A registered node constructor: `(category, name, description)` plus the
/// closure producing a default-configured instance.
pub struct NodeFactory {
    /// Menu category
    pub category: String,
    /// Factory key; becomes the node's immutable `name`
    pub name: String,
    /// Human-readable description
    pub description: String,
    constructor: Box<dyn Fn() -> Node + Send + Sync>,
}

impl NodeFactory {
    /// Build a default-configured node carrying this factory's key
    pub fn build(&self) -> Node {
        let mut node = (self.constructor)();
        node.set_name(&self.name);
        node.set_title(&self.name);
        node
    }
}

/// Registry of available node kinds, in registration order.
#[derive(Default)]
pub struct NodeRegistry {
    factories: IndexMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node kind under `(category, name)`
    pub fn register(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        constructor: impl Fn() -> Node + Send + Sync + 'static,
    ) {
        let name = name.into();
        self.factories.insert(
            name.clone(),
            NodeFactory {
                category: category.into(),
                name,
                description: description.into(),
                constructor: Box::new(constructor),
            },
        );
    }

    /// Look up a factory by name
    pub fn get(&self, name: &str) -> Option<&NodeFactory> {
        self.factories.get(name)
    }

    /// Instantiate a default-configured node by factory name
    pub fn create(&self, name: &str) -> Option<Node> {
        self.factories.get(name).map(NodeFactory::build)
    }

    /// All registered factories, in registration order
    pub fn factories(&self) -> impl Iterator<Item = &NodeFactory> {
        self.factories.values()
    }

    /// Factories within one category
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a NodeFactory> {
        self.factories.values().filter(move |f| f.category == category)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
