// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attribute (pin) definitions: typed, directional value slots on nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::link::LinkId;

/// Unique identifier for an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(pub u32);

impl AttributeId {
    /// Sentinel for an attribute that has not been assigned an id yet.
    ///
    /// Real ids start at 1; `UNSET` marks freshly constructed attributes and
    /// schema-evolution gaps in serialized documents.
    pub const UNSET: Self = Self(0);

    /// Whether this id has been assigned
    pub fn is_set(self) -> bool {
        self != Self::UNSET
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribute direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeIo {
    /// Input pin; accepts at most one incoming link
    In,
    /// Output pin; may fan out to many inputs
    Out,
}

/// Data type that can flow through an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Floating point value
    Float,
    /// Boolean value
    Boolean,
    /// Integer value
    Int,
    /// Opaque buffer; carries no scalar value
    Buffer,
}

/// A scalar value held in an attribute slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Floating point
    Float(f32),
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
}

impl Value {
    /// Get the value type of this scalar
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Float(_) => ValueType::Float,
            Self::Bool(_) => ValueType::Boolean,
            Self::Int(_) => ValueType::Int,
        }
    }

    /// The zero value for a type, or `None` for types with no scalar form
    pub fn zero(value_type: ValueType) -> Option<Self> {
        match value_type {
            ValueType::Float => Some(Self::Float(0.0)),
            ValueType::Boolean => Some(Self::Bool(false)),
            ValueType::Int => Some(Self::Int(0)),
            ValueType::Buffer => None,
        }
    }

    /// Extract a float, if this is one
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a bool, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract an integer, if this is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// A typed, directional pin owned by exactly one node.
///
/// An attribute holds a default value (used while unconnected), an output
/// slot written during evaluation, and the set of live connections keyed by
/// link id. Input attributes accept at most one connection; outputs fan out.
#[derive(Debug, Clone)]
pub struct Attribute {
    id: AttributeId,
    io: AttributeIo,
    value_type: ValueType,
    name: String,
    default_value: Option<Value>,
    output_value: Option<Value>,
    connections: BTreeMap<LinkId, AttributeId>,
}

impl Attribute {
    /// Create an attribute with the type's zero default
    pub fn new(io: AttributeIo, value_type: ValueType, name: impl Into<String>) -> Self {
        Self {
            id: AttributeId::UNSET,
            io,
            value_type,
            name: name.into(),
            default_value: Value::zero(value_type),
            output_value: None,
            connections: BTreeMap::new(),
        }
    }

    /// Create a new input attribute
    pub fn input(value_type: ValueType, name: impl Into<String>) -> Self {
        Self::new(AttributeIo::In, value_type, name)
    }

    /// Create a new output attribute
    pub fn output(value_type: ValueType, name: impl Into<String>) -> Self {
        Self::new(AttributeIo::Out, value_type, name)
    }

    /// Override the default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// The attribute id
    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: AttributeId) {
        self.id = id;
    }

    /// The attribute direction
    pub fn io(&self) -> AttributeIo {
        self.io
    }

    /// The attribute value type
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The display label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default value, if the type has a scalar form
    pub fn default_value(&self) -> Option<Value> {
        self.default_value
    }

    /// Replace the default value
    pub fn set_default_value(&mut self, value: Option<Value>) {
        self.default_value = value;
    }

    /// Read the output slot, falling back to the default while uncomputed
    pub fn output_value(&self) -> Option<Value> {
        self.output_value.or(self.default_value)
    }

    /// Whether the output slot holds a computed value
    pub fn has_output(&self) -> bool {
        self.output_value.is_some()
    }

    /// Store a value in the output slot
    pub fn set_output(&mut self, value: Value) {
        self.output_value = Some(value);
    }

    /// Clear the output slot back to absent
    pub fn reset_output(&mut self) {
        self.output_value = None;
    }

    /// Record a connection through `link` to the attribute on the other end
    pub fn add_connection(&mut self, link: LinkId, other: AttributeId) {
        self.connections.insert(link, other);
    }

    /// Drop the connection record for `link`; no-op if absent
    pub fn remove_connection(&mut self, link: LinkId) {
        self.connections.remove(&link);
    }

    /// All live connections, keyed by link id
    pub fn connections(&self) -> impl Iterator<Item = (LinkId, AttributeId)> + '_ {
        self.connections.iter().map(|(l, a)| (*l, *a))
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The single connection of an input attribute, if connected
    pub fn connection(&self) -> Option<(LinkId, AttributeId)> {
        self.connections.iter().next().map(|(l, a)| (*l, *a))
    }
}
