// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::attribute::AttributeId;

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u32);

impl LinkId {
    /// Sentinel for a link that has not been assigned an id yet
    pub const UNSET: Self = Self(0);
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge between two attributes.
///
/// `from` is always the output-direction endpoint and `to` the
/// input-direction endpoint; orientation is fixed during link validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    id: LinkId,
    from: AttributeId,
    to: AttributeId,
}

impl Link {
    /// Create a link between validated, oriented endpoints
    pub fn new(id: LinkId, from: AttributeId, to: AttributeId) -> Self {
        Self { id, from, to }
    }

    /// The link id
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// The output-side attribute id
    pub fn from(&self) -> AttributeId {
        self.from
    }

    /// The input-side attribute id
    pub fn to(&self) -> AttributeId {
        self.to
    }

    /// Check if this link touches a specific attribute
    pub fn involves_attribute(&self, attribute: AttributeId) -> bool {
        self.from == attribute || self.to == attribute
    }
}
