// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph aggregate: node and link collections, identity management, and the
//! validated mutation operations.

use indexmap::{IndexMap, IndexSet};

use crate::attribute::{Attribute, AttributeId, AttributeIo};
use crate::link::{Link, LinkId};
use crate::node::{InputProbe, Node, NodeId};

/// Monotonic id counters for nodes, attributes, and links.
///
/// Owned by the graph rather than living in global state so multiple graphs
/// can coexist in one host. Counters start at 1; load advances them past
/// every id found in a document.
#[derive(Debug, Clone)]
pub(crate) struct IdAllocator {
    next_node: u32,
    next_attribute: u32,
    next_link: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next_node: 1,
            next_attribute: 1,
            next_link: 1,
        }
    }
}

impl IdAllocator {
    fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    fn next_attribute_id(&mut self) -> AttributeId {
        let id = AttributeId(self.next_attribute);
        self.next_attribute += 1;
        id
    }

    fn next_link_id(&mut self) -> LinkId {
        let id = LinkId(self.next_link);
        self.next_link += 1;
        id
    }

    pub(crate) fn advance_past_node(&mut self, id: NodeId) {
        if id.0 >= self.next_node {
            self.next_node = id.0 + 1;
        }
    }

    pub(crate) fn advance_past_attribute(&mut self, id: AttributeId) {
        if id.0 >= self.next_attribute {
            self.next_attribute = id.0 + 1;
        }
    }

    pub(crate) fn advance_past_link(&mut self, id: LinkId) {
        if id.0 >= self.next_link {
            self.next_link = id.0 + 1;
        }
    }
}

/// The aggregate of all live nodes and links.
///
/// Node insertion order is creation order (the presentation layer's
/// z-order), never evaluation order. Terminal nodes - the only legitimate
/// evaluation entry points - are tracked explicitly as nodes are added and
/// removed. The selection set is transient presentation state and takes no
/// part in evaluation or persistence.
#[derive(Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
    links: IndexMap<LinkId, Link>,
    terminals: Vec<NodeId>,
    selected: IndexSet<NodeId>,
    ids: IdAllocator,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, assigning fresh ids to it and any of its attributes that
    /// do not carry one yet. Ids already present (a restored node) are kept,
    /// and the counters advance past them.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        if node.id() == NodeId::UNSET {
            node.set_id(self.ids.next_node_id());
        } else {
            self.ids.advance_past_node(node.id());
        }
        for attribute in node.attributes_mut() {
            if attribute.id() == AttributeId::UNSET {
                attribute.set_id(self.ids.next_attribute_id());
            } else {
                self.ids.advance_past_attribute(attribute.id());
            }
        }

        let id = node.id();
        if node.is_terminal() {
            self.terminals.push(id);
        }
        tracing::debug!(node = %id, name = node.name(), "node added");
        self.nodes.insert(id, node);
        id
    }

    /// Remove one node and every link touching its attributes
    pub fn remove_node(&mut self, id: NodeId) {
        self.remove_nodes(std::slice::from_ref(&id));
    }

    /// Remove a set of nodes.
    ///
    /// Link cleanup runs for the whole set before any node is dropped, so
    /// removal order within the batch cannot affect the result.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) {
        let mut dead_links = Vec::new();
        for id in ids {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for attribute in node.attributes() {
                for (link, _) in attribute.connections() {
                    if !dead_links.contains(&link) {
                        dead_links.push(link);
                    }
                }
            }
        }
        for link in dead_links {
            self.disconnect(link);
        }

        for id in ids {
            self.terminals.retain(|t| t != id);
            self.selected.shift_remove(id);
            if self.nodes.shift_remove(id).is_some() {
                tracing::debug!(node = %id, "node removed");
            }
        }
    }

    /// Get a node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by id
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All nodes, in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// All node ids, in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The terminal nodes currently in the graph
    pub fn terminal_nodes(&self) -> &[NodeId] {
        &self.terminals
    }

    /// Add a node to the transient selection set
    pub fn select_node(&mut self, id: NodeId) {
        if self.nodes.contains_key(&id) {
            self.selected.insert(id);
        }
    }

    /// The selected nodes, in selection order
    pub fn selected_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.selected.iter().copied()
    }

    /// Clear the selection set
    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Create a link between two attributes.
    ///
    /// Succeeds only if both ids resolve to live attributes of equal value
    /// type and opposite direction, and the input-side endpoint has no
    /// existing connection. Any violation refuses the link and returns
    /// `None`; refusal is a normal interactive outcome, not a fault.
    pub fn connect(&mut self, a: AttributeId, b: AttributeId) -> Option<LinkId> {
        let (from, to) = self.validate_link(a, b)?;
        let id = self.ids.next_link_id();
        self.insert_link(Link::new(id, from, to));
        Some(id)
    }

    /// Remove a link, detaching the connection record on both endpoint
    /// attributes. Unknown ids and already-detached endpoints are no-ops.
    pub fn disconnect(&mut self, id: LinkId) {
        let Some(link) = self.links.shift_remove(&id) else {
            return;
        };
        self.detach(link.from(), id);
        self.detach(link.to(), id);
        tracing::debug!(link = %id, "link removed");
    }

    /// Get a link by id
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// All links, in creation order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Number of live links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Find the owning node and declaration index of an attribute
    pub fn locate_attribute(&self, id: AttributeId) -> Option<(NodeId, usize)> {
        if !id.is_set() {
            return None;
        }
        self.nodes.values().find_map(|node| {
            node.attribute_index(id).map(|index| (node.id(), index))
        })
    }

    /// Get an attribute anywhere in the graph by id
    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        let (node, index) = self.locate_attribute(id)?;
        self.nodes.get(&node)?.attribute(index)
    }

    /// Re-run a node's `check_for_errors` against its current input values.
    ///
    /// Values are peeked, not pulled: a connected input reads the upstream
    /// output slot as last computed, anything else reads its own
    /// output-or-default. Invoked by the host once per presentation refresh.
    pub fn refresh_diagnostics(&mut self, id: NodeId) {
        let Some(probe) = self.probe_node(id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            let diagnostics = node.check_kind(&probe);
            node.apply_diagnostics(diagnostics);
        }
    }

    /// Refresh diagnostics on every node
    pub fn refresh_all_diagnostics(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.refresh_diagnostics(id);
        }
    }

    fn probe_node(&self, id: NodeId) -> Option<InputProbe> {
        let node = self.nodes.get(&id)?;
        let values = node
            .attributes()
            .iter()
            .map(|attribute| {
                if attribute.io() == AttributeIo::In {
                    if let Some((_, other)) = attribute.connection() {
                        if let Some(upstream) = self.attribute(other) {
                            return upstream.output_value();
                        }
                    }
                }
                attribute.output_value()
            })
            .collect();
        Some(InputProbe::new(values))
    }

    /// Restore a link under an id taken from a persisted document, applying
    /// the same compatibility rule as interactive creation. Returns false if
    /// the link was dropped.
    pub(crate) fn restore_link(&mut self, id: LinkId, a: AttributeId, b: AttributeId) -> bool {
        if id == LinkId::UNSET || self.links.contains_key(&id) {
            return false;
        }
        let Some((from, to)) = self.validate_link(a, b) else {
            return false;
        };
        self.ids.advance_past_link(id);
        self.insert_link(Link::new(id, from, to));
        true
    }

    pub(crate) fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub(crate) fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Advance the id counters past every id currently in use
    pub(crate) fn sync_id_counters(&mut self) {
        let ids = &mut self.ids;
        for node in self.nodes.values() {
            ids.advance_past_node(node.id());
            for attribute in node.attributes() {
                ids.advance_past_attribute(attribute.id());
            }
        }
        for link in self.links.keys() {
            ids.advance_past_link(*link);
        }
    }

    fn validate_link(&self, a: AttributeId, b: AttributeId) -> Option<(AttributeId, AttributeId)> {
        let first = self.attribute(a)?;
        let second = self.attribute(b)?;

        if first.value_type() != second.value_type() {
            tracing::debug!(a = %a, b = %b, "link refused: value types differ");
            return None;
        }
        if first.io() == second.io() {
            tracing::debug!(a = %a, b = %b, "link refused: same direction");
            return None;
        }

        let (from, to) = if first.io() == AttributeIo::Out {
            (a, b)
        } else {
            (b, a)
        };
        if self.attribute(to)?.connection_count() != 0 {
            tracing::debug!(to = %to, "link refused: input already connected");
            return None;
        }
        Some((from, to))
    }

    fn insert_link(&mut self, link: Link) {
        let id = link.id();
        self.attach(link.from(), id, link.to());
        self.attach(link.to(), id, link.from());
        tracing::debug!(link = %id, from = %link.from(), to = %link.to(), "link created");
        self.links.insert(id, link);
    }

    fn attach(&mut self, attribute: AttributeId, link: LinkId, other: AttributeId) {
        if let Some((node, index)) = self.locate_attribute(attribute) {
            if let Some(attr) = self.nodes.get_mut(&node).and_then(|n| n.attribute_mut(index)) {
                attr.add_connection(link, other);
            }
        }
    }

    fn detach(&mut self, attribute: AttributeId, link: LinkId) {
        if let Some((node, index)) = self.locate_attribute(attribute) {
            if let Some(attr) = self.nodes.get_mut(&node).and_then(|n| n.attribute_mut(index)) {
                attr.remove_connection(link);
            }
        }
    }
}
