// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph persistence: dump to a structured document, restore through the
//! factory registry.
//!
//! Loading is deliberately lenient: an entry naming an unregistered node
//! kind is skipped, a serialized link that fails the interactive
//! compatibility rule is dropped, and a serialized attribute list shorter
//! than the node's actual attribute count leaves the remainder to be
//! assigned fresh ids. After reconstruction the graph's id counters are
//! advanced past every id in use, so nothing created afterwards can collide
//! with a loaded id.

use serde::{Deserialize, Serialize};

use crate::attribute::{Attribute, AttributeId};
use crate::graph::Graph;
use crate::link::LinkId;
use crate::node::{NodeId, NodeRegistry};

/// Error from reading or writing persisted graph text
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The document text was not a valid graph document
    #[error("malformed graph document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Persisted form of a whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDoc {
    /// Node entries, in creation order
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    /// Link entries, in creation order
    #[serde(default)]
    pub links: Vec<LinkDoc>,
}

/// Persisted form of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDoc {
    /// Node id
    pub id: NodeId,
    /// Factory key used to reconstruct the node
    pub name: String,
    /// Display title
    pub title: String,
    /// Attribute ids in declaration order
    #[serde(default)]
    pub attrs: Vec<AttributeId>,
    /// Layout position
    pub pos: [f32; 2],
    /// Kind-specific state, opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Persisted form of one link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkDoc {
    /// Link id
    pub id: LinkId,
    /// Output-side attribute id
    pub from: AttributeId,
    /// Input-side attribute id
    pub to: AttributeId,
}

/// Dump a graph into its persisted document form
pub fn dump(graph: &Graph) -> GraphDoc {
    GraphDoc {
        nodes: graph
            .nodes()
            .map(|node| NodeDoc {
                id: node.id(),
                name: node.name().to_string(),
                title: node.title().to_string(),
                attrs: node.attributes().iter().map(Attribute::id).collect(),
                pos: node.position(),
                data: node.dump_state(),
            })
            .collect(),
        links: graph
            .links()
            .map(|link| LinkDoc {
                id: link.id(),
                from: link.from(),
                to: link.to(),
            })
            .collect(),
    }
}

/// Dump a graph to pretty-printed document text
pub fn dump_string(graph: &Graph) -> Result<String, SerializeError> {
    Ok(serde_json::to_string_pretty(&dump(graph))?)
}

/// Rebuild a graph from its persisted document form.
///
/// Nodes are reconstructed through the registry keyed by their factory
/// `name`; malformed entries are skipped and the load continues.
pub fn load(doc: &GraphDoc, registry: &NodeRegistry) -> Graph {
    let mut graph = Graph::new();

    // Counters move past every id in the document before any node is built,
    // so fresh ids minted for schema gaps cannot collide with later entries.
    {
        let ids = graph.ids_mut();
        for entry in &doc.nodes {
            ids.advance_past_node(entry.id);
            for attr in &entry.attrs {
                ids.advance_past_attribute(*attr);
            }
        }
        for entry in &doc.links {
            ids.advance_past_link(entry.id);
        }
    }

    for entry in &doc.nodes {
        let Some(mut node) = registry.create(&entry.name) else {
            tracing::warn!(name = %entry.name, node = %entry.id, "unknown node kind, entry skipped");
            continue;
        };
        if entry.id != NodeId::UNSET && graph.contains_node(entry.id) {
            tracing::warn!(node = %entry.id, "duplicate node id, entry skipped");
            continue;
        }
        node.set_id(entry.id);
        node.set_title(&entry.title);
        node.set_position(entry.pos);
        for (index, attribute) in node.attributes_mut().iter_mut().enumerate() {
            attribute.set_id(entry.attrs.get(index).copied().unwrap_or(AttributeId::UNSET));
        }
        if let Some(data) = &entry.data {
            node.load_state(data);
        }
        graph.add_node(node);
    }

    for entry in &doc.links {
        if !graph.restore_link(entry.id, entry.from, entry.to) {
            tracing::debug!(link = %entry.id, "serialized link dropped");
        }
    }

    graph.sync_id_counters();
    graph
}

/// Rebuild a graph from persisted document text
pub fn load_str(text: &str, registry: &NodeRegistry) -> Result<Graph, SerializeError> {
    let doc: GraphDoc = serde_json::from_str(text)?;
    Ok(load(&doc, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::ValueType;
    use crate::evaluation::{evaluate, EvalError, InterruptFlag, ProcessContext};
    use crate::node::{DrawResult, Node, NodeKind};
    use serde_json::json;

    struct Source {
        value: f32,
    }

    impl NodeKind for Source {
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
            ctx.set_float_output(0, self.value)
        }

        fn draw_viewer(&mut self, _node: &mut Node, _ui: &mut egui::Ui) -> DrawResult {
            Ok(())
        }

        fn dump(&self) -> Option<serde_json::Value> {
            Some(json!({ "value": self.value }))
        }

        fn load(&mut self, state: &serde_json::Value) {
            if let Some(value) = state.get("value").and_then(serde_json::Value::as_f64) {
                self.value = value as f32;
            }
        }
    }

    struct Relay;

    impl NodeKind for Relay {
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
            let value = ctx.float_input(0)?;
            ctx.set_float_output(1, value)
        }

        fn draw_viewer(&mut self, _node: &mut Node, _ui: &mut egui::Ui) -> DrawResult {
            Ok(())
        }
    }

    struct Sink;

    impl NodeKind for Sink {
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
            ctx.float_input(0)?;
            Ok(())
        }

        fn draw_viewer(&mut self, _node: &mut Node, _ui: &mut egui::Ui) -> DrawResult {
            Ok(())
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register("Test", "Source", "constant source", || {
            Node::new(
                "Source",
                vec![Attribute::output(ValueType::Float, "out")],
                Source { value: 0.0 },
            )
        });
        registry.register("Test", "Relay", "pass-through", || {
            Node::new(
                "Relay",
                vec![
                    Attribute::input(ValueType::Float, "in"),
                    Attribute::output(ValueType::Float, "out"),
                ],
                Relay,
            )
        });
        registry.register("Test", "Sink", "terminal sink", || {
            Node::new("Sink", vec![Attribute::input(ValueType::Float, "in")], Sink)
        });
        registry
    }

    fn attr_id(graph: &Graph, node: NodeId, index: usize) -> AttributeId {
        graph.node(node).unwrap().attribute(index).unwrap().id()
    }

    fn sample_graph(registry: &NodeRegistry) -> Graph {
        let mut graph = Graph::new();
        let mut source = registry.create("Source").unwrap();
        source.set_title("Speed");
        source.set_position([10.0, 20.0]);
        source.load_state(&json!({ "value": 7.5 }));
        let src = graph.add_node(source);
        let relay = graph.add_node(registry.create("Relay").unwrap());
        let sink = graph.add_node(registry.create("Sink").unwrap());
        graph
            .connect(attr_id(&graph, src, 0), attr_id(&graph, relay, 0))
            .unwrap();
        graph
            .connect(attr_id(&graph, relay, 1), attr_id(&graph, sink, 0))
            .unwrap();
        graph
    }

    #[test]
    fn round_trip_preserves_graph_shape() {
        let registry = registry();
        let graph = sample_graph(&registry);
        let text = dump_string(&graph).unwrap();
        let mut restored = load_str(&text, &registry).unwrap();

        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.link_count(), graph.link_count());
        for (original, loaded) in graph.nodes().zip(restored.nodes()) {
            assert_eq!(original.id(), loaded.id());
            assert_eq!(original.name(), loaded.name());
            assert_eq!(original.title(), loaded.title());
            assert_eq!(original.position(), loaded.position());
            for (a, b) in original.attributes().iter().zip(loaded.attributes()) {
                assert_eq!(a.id(), b.id());
                assert_eq!(a.io(), b.io());
                assert_eq!(a.value_type(), b.value_type());
            }
        }
        for (original, loaded) in graph.links().zip(restored.links()) {
            assert_eq!(original.id(), loaded.id());
            assert_eq!(original.from(), loaded.from());
            assert_eq!(original.to(), loaded.to());
        }
        assert_eq!(restored.terminal_nodes(), graph.terminal_nodes());

        // kind state survived: the restored source still feeds 7.5
        let sink = restored.terminal_nodes()[0];
        evaluate(&mut restored, sink, &InterruptFlag::new()).unwrap();
        let relay_out = restored
            .nodes()
            .find(|n| n.name() == "Relay")
            .and_then(|n| n.attribute(1))
            .unwrap();
        assert_eq!(relay_out.output_value().and_then(|v| v.as_float()), Some(7.5));
    }

    #[test]
    fn unknown_kind_entries_are_skipped() {
        let registry = registry();
        let doc = GraphDoc {
            nodes: vec![
                NodeDoc {
                    id: NodeId(1),
                    name: "Source".into(),
                    title: "Source".into(),
                    attrs: vec![AttributeId(1)],
                    pos: [0.0, 0.0],
                    data: None,
                },
                NodeDoc {
                    id: NodeId(2),
                    name: "Retired Kind".into(),
                    title: "gone".into(),
                    attrs: vec![AttributeId(2)],
                    pos: [0.0, 0.0],
                    data: None,
                },
                NodeDoc {
                    id: NodeId(3),
                    name: "Sink".into(),
                    title: "Sink".into(),
                    attrs: vec![AttributeId(3)],
                    pos: [0.0, 0.0],
                    data: None,
                },
            ],
            links: vec![
                // touches the skipped node: dropped silently
                LinkDoc {
                    id: LinkId(1),
                    from: AttributeId(2),
                    to: AttributeId(3),
                },
                LinkDoc {
                    id: LinkId(2),
                    from: AttributeId(1),
                    to: AttributeId(3),
                },
            ],
        };

        let graph = load(&doc, &registry);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.link_count(), 1);
        assert_eq!(graph.link(LinkId(2)).unwrap().from(), AttributeId(1));
        assert_eq!(graph.terminal_nodes(), [NodeId(3)]);
    }

    #[test]
    fn sparse_loaded_ids_never_collide_with_new_entities() {
        let registry = registry();
        let doc = GraphDoc {
            nodes: vec![
                NodeDoc {
                    id: NodeId(5),
                    name: "Source".into(),
                    title: "Source".into(),
                    attrs: vec![AttributeId(7)],
                    pos: [0.0, 0.0],
                    data: None,
                },
                NodeDoc {
                    id: NodeId(40),
                    name: "Sink".into(),
                    title: "Sink".into(),
                    attrs: vec![AttributeId(50)],
                    pos: [0.0, 0.0],
                    data: None,
                },
            ],
            links: vec![LinkDoc {
                id: LinkId(9),
                from: AttributeId(7),
                to: AttributeId(50),
            }],
        };

        let mut graph = load(&doc, &registry);
        let fresh = graph.add_node(registry.create("Relay").unwrap());
        assert!(fresh.0 > 40);
        for attribute in graph.node(fresh).unwrap().attributes() {
            assert!(attribute.id().0 > 50);
        }
        let out = attr_id(&graph, NodeId(5), 0);
        graph.disconnect(LinkId(9));
        let link = graph.connect(out, attr_id(&graph, fresh, 0)).unwrap();
        assert!(link.0 > 9);
    }

    #[test]
    fn short_attribute_list_gets_fresh_ids() {
        let registry = registry();
        let doc = GraphDoc {
            nodes: vec![
                NodeDoc {
                    id: NodeId(1),
                    // relay has two attributes, only one serialized
                    name: "Relay".into(),
                    title: "Relay".into(),
                    attrs: vec![AttributeId(4)],
                    pos: [0.0, 0.0],
                    data: None,
                },
                NodeDoc {
                    id: NodeId(2),
                    name: "Sink".into(),
                    title: "Sink".into(),
                    attrs: vec![AttributeId(6)],
                    pos: [0.0, 0.0],
                    data: None,
                },
            ],
            links: vec![],
        };

        let graph = load(&doc, &registry);
        let relay = graph.node(NodeId(1)).unwrap();
        assert_eq!(relay.attribute(0).unwrap().id(), AttributeId(4));
        let fresh = relay.attribute(1).unwrap().id();
        assert!(fresh.is_set());
        assert!(fresh.0 > 6);
    }

    #[test]
    fn incompatible_serialized_links_are_dropped() {
        let registry = registry();
        let doc = GraphDoc {
            nodes: vec![
                NodeDoc {
                    id: NodeId(1),
                    name: "Source".into(),
                    title: "Source".into(),
                    attrs: vec![AttributeId(1)],
                    pos: [0.0, 0.0],
                    data: None,
                },
                NodeDoc {
                    id: NodeId(2),
                    name: "Source".into(),
                    title: "Source".into(),
                    attrs: vec![AttributeId(2)],
                    pos: [0.0, 0.0],
                    data: None,
                },
                NodeDoc {
                    id: NodeId(3),
                    name: "Sink".into(),
                    title: "Sink".into(),
                    attrs: vec![AttributeId(3)],
                    pos: [0.0, 0.0],
                    data: None,
                },
            ],
            links: vec![
                // same direction on both ends
                LinkDoc {
                    id: LinkId(1),
                    from: AttributeId(1),
                    to: AttributeId(2),
                },
                // dangling endpoint
                LinkDoc {
                    id: LinkId(2),
                    from: AttributeId(99),
                    to: AttributeId(3),
                },
                LinkDoc {
                    id: LinkId(3),
                    from: AttributeId(1),
                    to: AttributeId(3),
                },
                // duplicate id
                LinkDoc {
                    id: LinkId(3),
                    from: AttributeId(2),
                    to: AttributeId(3),
                },
            ],
        };

        let graph = load(&doc, &registry);
        assert_eq!(graph.link_count(), 1);
        let link = graph.link(LinkId(3)).unwrap();
        assert_eq!(link.from(), AttributeId(1));
        assert_eq!(link.to(), AttributeId(3));
    }

    #[test]
    fn malformed_text_is_an_error() {
        let registry = registry();
        assert!(load_str("not a document", &registry).is_err());
        assert!(load_str("{}", &registry).is_ok());
    }
}
