// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in dashboard node kinds for Dashflow.
//!
//! Each module pairs a [`NodeKind`](dashflow_graph::NodeKind) implementation
//! with the attribute layout it is registered under; [`register_widgets`]
//! populates a registry with the whole set.

pub mod gauges;
pub mod inputs;
pub mod math;
pub mod plots;

pub use gauges::{GaugeColorMap, SimpleGaugeNode};
pub use inputs::FloatSliderNode;
pub use math::{BinaryMathNode, FloatConstantNode, MathOp};
pub use plots::TimeseriesPlotNode;

use dashflow_graph::NodeRegistry;

/// Register every built-in widget node kind
pub fn register_widgets(registry: &mut NodeRegistry) {
    registry.register(
        "Inputs",
        "Float Slider",
        "An interactive slider emitting its value",
        FloatSliderNode::node,
    );
    registry.register(
        "Visualizations",
        "Simple Gauge",
        "A radial gauge with threshold colors",
        SimpleGaugeNode::node,
    );
    registry.register(
        "Visualizations",
        "Timeseries Plot",
        "A rolling plot of a value over time",
        TimeseriesPlotNode::node,
    );
    registry.register(
        "Math",
        "Float Constant",
        "A constant float value",
        FloatConstantNode::node,
    );
    registry.register(
        "Math",
        "Binary Math",
        "Arithmetic over two float inputs",
        BinaryMathNode::node,
    );
    tracing::debug!(count = registry.len(), "widget node kinds registered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashflow_graph::{evaluate, serialize, Graph, InterruptFlag};
    use serde_json::json;

    #[test]
    fn registry_lists_every_widget() {
        let mut registry = NodeRegistry::new();
        register_widgets(&mut registry);

        let names: Vec<_> = registry.factories().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Float Slider",
                "Simple Gauge",
                "Timeseries Plot",
                "Float Constant",
                "Binary Math",
            ]
        );
        assert_eq!(registry.in_category("Visualizations").count(), 2);

        let slider = registry.create("Float Slider").unwrap();
        assert_eq!(slider.name(), "Float Slider");
        assert_eq!(slider.attributes().len(), 3);
    }

    #[test]
    fn dashboard_round_trips_through_the_registry() {
        let mut registry = NodeRegistry::new();
        register_widgets(&mut registry);

        let mut graph = Graph::new();
        let mut slider = registry.create("Float Slider").unwrap();
        slider.set_title("Throttle");
        slider.load_state(&json!({ "value": 0.5, "vertical": false }));
        let slider = graph.add_node(slider);
        let gauge = graph.add_node(registry.create("Simple Gauge").unwrap());
        let plot = graph.add_node(registry.create("Timeseries Plot").unwrap());

        let out = graph.node(slider).unwrap().attribute(2).unwrap().id();
        graph
            .connect(out, graph.node(gauge).unwrap().attribute(0).unwrap().id())
            .unwrap();
        graph
            .connect(out, graph.node(plot).unwrap().attribute(0).unwrap().id())
            .unwrap();

        let text = serialize::dump_string(&graph).unwrap();
        let mut restored = serialize::load_str(&text, &registry).unwrap();
        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.link_count(), 2);
        assert_eq!(restored.terminal_nodes().len(), 2);
        assert_eq!(restored.node(slider).unwrap().title(), "Throttle");

        let interrupt = InterruptFlag::new();
        for terminal in restored.terminal_nodes().to_vec() {
            evaluate(&mut restored, terminal, &interrupt).unwrap();
        }
        let emitted = restored
            .node(slider)
            .unwrap()
            .attribute(2)
            .unwrap()
            .output_value()
            .and_then(|v| v.as_float());
        assert_eq!(emitted, Some(0.5));
    }
}
