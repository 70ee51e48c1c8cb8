// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant and arithmetic nodes.

use dashflow_graph::{
    Attribute, Diagnostics, DrawResult, EvalError, InputProbe, Node, NodeKind, ProcessContext,
    ValueType,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct ConstantState {
    value: f32,
}

/// A constant float source, edited in place in the node body.
pub struct FloatConstantNode {
    value: f32,
}

impl FloatConstantNode {
    /// Build a default-configured constant node
    pub fn node() -> Node {
        Node::new(
            "Float Constant",
            vec![Attribute::output(ValueType::Float, "Value")],
            Self { value: 0.0 },
        )
    }
}

impl NodeKind for FloatConstantNode {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
        ctx.set_float_output(0, self.value)
    }

    fn draw_editor(&mut self, _node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        ui.add(egui::DragValue::new(&mut self.value).speed(0.1));
        Ok(())
    }

    fn draw_viewer(&mut self, node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        ui.label(format!("{}: {:.3}", node.title(), self.value));
        Ok(())
    }

    fn dump(&self) -> Option<serde_json::Value> {
        serde_json::to_value(ConstantState { value: self.value }).ok()
    }

    fn load(&mut self, state: &serde_json::Value) {
        if let Ok(state) = serde_json::from_value::<ConstantState>(state.clone()) {
            self.value = state.value;
        }
    }
}

/// Arithmetic operator applied by [`BinaryMathNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOp {
    /// `A + B`
    Add,
    /// `A - B`
    Subtract,
    /// `A * B`
    Multiply,
    /// `A / B`
    Divide,
}

impl MathOp {
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MathState {
    op: MathOp,
}

/// Applies an arithmetic operator over two float inputs.
pub struct BinaryMathNode {
    op: MathOp,
    result: f32,
}

impl BinaryMathNode {
    /// Build a default-configured math node
    pub fn node() -> Node {
        Node::new(
            "Binary Math",
            vec![
                Attribute::input(ValueType::Float, "A"),
                Attribute::input(ValueType::Float, "B"),
                Attribute::output(ValueType::Float, "Result"),
            ],
            Self {
                op: MathOp::Add,
                result: 0.0,
            },
        )
    }
}

impl NodeKind for BinaryMathNode {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
        let a = ctx.float_input(0)?;
        let b = ctx.float_input(1)?;
        if self.op == MathOp::Divide && b == 0.0 {
            return Err(ctx.logic_error("division by zero"));
        }
        self.result = self.op.apply(a, b);
        ctx.set_float_output(2, self.result)
    }

    fn check_for_errors(&mut self, probe: &InputProbe) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        if self.op == MathOp::Divide && probe.float(1) == 0.0 {
            diagnostics.warning = Some("B is zero, division will fail".into());
        }
        diagnostics
    }

    fn draw_editor(&mut self, _node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        egui::ComboBox::from_label("Op")
            .selected_text(self.op.symbol())
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut self.op, MathOp::Add, "Add");
                ui.selectable_value(&mut self.op, MathOp::Subtract, "Subtract");
                ui.selectable_value(&mut self.op, MathOp::Multiply, "Multiply");
                ui.selectable_value(&mut self.op, MathOp::Divide, "Divide");
            });
        Ok(())
    }

    fn draw_viewer(&mut self, _node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        ui.label(format!("A {} B = {:.3}", self.op.symbol(), self.result));
        Ok(())
    }

    fn dump(&self) -> Option<serde_json::Value> {
        serde_json::to_value(MathState { op: self.op }).ok()
    }

    fn load(&mut self, state: &serde_json::Value) {
        if let Ok(state) = serde_json::from_value::<MathState>(state.clone()) {
            self.op = state.op;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plots::TimeseriesPlotNode;
    use dashflow_graph::{evaluate, AttributeId, Graph, InterruptFlag, NodeId};
    use serde_json::json;

    fn attr_id(graph: &Graph, node: NodeId, index: usize) -> AttributeId {
        graph.node(node).unwrap().attribute(index).unwrap().id()
    }

    fn constant(graph: &mut Graph, value: f32) -> NodeId {
        let mut node = FloatConstantNode::node();
        node.load_state(&json!({ "value": value }));
        graph.add_node(node)
    }

    fn math(graph: &mut Graph, op: MathOp) -> NodeId {
        let mut node = BinaryMathNode::node();
        node.load_state(&serde_json::to_value(MathState { op }).unwrap());
        graph.add_node(node)
    }

    fn wire_terminal(graph: &mut Graph, from: NodeId, index: usize) -> NodeId {
        let plot = graph.add_node(TimeseriesPlotNode::node());
        let out = attr_id(graph, from, index);
        let inp = attr_id(graph, plot, 0);
        graph.connect(out, inp).unwrap();
        plot
    }

    #[test]
    fn operators_combine_inputs() {
        let mut graph = Graph::new();
        let a = constant(&mut graph, 6.0);
        let b = constant(&mut graph, 1.5);
        let mul = math(&mut graph, MathOp::Multiply);
        graph
            .connect(attr_id(&graph, a, 0), attr_id(&graph, mul, 0))
            .unwrap();
        graph
            .connect(attr_id(&graph, b, 0), attr_id(&graph, mul, 1))
            .unwrap();
        let plot = wire_terminal(&mut graph, mul, 2);

        evaluate(&mut graph, plot, &InterruptFlag::new()).unwrap();
        let result = graph
            .node(mul)
            .unwrap()
            .attribute(2)
            .unwrap()
            .output_value()
            .and_then(|v| v.as_float());
        assert_eq!(result, Some(9.0));
    }

    #[test]
    fn division_by_zero_is_structural() {
        let mut graph = Graph::new();
        let a = constant(&mut graph, 1.0);
        let div = math(&mut graph, MathOp::Divide);
        graph
            .connect(attr_id(&graph, a, 0), attr_id(&graph, div, 0))
            .unwrap();
        let plot = wire_terminal(&mut graph, div, 2);

        let err = evaluate(&mut graph, plot, &InterruptFlag::new()).unwrap_err();
        assert_eq!(
            err,
            EvalError::Logic {
                node: div,
                message: "division by zero".into()
            }
        );

        graph.refresh_diagnostics(div);
        assert!(graph.node(div).unwrap().has_warning());
    }

    #[test]
    fn operator_round_trips() {
        let mut node = BinaryMathNode::node();
        node.load_state(&json!({ "op": "Divide" }));
        assert_eq!(node.dump_state(), Some(json!({ "op": "Divide" })));
    }
}
