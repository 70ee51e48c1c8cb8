// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interactive input nodes.

use dashflow_graph::{
    Attribute, Diagnostics, DrawError, DrawResult, EvalError, InputProbe, Node, NodeKind,
    ProcessContext, Value, ValueType,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct SliderState {
    value: f32,
    vertical: bool,
}

/// A float slider: the dashboard-facing way to feed a value into the graph.
///
/// `Min` and `Max` bound the slider range and may be driven by upstream
/// nodes; the slider's own position is emitted on the `Value` output.
pub struct FloatSliderNode {
    value: f32,
    min: f32,
    max: f32,
    vertical: bool,
}

impl FloatSliderNode {
    /// Build a default-configured slider node
    pub fn node() -> Node {
        Node::new(
            "Float Slider",
            vec![
                Attribute::input(ValueType::Float, "Min"),
                Attribute::input(ValueType::Float, "Max").with_default(Value::Float(1.0)),
                Attribute::output(ValueType::Float, "Value"),
            ],
            Self {
                value: 0.0,
                min: 0.0,
                max: 1.0,
                vertical: false,
            },
        )
    }
}

impl NodeKind for FloatSliderNode {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
        self.min = ctx.float_input(0)?;
        self.max = ctx.float_input(1)?;
        ctx.set_float_output(2, self.value)
    }

    fn check_for_errors(&mut self, probe: &InputProbe) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        let min = probe.float(0);
        let max = probe.float(1);
        let value = probe.float(2);

        if min == max {
            diagnostics.error = Some("Min and Max cannot be the same".into());
        }
        if min > max {
            diagnostics.error = Some("Min cannot be greater than Max".into());
        }
        if value < min {
            diagnostics.warning = Some("Value is less than Min".into());
        }
        if value > max {
            diagnostics.warning = Some("Value is greater than Max".into());
        }
        diagnostics
    }

    fn draw_editor(&mut self, _node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        ui.checkbox(&mut self.vertical, "Vertical");
        Ok(())
    }

    fn draw_viewer(&mut self, node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        if self.max <= self.min {
            return Err(DrawError::new("invalid slider range"));
        }
        let mut slider = egui::Slider::new(&mut self.value, self.min..=self.max).text(node.title());
        if self.vertical {
            slider = slider.vertical();
        }
        ui.add(slider);
        Ok(())
    }

    fn dump(&self) -> Option<serde_json::Value> {
        serde_json::to_value(SliderState {
            value: self.value,
            vertical: self.vertical,
        })
        .ok()
    }

    fn load(&mut self, state: &serde_json::Value) {
        if let Ok(state) = serde_json::from_value::<SliderState>(state.clone()) {
            self.value = state.value;
            self.vertical = state.vertical;
        }
    }
}
