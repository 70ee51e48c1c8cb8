// SPDX-License-Identifier: MIT OR Apache-2.0
//! Radial gauge nodes.

use dashflow_graph::{
    Attribute, Diagnostics, DrawResult, EvalError, InputProbe, Node, NodeKind, ProcessContext,
    Value, ValueType,
};
use serde::{Deserialize, Serialize};

/// Threshold-to-color mapping for gauge arcs.
///
/// Thresholds are inclusive upper bounds in value space, kept in ascending
/// order; a value above every threshold takes the last color.
#[derive(Debug, Clone)]
pub struct GaugeColorMap {
    thresholds: Vec<(f32, egui::Color32)>,
}

impl GaugeColorMap {
    /// Build a map from `(upper bound, color)` pairs
    pub fn new(mut thresholds: Vec<(f32, egui::Color32)>) -> Self {
        thresholds.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { thresholds }
    }

    /// The color band a value falls into
    pub fn color_for(&self, value: f32) -> egui::Color32 {
        for (threshold, color) in &self.thresholds {
            if value <= *threshold {
                return *color;
            }
        }
        self.thresholds
            .last()
            .map(|(_, color)| *color)
            .unwrap_or(egui::Color32::GRAY)
    }
}

impl Default for GaugeColorMap {
    fn default() -> Self {
        Self::new(vec![
            (50.0, egui::Color32::from_rgb(0, 153, 0)),
            (75.0, egui::Color32::YELLOW),
            (100.0, egui::Color32::RED),
        ])
    }
}

/// Draw a radial gauge into the current layout position
pub fn simple_gauge(
    ui: &mut egui::Ui,
    label: &str,
    value: f32,
    min: f32,
    max: f32,
    colors: &GaugeColorMap,
) {
    const SEGMENTS: usize = 64;
    let radius = 48.0;
    let thickness = 6.0;

    let desired = egui::vec2(radius * 2.0 + 12.0, radius * 2.0 + 12.0);
    let (rect, _) = ui.allocate_exact_size(desired, egui::Sense::hover());
    let center = rect.center();
    let painter = ui.painter();

    let start = 0.75 * std::f32::consts::PI;
    let end = 2.25 * std::f32::consts::PI;
    let span = (max - min).max(f32::EPSILON);
    let fill = ((value - min) / span).clamp(0.0, 1.0);

    let point = |angle: f32| center + radius * egui::vec2(angle.cos(), angle.sin());
    let arc = |painter: &egui::Painter, from: f32, to: f32, stroke: egui::Stroke| {
        let steps = ((to - from) / (end - start) * SEGMENTS as f32).ceil().max(1.0) as usize;
        for i in 0..steps {
            let a0 = from + (to - from) * i as f32 / steps as f32;
            let a1 = from + (to - from) * (i + 1) as f32 / steps as f32;
            painter.line_segment([point(a0), point(a1)], stroke);
        }
    };

    arc(
        painter,
        start,
        end,
        egui::Stroke::new(thickness, egui::Color32::from_gray(60)),
    );
    if fill > 0.0 {
        arc(
            painter,
            start,
            start + (end - start) * fill,
            egui::Stroke::new(thickness, colors.color_for(value)),
        );
    }

    painter.text(
        center,
        egui::Align2::CENTER_CENTER,
        format!("{value:.2}"),
        egui::FontId::proportional(16.0),
        ui.visuals().text_color(),
    );
    painter.text(
        center + egui::vec2(0.0, radius * 0.5),
        egui::Align2::CENTER_CENTER,
        label,
        egui::FontId::proportional(12.0),
        ui.visuals().weak_text_color(),
    );
}

#[derive(Serialize, Deserialize)]
struct GaugeState {
    label: String,
}

/// A terminal gauge displaying a pulled value against its range.
pub struct SimpleGaugeNode {
    label: String,
    value: f32,
    min: f32,
    max: f32,
    color_map: GaugeColorMap,
}

impl SimpleGaugeNode {
    /// Build a default-configured gauge node
    pub fn node() -> Node {
        Node::new(
            "Simple Gauge",
            vec![
                Attribute::input(ValueType::Float, "Value"),
                Attribute::input(ValueType::Float, "Min Value"),
                Attribute::input(ValueType::Float, "Max Value").with_default(Value::Float(100.0)),
            ],
            Self {
                label: String::new(),
                value: 0.0,
                min: 0.0,
                max: 100.0,
                color_map: GaugeColorMap::default(),
            },
        )
    }
}

impl NodeKind for SimpleGaugeNode {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
        self.value = ctx.float_input(0)?;
        self.min = ctx.float_input(1)?;
        self.max = ctx.float_input(2)?;
        Ok(())
    }

    fn check_for_errors(&mut self, probe: &InputProbe) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        let value = probe.float(0);
        let min = probe.float(1);
        let max = probe.float(2);

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
        ui.text_edit_singleline(&mut self.label);
        Ok(())
    }

    fn draw_viewer(&mut self, node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        let label = if self.label.is_empty() {
            node.title()
        } else {
            &self.label
        };
        simple_gauge(ui, label, self.value, self.min, self.max, &self.color_map);
        Ok(())
    }

    fn dump(&self) -> Option<serde_json::Value> {
        serde_json::to_value(GaugeState {
            label: self.label.clone(),
        })
        .ok()
    }

    fn load(&mut self, state: &serde_json::Value) {
        if let Ok(state) = serde_json::from_value::<GaugeState>(state.clone()) {
            self.label = state.label;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashflow_graph::Graph;
    use serde_json::json;

    #[test]
    fn color_map_bands() {
        let map = GaugeColorMap::default();
        assert_eq!(map.color_for(10.0), egui::Color32::from_rgb(0, 153, 0));
        assert_eq!(map.color_for(60.0), egui::Color32::YELLOW);
        assert_eq!(map.color_for(90.0), egui::Color32::RED);
        assert_eq!(map.color_for(150.0), egui::Color32::RED);
    }

    #[test]
    fn default_gauge_has_no_diagnostics() {
        let mut graph = Graph::new();
        let gauge = graph.add_node(SimpleGaugeNode::node());
        graph.refresh_diagnostics(gauge);
        let node = graph.node(gauge).unwrap();
        assert!(!node.has_error());
        assert!(!node.has_warning());
    }

    #[test]
    fn degenerate_range_and_overshoot_are_reported() {
        let mut graph = Graph::new();
        let gauge = graph.add_node(SimpleGaugeNode::node());
        {
            let node = graph.node_mut(gauge).unwrap();
            node.attribute_mut(0)
                .unwrap()
                .set_default_value(Some(Value::Float(150.0)));
            node.attribute_mut(2)
                .unwrap()
                .set_default_value(Some(Value::Float(0.0)));
        }

        graph.refresh_diagnostics(gauge);
        let node = graph.node(gauge).unwrap();
        assert_eq!(node.error(), Some("Min and Max cannot be the same"));
        assert_eq!(node.warning(), Some("Value is greater than Max"));
    }

    #[test]
    fn label_round_trips() {
        let mut node = SimpleGaugeNode::node();
        node.load_state(&json!({ "label": "Pressure" }));
        assert_eq!(node.dump_state(), Some(json!({ "label": "Pressure" })));
    }
}
