// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rolling timeseries plot nodes.

use std::collections::VecDeque;

use dashflow_graph::{
    Attribute, DrawResult, EvalError, Node, NodeKind, ProcessContext, ValueType,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct PlotState {
    capacity: usize,
    #[serde(default)]
    history: Vec<f32>,
}

/// A terminal plot accumulating its input over evaluation passes.
///
/// The node is stateful: one sample lands in the history per pass, no matter
/// how many paths pull through it, and the ring is trimmed to `capacity`.
pub struct TimeseriesPlotNode {
    history: VecDeque<f32>,
    capacity: usize,
}

impl TimeseriesPlotNode {
    /// Build a default-configured plot node
    pub fn node() -> Node {
        Node::new(
            "Timeseries Plot",
            vec![Attribute::input(ValueType::Float, "Value")],
            Self {
                history: VecDeque::new(),
                capacity: 256,
            },
        )
        .with_stateful()
    }
}

impl NodeKind for TimeseriesPlotNode {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), EvalError> {
        let value = ctx.float_input(0)?;
        if ctx.should_update() {
            if self.history.len() == self.capacity {
                self.history.pop_front();
            }
            self.history.push_back(value);
            ctx.mark_updated();
        }
        Ok(())
    }

    fn draw_viewer(&mut self, _node: &mut Node, ui: &mut egui::Ui) -> DrawResult {
        let desired = egui::vec2(ui.available_width().max(120.0), 80.0);
        let (rect, _) = ui.allocate_exact_size(desired, egui::Sense::hover());
        let painter = ui.painter();
        painter.rect_stroke(
            rect,
            2.0,
            egui::Stroke::new(1.0, egui::Color32::from_gray(80)),
        );

        if self.history.len() < 2 {
            return Ok(());
        }
        let low = self.history.iter().copied().fold(f32::INFINITY, f32::min);
        let high = self.history.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let span = (high - low).max(f32::EPSILON);
        let last = (self.history.len() - 1) as f32;

        let points: Vec<egui::Pos2> = self
            .history
            .iter()
            .enumerate()
            .map(|(i, value)| {
                egui::pos2(
                    rect.left() + rect.width() * i as f32 / last,
                    rect.bottom() - rect.height() * (value - low) / span,
                )
            })
            .collect();
        painter.add(egui::Shape::line(
            points,
            egui::Stroke::new(1.5, egui::Color32::LIGHT_BLUE),
        ));
        Ok(())
    }

    fn dump(&self) -> Option<serde_json::Value> {
        serde_json::to_value(PlotState {
            capacity: self.capacity,
            history: self.history.iter().copied().collect(),
        })
        .ok()
    }

    fn load(&mut self, state: &serde_json::Value) {
        if let Ok(state) = serde_json::from_value::<PlotState>(state.clone()) {
            self.capacity = state.capacity.max(1);
            self.history = state.history.into_iter().collect();
            while self.history.len() > self.capacity {
                self.history.pop_front();
            }
        }
    }
}
