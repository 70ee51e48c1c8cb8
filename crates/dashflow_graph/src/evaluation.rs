// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demand-driven graph evaluation.
//!
//! Evaluation starts at a terminal node and pulls input values by
//! recursively processing upstream nodes, depth-first along the reversed
//! dataflow edges. A per-node, per-input recursion guard marks inputs
//! currently on the resolution path, so a directed cycle fails with a
//! structural error instead of unbounded recursion, while diamond-shaped
//! re-pulls through an already-finished node stay legal (the shared node is
//! simply recomputed, once per downstream pull).
//!
//! Two cancellation levels exist: [`InterruptFlag`] aborts the in-flight
//! pass at its next pull, and the [`ContinuousEvaluator`]'s stop flag ends
//! the background loop at the next iteration boundary.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::attribute::{AttributeIo, Value, ValueType};
use crate::graph::Graph;
use crate::node::NodeId;

/// Structural evaluation error.
///
/// These are the only errors that cross the evaluation-pass boundary; each
/// carries the offending node and aborts the pass entirely.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// A dependency cycle was reached while resolving an input
    #[error("dependency cycle detected at node {node}")]
    Cycle {
        /// A node on the cycle
        node: NodeId,
    },

    /// The cooperative interrupt flag was raised mid-pass
    #[error("execution interrupted at node {node}")]
    Interrupted {
        /// The node whose pull observed the interrupt
        node: NodeId,
    },

    /// An attribute index outside the node's attribute sequence
    #[error("node {node} has no attribute at index {index}")]
    AttributeOutOfBounds {
        /// The offending node
        node: NodeId,
        /// The requested index
        index: usize,
    },

    /// An output write targeted a non-output attribute
    #[error("node {node} attribute {index} is not an output")]
    NotAnOutput {
        /// The offending node
        node: NodeId,
        /// The targeted index
        index: usize,
    },

    /// An output write carried the wrong scalar type
    #[error("node {node} attribute {index} expects {expected:?}, got {got:?}")]
    ValueTypeMismatch {
        /// The offending node
        node: NodeId,
        /// The targeted index
        index: usize,
        /// The attribute's declared type
        expected: ValueType,
        /// The written value's type
        got: ValueType,
    },

    /// Evaluation reached a node id not present in the graph
    #[error("node {node} is not in the graph")]
    MissingNode {
        /// The missing node id
        node: NodeId,
    },

    /// A node kind raised its own structural failure
    #[error("node {node}: {message}")]
    Logic {
        /// The offending node
        node: NodeId,
        /// The kind-supplied message
        message: String,
    },
}

impl EvalError {
    /// The node the error is recorded against
    pub fn node(&self) -> NodeId {
        match self {
            Self::Cycle { node }
            | Self::Interrupted { node }
            | Self::AttributeOutOfBounds { node, .. }
            | Self::NotAnOutput { node, .. }
            | Self::ValueTypeMismatch { node, .. }
            | Self::MissingNode { node }
            | Self::Logic { node, .. } => *node,
        }
    }
}

/// A recorded per-terminal failure from an evaluation iteration
#[derive(Debug, Clone, PartialEq)]
pub struct PassError {
    /// The offending node
    pub node: NodeId,
    /// The error message
    pub message: String,
}

impl From<&EvalError> for PassError {
    fn from(err: &EvalError) -> Self {
        Self {
            node: err.node(),
            message: err.to_string(),
        }
    }
}

/// Cooperative cancellation flag for the in-flight evaluation pass.
///
/// Raising it aborts the current pass at its next pull; the flag is cleared
/// as it is observed, so the following pass starts clean.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Create a new, unraised flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption of the in-flight pass
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether an interrupt is pending
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Pull accessor handed to [`NodeKind::process`](crate::node::NodeKind::process).
///
/// Reading an input recursively processes the connected upstream node; an
/// unconnected input behaves as a constant source of its default value.
pub struct ProcessContext<'a> {
    graph: &'a mut Graph,
    node: NodeId,
    interrupt: &'a InterruptFlag,
}

impl ProcessContext<'_> {
    /// The node being processed
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Pull the value at an attribute index.
    ///
    /// For a connected input this recurses into the upstream node's
    /// `process` and reads its output slot afterwards; otherwise it reads
    /// the attribute's own output-or-default. `None` means the attribute
    /// type has no scalar form and no default was computed.
    pub fn input_value(&mut self, index: usize) -> Result<Option<Value>, EvalError> {
        let node = self.node;
        let (upstream, fallback) = {
            let this = self
                .graph
                .node(node)
                .ok_or(EvalError::MissingNode { node })?;
            let attribute = this
                .attribute(index)
                .ok_or(EvalError::AttributeOutOfBounds { node, index })?;
            let upstream = (attribute.io() == AttributeIo::In)
                .then(|| attribute.connection())
                .flatten();
            (upstream, attribute.output_value())
        };

        let Some((_, other)) = upstream else {
            return Ok(fallback);
        };
        let Some((up_node, up_index)) = self.graph.locate_attribute(other) else {
            return Ok(fallback);
        };

        {
            let this = self
                .graph
                .node_mut(node)
                .ok_or(EvalError::MissingNode { node })?;
            if !this.mark_input_processing(index) {
                return Err(EvalError::Cycle { node });
            }
        }
        let result = if self.interrupt.take() {
            Err(EvalError::Interrupted { node })
        } else {
            process_node(self.graph, up_node, self.interrupt)
        };
        if let Some(this) = self.graph.node_mut(node) {
            this.unmark_input_processing(index);
        }
        result?;

        Ok(self
            .graph
            .node(up_node)
            .and_then(|n| n.attribute(up_index))
            .and_then(|a| a.output_value()))
    }

    /// Pull a float input, falling back to 0.0 on a non-float value
    pub fn float_input(&mut self, index: usize) -> Result<f32, EvalError> {
        Ok(self
            .input_value(index)?
            .and_then(|v| v.as_float())
            .unwrap_or(0.0))
    }

    /// Pull a bool input, falling back to false on a non-bool value
    pub fn bool_input(&mut self, index: usize) -> Result<bool, EvalError> {
        Ok(self
            .input_value(index)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Pull an integer input, falling back to 0 on a non-integer value
    pub fn int_input(&mut self, index: usize) -> Result<i64, EvalError> {
        Ok(self
            .input_value(index)?
            .and_then(|v| v.as_int())
            .unwrap_or(0))
    }

    /// Store a value into one of this node's output attributes
    pub fn set_output(&mut self, index: usize, value: Value) -> Result<(), EvalError> {
        let node = self.node;
        self.graph
            .node_mut(node)
            .ok_or(EvalError::MissingNode { node })?
            .set_on_output(index, value)
    }

    /// Store a float into one of this node's output attributes
    pub fn set_float_output(&mut self, index: usize, value: f32) -> Result<(), EvalError> {
        self.set_output(index, Value::Float(value))
    }

    /// Store a bool into one of this node's output attributes
    pub fn set_bool_output(&mut self, index: usize, value: bool) -> Result<(), EvalError> {
        self.set_output(index, Value::Bool(value))
    }

    /// Whether stateful memory may still advance this pass
    pub fn should_update(&self) -> bool {
        self.graph
            .node(self.node)
            .is_some_and(|n| n.should_update())
    }

    /// Consume the per-pass update latch
    pub fn mark_updated(&mut self) {
        if let Some(node) = self.graph.node_mut(self.node) {
            node.mark_updated();
        }
    }

    /// Build a structural error recorded against this node
    pub fn logic_error(&self, message: impl Into<String>) -> EvalError {
        EvalError::Logic {
            node: self.node,
            message: message.into(),
        }
    }
}

/// Evaluate one terminal node.
///
/// Clears the terminal's output slots, re-arms every node's recursion guard
/// and stateful latch, then processes the terminal, pulling upstream on
/// demand. A structural error aborts the whole pass.
pub fn evaluate(graph: &mut Graph, terminal: NodeId, interrupt: &InterruptFlag) -> Result<(), EvalError> {
    if !graph.contains_node(terminal) {
        return Err(EvalError::MissingNode { node: terminal });
    }
    for node in graph.nodes_mut() {
        node.reset_processed_inputs();
        node.rearm_update();
    }
    if let Some(node) = graph.node_mut(terminal) {
        node.reset_outputs();
    }
    process_node(graph, terminal, interrupt)
}

/// Evaluate every terminal node in turn.
///
/// A failing terminal is recorded and the remaining terminals are still
/// attempted; the collected errors are returned.
pub fn evaluate_all(graph: &mut Graph, interrupt: &InterruptFlag) -> Vec<PassError> {
    let terminals = graph.terminal_nodes().to_vec();
    let mut errors = Vec::new();
    for terminal in terminals {
        if let Err(err) = evaluate(graph, terminal, interrupt) {
            tracing::debug!(terminal = %terminal, error = %err, "evaluation pass failed");
            errors.push(PassError::from(&err));
        }
    }
    errors
}

fn process_node(graph: &mut Graph, id: NodeId, interrupt: &InterruptFlag) -> Result<(), EvalError> {
    let node = graph.node_mut(id).ok_or(EvalError::MissingNode { node: id })?;
    // a behavior already taken means this node is on the current pull path
    let Some(mut kind) = node.take_kind() else {
        return Err(EvalError::Cycle { node: id });
    };
    let result = kind.process(&mut ProcessContext {
        graph,
        node: id,
        interrupt,
    });
    if let Some(node) = graph.node_mut(id) {
        node.put_kind(kind);
    }
    result
}

/// Repeated evaluation of all terminal nodes on a background thread.
///
/// The loop holds the graph lock for the duration of one iteration and
/// releases it in between, so the host can still mutate structure while the
/// loop runs. Stopping takes effect at the next iteration boundary; starting
/// again first waits for the previous worker to finish, so two iterations
/// never run concurrently on the same graph.
pub struct ContinuousEvaluator {
    graph: Arc<Mutex<Graph>>,
    running: Arc<AtomicBool>,
    interrupt: InterruptFlag,
    errors: Arc<Mutex<Vec<PassError>>>,
    worker: Option<JoinHandle<()>>,
}

impl ContinuousEvaluator {
    /// Create an evaluator over a shared graph
    pub fn new(graph: Arc<Mutex<Graph>>) -> Self {
        Self {
            graph,
            running: Arc::new(AtomicBool::new(false)),
            interrupt: InterruptFlag::new(),
            errors: Arc::new(Mutex::new(Vec::new())),
            worker: None,
        }
    }

    /// The shared graph
    pub fn graph(&self) -> &Arc<Mutex<Graph>> {
        &self.graph
    }

    /// A handle to the pass-level interrupt flag
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Whether the background worker is live
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Start the continuous loop, first waiting out any previous worker
    pub fn start(&mut self) {
        self.stop();
        self.running.store(true, Ordering::SeqCst);

        let graph = Arc::clone(&self.graph);
        let running = Arc::clone(&self.running);
        let errors = Arc::clone(&self.errors);
        let interrupt = self.interrupt.clone();

        tracing::info!("continuous evaluation started");
        self.worker = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let pass = {
                    let mut graph = graph.lock();
                    evaluate_all(&mut graph, &interrupt)
                };
                *errors.lock() = pass;
                std::thread::yield_now();
            }
            tracing::info!("continuous evaluation stopped");
        }));
    }

    /// Stop the loop after the current iteration and wait for it to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Abort the in-flight pass without stopping the loop
    pub fn request_interrupt(&self) {
        self.interrupt.request();
    }

    /// The errors recorded by the most recent iteration
    pub fn last_errors(&self) -> Vec<PassError> {
        self.errors.lock().clone()
    }
}

impl Drop for ContinuousEvaluator {
    fn drop(&mut self) {
        self.stop();
    }
}
