// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow node graph framework for Dashflow.
//!
//! This crate provides the engine behind the dashboard editor:
//! - Typed, directional attributes with validated link rules
//! - Pull-based, demand-driven evaluation from terminal nodes, with
//!   runtime cycle detection and cooperative cancellation
//! - An optional continuously-looping background evaluator
//! - Persistence that round-trips graphs including stable identity
//! - A factory registry for user-defined node kinds
//!
//! ## Architecture
//!
//! The graph owns every node and link; nodes own their attributes in
//! declaration order. Behavior is a boxed [`NodeKind`] chosen at
//! construction through the [`NodeRegistry`]. Evaluation starts at a
//! terminal node (inputs but no outputs) and pulls values upstream on
//! demand; the presentation layer only mutates graph structure and reads
//! attribute slots and node state back out.

pub mod attribute;
pub mod evaluation;
pub mod graph;
pub mod link;
pub mod node;
pub mod serialize;

pub use attribute::{Attribute, AttributeId, AttributeIo, Value, ValueType};
pub use evaluation::{
    evaluate, evaluate_all, ContinuousEvaluator, EvalError, InterruptFlag, PassError,
    ProcessContext,
};
pub use graph::Graph;
pub use link::{Link, LinkId};
pub use node::{
    Diagnostics, DrawError, DrawResult, InputProbe, Node, NodeFactory, NodeId, NodeKind,
    NodeRegistry, NodeState,
};
