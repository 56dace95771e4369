//! Evaluation of circuits, one pass at a time
//!
//! A circuit is converted to an internal [`Netlist`] where each gate holds its memory in a
//! typed [`Element`]. Passes are either immediate, following the combinational dependencies, or
//! delayed, where each gate sees the outputs of the previous pass.

mod custom;
mod element;
mod evaluator;
mod graph;
mod netlist;
pub mod time;

use crate::circuit::Circuit;

pub use custom::{CustomGateExpander, Expansion, SubCircuit, TruthTable};
pub use element::{ClockMemory, Element, FlipFlopMemory, GateFault, LatchMemory, NaryType};
pub use evaluator::{CircuitEvaluator, EvaluationResult, PassContext};
pub use graph::{DependencyGraph, Schedule};
pub use netlist::{Connection, Limits, Netlist, Node};
pub use time::{FixedTime, RealTime, SteppedTime, TimeProvider};

pub(crate) use evaluator::{cycle_error, delayed_pass, immediate_pass};

/// Evaluate a circuit in dependency order at the given time, with default limits
pub fn evaluate_immediate(circuit: &Circuit, now: u64) -> EvaluationResult {
    CircuitEvaluator::new().evaluate_immediate(circuit, now)
}

/// Evaluate one delayed pass of a circuit at the given time, with default limits
pub fn evaluate_delayed(circuit: &Circuit, now: u64) -> EvaluationResult {
    CircuitEvaluator::new().evaluate_delayed(circuit, now)
}
