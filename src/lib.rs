//! Evaluation engine for digital logic circuits
//!
//! This crate computes the outputs of a circuit of logic gates connected by wires, as drawn in
//! a schematic editor. It handles combinational gates, feedback loops and stateful elements
//! such as clocks, flip-flops and latches, as well as custom gates defined by a sub-circuit or a
//! truth table.
//!
//! # Usage
//!
//! Circuits are plain data, usually loaded from the JSON documents produced by an editor.
//! Evaluation never modifies its argument: it returns an updated copy of the circuit, with new
//! outputs and gate memory.
//!
//! ```
//! # use gatesim::{Circuit, Gate, GateKind};
//! let mut circuit = Circuit::new();
//! let a = circuit.add(Gate::input("a", true));
//! let b = circuit.add(Gate::input("b", false));
//! let x = circuit.add(Gate::new("x", GateKind::Xor));
//! circuit.connect(&a, 0, &x, 0);
//! circuit.connect(&b, 0, &x, 1);
//!
//! let result = gatesim::sim::evaluate_immediate(&circuit, 0);
//! assert!(result.errors.is_empty());
//! assert_eq!(result.circuit.output_of("x"), Some(true));
//! ```
//!
//! # Evaluation
//!
//! There are two ways to run a pass over a circuit:
//! * immediate evaluation follows the combinational dependencies, so that a single pass gives
//!   the final value of every gate. It fails on circuits with a combinational cycle;
//! * delayed evaluation gives each gate one pass of delay: every gate reads the outputs of the
//!   previous pass. Repeated passes simulate feedback loops and oscillators.
//!
//! Clocks, flip-flops, latches and inputs are sequential: they read their inputs from the
//! previous pass, and break dependencies in immediate mode.
//!
//! The [`service`] module wraps both in an [`EvaluationService`], that picks the strategy,
//! enforces limits, steps clocks and collects statistics.
//!
//! # Errors
//!
//! Structural problems, such as wires to missing gates or duplicate identifiers, stop the
//! evaluation before any gate runs. A gate that cannot be evaluated, for example with the wrong
//! number of inputs, only produces a warning and outputs 0.

#![warn(missing_docs)]

pub mod circuit;
pub mod error;
pub mod service;
pub mod sim;

pub use circuit::{Circuit, CustomGateDefinition, Gate, GateId, GateKind, PinDescriptor, Wire};
pub use error::{EvaluationError, EvaluationWarning, ServiceError};
pub use service::{EvaluationService, ServiceConfig};
pub use sim::{CircuitEvaluator, EvaluationResult};
