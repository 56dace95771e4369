use log::{debug, trace, warn};
use serde::Serialize;

use crate::circuit::Circuit;
use crate::error::{ErrorKind, EvaluationError, EvaluationWarning};
use crate::sim::graph::{DependencyGraph, Schedule};
use crate::sim::netlist::{Limits, Netlist};

/// State shared by the gates during one pass
#[derive(Debug, Clone)]
pub struct PassContext {
    /// Time of the pass in milliseconds, identical for every clock
    pub now: u64,
    /// Bound on repeated passes in nested evaluations
    pub max_settle_iterations: usize,
    notes: Vec<String>,
    /// Warnings raised so far
    pub warnings: Vec<EvaluationWarning>,
}

impl PassContext {
    /// Create a context for a pass at the given time
    pub fn new(now: u64, max_settle_iterations: usize) -> PassContext {
        PassContext {
            now,
            max_settle_iterations,
            notes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a message about the gate being evaluated
    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    /// Take the messages recorded since the last call
    pub fn take_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notes)
    }
}

/// Evaluate a single node with the given inputs, returning whether its outputs changed
///
/// A forced node keeps its forced primary output. A faulty node outputs 0.
fn evaluate_node(net: &mut Netlist, i: usize, inputs: Vec<bool>, ctx: &mut PassContext) -> bool {
    let node = net.node_mut(i);
    let before = node.outputs.clone();
    let nb_outputs = node.outputs.len();
    let mut outputs = if let Some(v) = node.forced {
        let mut o = before.clone();
        if let Some(first) = o.first_mut() {
            *first = v;
        }
        o
    } else {
        match node.element.evaluate(&inputs, ctx) {
            Ok(o) => o,
            Err(fault) => {
                warn!("Gate {} failed: {}", node.id, fault);
                ctx.warnings
                    .push(EvaluationError::evaluation(&node.id, fault.to_string()).into());
                vec![false; nb_outputs]
            }
        }
    };
    outputs.resize(nb_outputs, false);
    for note in ctx.take_notes() {
        ctx.warnings.push(EvaluationWarning::gate(&node.id, note));
    }
    trace!("{} ({}) {:?} -> {:?}", node.id, node.element, inputs, outputs);
    node.inputs = inputs;
    let changed = outputs != before;
    node.outputs = outputs;
    changed
}

/// Run one pass in topological order
///
/// Each node reads the outputs of this pass, except on feedback wires into flip-flops and
/// latches, which carry the outputs of the previous pass.
pub(crate) fn immediate_pass(net: &mut Netlist, schedule: &Schedule, ctx: &mut PassContext) -> bool {
    let snapshot = net.output_values();
    let mut changed = false;
    for &i in schedule.order() {
        let inputs = net.gather_inputs(i, |n, p| {
            let values = if schedule.is_feedback(n, i) {
                &snapshot[n]
            } else {
                &net.node(n).outputs
            };
            values.get(p).copied().unwrap_or(false)
        });
        changed |= evaluate_node(net, i, inputs, ctx);
    }
    changed
}

/// Run one pass where every node sees the outputs of the previous pass
pub(crate) fn delayed_pass(net: &mut Netlist, ctx: &mut PassContext) -> bool {
    let snapshot = net.output_values();
    let read = |n: usize, p: usize| snapshot[n].get(p).copied().unwrap_or(false);
    let mut changed = false;
    for i in 0..net.nb_nodes() {
        let inputs = net.gather_inputs(i, read);
        changed |= evaluate_node(net, i, inputs, ctx);
    }
    changed
}

/// Cycle error for a cycle of node indices
pub(crate) fn cycle_error(net: &Netlist, cycle: &[usize]) -> EvaluationError {
    EvaluationError::CircularDependency {
        cycle: cycle.iter().map(|i| net.node(*i).id.clone()).collect(),
    }
}

/// Warning attached to a cycle error in immediate mode
fn cycle_warning() -> EvaluationWarning {
    EvaluationWarning::circuit(
        "circuit contains a combinational cycle; use delayed evaluation to simulate feedback",
    )
    .with_code(ErrorKind::CircularDependency)
}

/// Outcome of one evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Updated circuit, or the unchanged circuit when there are errors
    pub circuit: Circuit,
    /// Errors that prevented the pass
    pub errors: Vec<EvaluationError>,
    /// Problems that did not prevent the pass
    pub warnings: Vec<EvaluationWarning>,
    /// Whether any output changed, for delayed passes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_changes: Option<bool>,
}

impl EvaluationResult {
    fn failed(circuit: &Circuit, errors: Vec<EvaluationError>) -> EvaluationResult {
        EvaluationResult {
            circuit: circuit.clone(),
            errors,
            warnings: Vec::new(),
            has_changes: None,
        }
    }

    /// Returns whether the pass ran
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluates circuits one pass at a time
///
/// The evaluator holds no state between calls: all memory lives in the gate metadata of the
/// circuit, so evaluating the returned circuit continues the simulation.
#[derive(Debug, Clone, Copy)]
pub struct CircuitEvaluator {
    limits: Limits,
    max_settle_iterations: usize,
}

impl Default for CircuitEvaluator {
    fn default() -> Self {
        CircuitEvaluator::new()
    }
}

impl CircuitEvaluator {
    /// Create an evaluator with default limits
    pub fn new() -> CircuitEvaluator {
        CircuitEvaluator {
            limits: Limits::default(),
            max_settle_iterations: 50,
        }
    }

    /// Create an evaluator with the given limits
    pub fn with_limits(limits: Limits, max_settle_iterations: usize) -> CircuitEvaluator {
        CircuitEvaluator {
            limits,
            max_settle_iterations,
        }
    }

    /// Limits used when building circuits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Create the context of a pass at the given time
    pub fn context(&self, now: u64) -> PassContext {
        PassContext::new(now, self.max_settle_iterations)
    }

    /// Evaluate every gate once, in dependency order
    ///
    /// Fails with a cycle error if the circuit has a combinational cycle.
    pub fn evaluate_immediate(&self, circuit: &Circuit, now: u64) -> EvaluationResult {
        let mut net = match Netlist::build(circuit, &self.limits) {
            Ok(net) => net,
            Err(errors) => return EvaluationResult::failed(circuit, errors),
        };
        let schedule = match DependencyGraph::from_netlist(&net).schedule() {
            Ok(schedule) => schedule,
            Err(cycle) => {
                debug!("Immediate evaluation stopped on a cycle of {} gates", cycle.len() - 1);
                let mut ret = EvaluationResult::failed(circuit, vec![cycle_error(&net, &cycle)]);
                ret.warnings.push(cycle_warning());
                return ret;
            }
        };
        let mut ctx = self.context(now);
        let changed = immediate_pass(&mut net, &schedule, &mut ctx);
        debug!(
            "Immediate pass over {} gates, changes: {}, warnings: {}",
            net.nb_nodes(),
            changed,
            ctx.warnings.len()
        );
        let mut ret = circuit.clone();
        net.write_back(&mut ret);
        EvaluationResult {
            circuit: ret,
            errors: Vec::new(),
            warnings: ctx.warnings,
            has_changes: None,
        }
    }

    /// Evaluate every gate once from the outputs of the previous pass
    ///
    /// Each gate adds one pass of delay, so cycles are allowed; calling repeatedly simulates
    /// feedback.
    pub fn evaluate_delayed(&self, circuit: &Circuit, now: u64) -> EvaluationResult {
        let mut net = match Netlist::build(circuit, &self.limits) {
            Ok(net) => net,
            Err(errors) => return EvaluationResult::failed(circuit, errors),
        };
        let mut ctx = self.context(now);
        let changed = delayed_pass(&mut net, &mut ctx);
        debug!(
            "Delayed pass over {} gates, changes: {}, warnings: {}",
            net.nb_nodes(),
            changed,
            ctx.warnings.len()
        );
        let mut ret = circuit.clone();
        net.write_back(&mut ret);
        EvaluationResult {
            circuit: ret,
            errors: Vec::new(),
            warnings: ctx.warnings,
            has_changes: Some(changed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Gate, GateKind};

    fn chain() -> Circuit {
        // a -> not -> not -> o, with gates inserted in reverse order
        let mut c = Circuit::new();
        let o = c.add(Gate::new("o", GateKind::Output));
        let n2 = c.add(Gate::new("n2", GateKind::Not));
        let n1 = c.add(Gate::new("n1", GateKind::Not));
        let a = c.add(Gate::input("a", true));
        c.connect(&n2, 0, &o, 0);
        c.connect(&n1, 0, &n2, 0);
        c.connect(&a, 0, &n1, 0);
        c
    }

    #[test]
    fn test_immediate() {
        let ev = CircuitEvaluator::new();
        let res = ev.evaluate_immediate(&chain(), 0);
        assert!(res.is_ok());
        assert!(res.warnings.is_empty());
        assert_eq!(res.circuit.output_of("n1"), Some(false));
        assert_eq!(res.circuit.output_of("n2"), Some(true));
        assert_eq!(res.circuit.output_of("o"), Some(true));
        assert!(res.circuit.wires.iter().filter(|w| w.is_active).count() == 2);
        assert_eq!(res.has_changes, None);
    }

    #[test]
    fn test_delayed() {
        let ev = CircuitEvaluator::new();
        let mut c = chain();
        let mut passes = 0;
        loop {
            let res = ev.evaluate_delayed(&c, 0);
            c = res.circuit;
            passes += 1;
            if res.has_changes == Some(false) {
                break;
            }
        }
        // One pass per gate of delay, then a quiet pass
        assert_eq!(passes, 3);
        assert_eq!(c.output_of("o"), Some(true));
    }

    #[test]
    fn test_cycle() {
        let mut c = Circuit::new();
        let a = c.add(Gate::new("A", GateKind::Not));
        let b = c.add(Gate::new("B", GateKind::Not));
        c.connect(&a, 0, &b, 0);
        c.connect(&b, 0, &a, 0);
        let ev = CircuitEvaluator::new();
        let res = ev.evaluate_immediate(&c, 0);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].kind(), ErrorKind::CircularDependency);
        match &res.errors[0] {
            EvaluationError::CircularDependency { cycle } => {
                assert!(cycle.iter().any(|g| g.as_str() == "A"));
                assert!(cycle.iter().any(|g| g.as_str() == "B"));
            }
            e => panic!("Unexpected error {e}"),
        }
        assert_eq!(res.warnings.len(), 1);
        assert_eq!(res.warnings[0].code, Some(ErrorKind::CircularDependency));
        assert_eq!(res.circuit, c);

        let res = ev.evaluate_delayed(&c, 0);
        assert!(res.is_ok());
        assert_eq!(res.has_changes, Some(true));
    }

    #[test]
    fn test_faulty_gate() {
        let mut c = Circuit::new();
        let a = c.add(Gate::input("a", true));
        let mut g = Gate::new("and", GateKind::And);
        g.inputs = vec![true, true, true];
        g.outputs = vec![true];
        let g = c.add(g);
        let u = c.add(Gate::new("u", GateKind::Unknown));
        let o = c.add(Gate::new("o", GateKind::Output));
        c.connect(&a, 0, &g, 0);
        c.connect(&u, 0, &o, 0);
        let res = CircuitEvaluator::new().evaluate_immediate(&c, 0);
        assert!(res.is_ok());
        assert_eq!(res.warnings.len(), 2);
        assert_eq!(res.circuit.output_of("and"), Some(false));
        assert_eq!(res.circuit.output_of("u"), Some(false));
        assert_eq!(res.circuit.output_of("o"), Some(false));
        assert_eq!(res.warnings[0].gate_id.as_ref().map(|g| g.as_str()), Some("and"));
        assert_eq!(res.warnings[1].gate_id.as_ref().map(|g| g.as_str()), Some("u"));
        assert!(res
            .warnings
            .iter()
            .all(|w| w.code == Some(ErrorKind::EvaluationError)));
    }

    #[test]
    fn test_unconnected_pin() {
        let mut c = Circuit::new();
        let a = c.add(Gate::input("a", true));
        let mut g = Gate::new("and", GateKind::And);
        g.inputs = vec![false, true];
        let g = c.add(g);
        c.connect(&a, 0, &g, 0);
        let res = CircuitEvaluator::new().evaluate_immediate(&c, 0);
        assert_eq!(res.circuit.output_of("and"), Some(true));
        assert_eq!(res.circuit.gate("and").unwrap().inputs, vec![true, true]);
    }

    #[test]
    fn test_structural_error() {
        let mut c = chain();
        c.wires[0].to.gate_id = "missing".into();
        let res = CircuitEvaluator::new().evaluate_delayed(&c, 0);
        assert!(!res.is_ok());
        assert_eq!(res.errors[0].kind(), ErrorKind::MissingDependency);
        assert_eq!(res.has_changes, None);
        assert_eq!(res.circuit, c);
    }
}
