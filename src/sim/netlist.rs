use std::fmt;
use std::sync::Arc;

use fxhash::FxHashMap;
use log::debug;

use crate::circuit::{Circuit, Gate, GateId, GateKind};
use crate::error::EvaluationError;
use crate::sim::custom::CustomGateExpander;
use crate::sim::element::{ClockMemory, Element, FlipFlopMemory, LatchMemory, NaryType};

/// Limits applied while building the internal representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting of custom gates
    pub max_custom_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_custom_depth: 16,
        }
    }
}

/// A gate in the internal representation
#[derive(Debug, Clone)]
pub struct Node {
    /// Identifier of the gate in its circuit
    pub id: GateId,
    /// Behaviour and memory
    pub element: Element,
    /// Input values seen at the last evaluation
    pub inputs: Vec<bool>,
    /// Output values
    pub outputs: Vec<bool>,
    /// Output value forced from outside, replacing evaluation
    pub forced: Option<bool>,
}

/// A wire in the internal representation, between node indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Index of the wire in the circuit
    pub wire: usize,
    /// Driving node
    pub from: usize,
    /// Output pin of the driving node
    pub from_pin: usize,
    /// Driven node
    pub to: usize,
    /// Input pin of the driven node
    pub to_pin: usize,
}

/// Internal representation of a circuit used for evaluation
///
/// Gates are stored in an arena and referenced by index; node `i` is gate `i` of the circuit
/// it was built from. Custom gates hold their own netlist, so identifiers are scoped to the
/// netlist they belong to.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    drivers: Vec<Vec<usize>>,
    index: FxHashMap<GateId, usize>,
}

impl Netlist {
    /// Build the internal representation of a circuit and seed the memory of its gates
    ///
    /// Structural errors are all returned together, and no netlist is built.
    pub fn build(circuit: &Circuit, limits: &Limits) -> Result<Netlist, Vec<EvaluationError>> {
        Self::build_scoped(circuit, limits, 0)
    }

    pub(crate) fn build_scoped(
        circuit: &Circuit,
        limits: &Limits,
        depth: usize,
    ) -> Result<Netlist, Vec<EvaluationError>> {
        let errors = circuit.check();
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut ret = Netlist::default();
        for (i, g) in circuit.gates.iter().enumerate() {
            ret.index.insert(g.id.clone(), i);
            ret.nodes.push(make_node(g, limits, depth));
            ret.drivers.push(Vec::new());
        }
        for (i, w) in circuit.wires.iter().enumerate() {
            // Validity of every endpoint was checked above
            let (Some(&from), Some(&to), Some(to_pin)) = (
                ret.index.get(&w.from.gate_id),
                ret.index.get(&w.to.gate_id),
                w.to.input_pin(),
            ) else {
                continue;
            };
            ret.drivers[to].push(ret.connections.len());
            ret.connections.push(Connection {
                wire: i,
                from,
                from_pin: w.from.output_pin(),
                to,
                to_pin,
            });
        }
        debug!(
            "Built netlist with {} nodes and {} connections at depth {}",
            ret.nb_nodes(),
            ret.connections.len(),
            depth
        );
        Ok(ret)
    }

    /// Return the number of nodes
    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Get the node at index i
    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    /// Get the node at index i, for modification
    pub fn node_mut(&mut self, i: usize) -> &mut Node {
        &mut self.nodes[i]
    }

    /// All nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All connections
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections driving the inputs of node i
    pub fn drivers(&self, i: usize) -> impl Iterator<Item = &Connection> + '_ {
        self.drivers[i].iter().map(|c| &self.connections[*c])
    }

    /// Index of a gate from its identifier
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(&GateId::from(id)).copied()
    }

    /// Force the primary output of a node, or release it with `None`
    pub fn force_output(&mut self, i: usize, value: Option<bool>) {
        self.nodes[i].forced = value;
    }

    /// Current output values of every node
    pub fn output_values(&self) -> Vec<Vec<bool>> {
        self.nodes.iter().map(|n| n.outputs.clone()).collect()
    }

    /// Compute the inputs of node i, reading driving outputs through `value`
    ///
    /// Pins without a wire keep their stored value.
    pub fn gather_inputs<F: Fn(usize, usize) -> bool>(&self, i: usize, value: F) -> Vec<bool> {
        let mut ret = self.nodes[i].inputs.clone();
        for c in self.drivers(i) {
            if c.to_pin < ret.len() {
                ret[c.to_pin] = value(c.from, c.from_pin);
            }
        }
        ret
    }

    /// Number of nodes, counting the internals of custom gates
    pub fn expanded_size(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| match &n.element {
                Element::Custom(e) => 1 + e.expanded_size(),
                _ => 1,
            })
            .sum()
    }

    /// Write outputs, memory and wire states back into the circuit this netlist was built from
    pub fn write_back(&self, circuit: &mut Circuit) {
        for (g, n) in circuit.gates.iter_mut().zip(self.nodes.iter()) {
            g.inputs = n.inputs.clone();
            g.outputs = n.outputs.clone();
            n.element.store(&mut g.metadata);
        }
        for c in &self.connections {
            if let Some(w) = circuit.wires.get_mut(c.wire) {
                w.is_active = self.nodes[c.from]
                    .outputs
                    .get(c.from_pin)
                    .copied()
                    .unwrap_or(false);
            }
        }
    }
}

impl fmt::Display for Netlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Netlist with {} nodes:", self.nb_nodes())?;
        for (i, n) in self.nodes.iter().enumerate() {
            writeln!(f, "\t{} ({}) = {}", i, n.id, n.element)?;
        }
        for c in &self.connections {
            writeln!(f, "\t{}[{}] -> {}[{}]", c.from, c.from_pin, c.to, c.to_pin)?;
        }
        Ok(())
    }
}

/// Create the node for a gate, seeding its memory from the metadata
fn make_node(g: &Gate, limits: &Limits, depth: usize) -> Node {
    let element = make_element(g, limits, depth);
    let mut outputs = g.outputs.clone();
    outputs.resize(g.nb_outputs(), false);
    match &element {
        Element::DFlipFlop(FlipFlopMemory { q, q_bar, .. })
        | Element::SrLatch(LatchMemory { q, q_bar }) => {
            outputs = vec![*q, *q_bar];
        }
        Element::Input { value } => outputs = vec![*value],
        _ => (),
    }
    let mut inputs = g.inputs.clone();
    inputs.resize(g.nb_inputs(), false);
    Node {
        id: g.id.clone(),
        element,
        inputs,
        outputs,
        forced: None,
    }
}

fn make_element(g: &Gate, limits: &Limits, depth: usize) -> Element {
    let meta = &g.metadata;
    match g.kind {
        GateKind::Input => Element::Input { value: g.output() },
        GateKind::Output => Element::Output,
        GateKind::And => Element::Nary(NaryType::And),
        GateKind::Or => Element::Nary(NaryType::Or),
        GateKind::Xor => Element::Nary(NaryType::Xor),
        GateKind::Nand => Element::Nary(NaryType::Nand),
        GateKind::Nor => Element::Nary(NaryType::Nor),
        GateKind::Not => Element::Not,
        GateKind::Mux => Element::Mux,
        GateKind::Clock => Element::Clock(ClockMemory {
            is_running: meta.is_running.unwrap_or(true),
            frequency: meta.frequency.unwrap_or(1.0),
            start_time: meta.start_time,
        }),
        GateKind::DFlipFlop => {
            let q = meta.q_output.unwrap_or(g.output());
            Element::DFlipFlop(FlipFlopMemory {
                previous_clock: meta.previous_clock_state.unwrap_or(false),
                q,
                q_bar: meta.q_bar_output.unwrap_or(!q),
            })
        }
        GateKind::SrLatch => {
            let q = meta.q_output.unwrap_or(g.output());
            Element::SrLatch(LatchMemory {
                q,
                q_bar: meta.q_bar_output.unwrap_or(!q),
            })
        }
        GateKind::Custom => match &meta.custom_gate {
            None => Element::Invalid {
                kind: g.kind,
                reason: "custom gate has no definition".to_string(),
            },
            Some(def) => match CustomGateExpander::compile(def, limits, depth + 1) {
                Ok(expansion) => Element::Custom(Arc::new(expansion)),
                Err(reason) => Element::Invalid {
                    kind: g.kind,
                    reason,
                },
            },
        },
        GateKind::Unknown => Element::Invalid {
            kind: g.kind,
            reason: "unknown gate kind".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Endpoint, Wire};

    fn sample() -> Circuit {
        let mut c = Circuit::new();
        let a = c.add(Gate::input("a", true));
        let b = c.add(Gate::input("b", false));
        let x = c.add(Gate::new("x", GateKind::Xor));
        let o = c.add(Gate::new("o", GateKind::Output));
        c.connect(&a, 0, &x, 0);
        c.connect(&b, 0, &x, 1);
        c.connect(&x, 0, &o, 0);
        c
    }

    #[test]
    fn test_build() {
        let c = sample();
        let net = Netlist::build(&c, &Limits::default()).unwrap();
        assert_eq!(net.nb_nodes(), 4);
        assert_eq!(net.connections().len(), 3);
        assert_eq!(net.index_of("x"), Some(2));
        assert_eq!(net.drivers(2).count(), 2);
        assert_eq!(net.node(0).outputs, vec![true]);
        assert!(net.node(0).element.is_sequential());
        assert!(!net.node(2).element.is_sequential());
        assert_eq!(net.gather_inputs(2, |n, _| n == 0), vec![true, false]);
        assert_eq!(net.expanded_size(), 4);
    }

    #[test]
    fn test_build_errors() {
        let mut c = sample();
        c.wires.push(Wire::new(
            "bad",
            Endpoint::output("nowhere", 0),
            Endpoint::input("o", 0),
        ));
        let errors = Netlist::build(&c, &Limits::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_seed_memory() {
        let mut c = Circuit::new();
        let mut ff = Gate::new("ff", GateKind::DFlipFlop);
        ff.metadata.q_output = Some(true);
        ff.metadata.previous_clock_state = Some(true);
        c.add(ff);
        c.add(Gate::new("u", GateKind::Unknown));
        let net = Netlist::build(&c, &Limits::default()).unwrap();
        assert_eq!(net.node(0).outputs, vec![true, false]);
        match &net.node(0).element {
            Element::DFlipFlop(mem) => assert!(mem.previous_clock),
            e => panic!("Unexpected element {e}"),
        }
        assert!(matches!(net.node(1).element, Element::Invalid { .. }));
    }

    #[test]
    fn test_write_back() {
        let mut c = sample();
        let mut net = Netlist::build(&c, &Limits::default()).unwrap();
        net.node_mut(2).outputs = vec![true];
        net.node_mut(2).inputs = vec![true, false];
        net.write_back(&mut c);
        assert_eq!(c.output_of("x"), Some(true));
        assert!(c.wires[2].is_active);
        assert!(c.wires[0].is_active);
        assert!(!c.wires[1].is_active);
    }
}
