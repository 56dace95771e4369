//! Compute circuit complexity
//!
//! ```
//! # use gatesim::circuit::generators;
//! use gatesim::circuit::stats::analyze_complexity;
//! let stats = analyze_complexity(&generators::basic::half_adder(true, false));
//!
//! assert!(!stats.has_cycles);
//! assert_eq!(stats.max_depth, 2);
//!
//! // Show the statistics
//! println!("{}", stats);
//! ```

use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::circuit::{Circuit, GateId, GateKind};
use crate::sim::DependencyGraph;

/// Size and structure of a circuit
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitComplexity {
    /// Number of gates
    pub nb_gates: usize,
    /// Number of wires
    pub nb_wires: usize,
    /// Number of custom gates
    pub nb_custom: usize,
    /// Whether there is a combinational cycle
    pub has_cycles: bool,
    /// Gates of one combinational cycle, in signal order
    pub cycle_gates: Vec<GateId>,
    /// Whether there is a clock
    pub has_clock: bool,
    /// Whether there is a D flip-flop
    pub has_dff: bool,
    /// Whether there is a set-reset latch
    pub has_latch: bool,
    /// Number of combinational gates on the longest path
    pub max_depth: usize,
}

impl CircuitComplexity {
    /// Returns whether the circuit holds state between passes
    pub fn is_sequential(&self) -> bool {
        self.has_clock || self.has_dff || self.has_latch || self.has_cycles
    }
}

impl fmt::Display for CircuitComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Complexity:")?;
        writeln!(f, "  Gates: {}", self.nb_gates)?;
        writeln!(f, "  Wires: {}", self.nb_wires)?;
        if self.nb_custom != 0 {
            writeln!(f, "  Custom: {}", self.nb_custom)?;
        }
        writeln!(f, "  Depth: {}", self.max_depth)?;
        if self.has_clock {
            writeln!(f, "  Clock")?;
        }
        if self.has_dff {
            writeln!(f, "  D flip-flops")?;
        }
        if self.has_latch {
            writeln!(f, "  Latches")?;
        }
        if self.has_cycles {
            writeln!(f, "  Cycle: {}", self.cycle_gates.iter().join(" -> "))?;
        }
        fmt::Result::Ok(())
    }
}

/// Compute the complexity of the circuit
///
/// Works on circuits that fail validation: wires to missing gates are ignored.
pub fn analyze_complexity(c: &Circuit) -> CircuitComplexity {
    let graph = DependencyGraph::from_circuit(c);
    let cycle_gates = match graph.topological_order() {
        Ok(_) => Vec::new(),
        Err(cycle) => cycle[..cycle.len() - 1]
            .iter()
            .map(|i| c.gates[*i].id.clone())
            .collect(),
    };
    let has = |kind: GateKind| c.gates.iter().any(|g| g.kind == kind);
    CircuitComplexity {
        nb_gates: c.nb_gates(),
        nb_wires: c.nb_wires(),
        nb_custom: c.gates.iter().filter(|g| g.kind == GateKind::Custom).count(),
        has_cycles: !cycle_gates.is_empty(),
        cycle_gates,
        has_clock: has(GateKind::Clock),
        has_dff: has(GateKind::DFlipFlop),
        has_latch: has(GateKind::SrLatch),
        max_depth: graph.max_depth(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::generators::{basic, sequential};

    #[test]
    fn test_combinational() {
        let stats = analyze_complexity(&basic::decoder_2to4(false, false));
        assert_eq!(stats.nb_gates, 12);
        assert!(!stats.has_cycles);
        assert!(!stats.is_sequential());
        // Not, And, Output
        assert_eq!(stats.max_depth, 3);
    }

    #[test]
    fn test_ring() {
        let stats = analyze_complexity(&sequential::ring_oscillator(3));
        assert!(stats.has_cycles);
        assert_eq!(stats.cycle_gates.len(), 3);
        assert!(stats.to_string().contains("Cycle"));
    }

    #[test]
    fn test_sequential() {
        let stats = analyze_complexity(&sequential::toggle_flip_flop(1.0));
        assert!(stats.has_clock);
        assert!(stats.has_dff);
        assert!(!stats.has_latch);
        assert!(!stats.has_cycles);
        // The flip-flop breaks the loop through the inverter
        assert_eq!(stats.max_depth, 1);
    }
}
