use core::fmt;

use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::circuit::{Endpoint, Gate, GateId, GateKind, Wire};
use crate::error::EvaluationError;

/// A circuit as exchanged with editors and storage: gates and the wires between them
///
/// Field names are part of the file format. The engine only reads the structure and writes
/// back gate outputs, gate memory and the display state of wires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// Gates, with unique identifiers
    #[serde(default)]
    pub gates: Vec<Gate>,
    /// Wires; both ends must reference existing gates
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl Circuit {
    /// Create an empty circuit
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a circuit document
    pub fn from_json(s: &str) -> Result<Circuit, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Write the circuit document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Return the number of gates
    pub fn nb_gates(&self) -> usize {
        self.gates.len()
    }

    /// Return the number of wires
    pub fn nb_wires(&self) -> usize {
        self.wires.len()
    }

    /// Get a gate by identifier
    pub fn gate(&self, id: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.id.as_str() == id)
    }

    /// Get a gate by identifier, for modification
    pub fn gate_mut(&mut self, id: &str) -> Option<&mut Gate> {
        self.gates.iter_mut().find(|g| g.id.as_str() == id)
    }

    /// Add a gate and return its identifier
    pub fn add(&mut self, gate: Gate) -> GateId {
        let id = gate.id.clone();
        self.gates.push(gate);
        id
    }

    /// Connect an output pin to an input pin, returning the identifier of the new wire
    pub fn connect(&mut self, from: &GateId, from_pin: usize, to: &GateId, to_pin: usize) -> String {
        let mut n = self.wires.len();
        let mut id = format!("w{n}");
        while self.wires.iter().any(|w| w.id == id) {
            n += 1;
            id = format!("w{n}");
        }
        self.wires.push(Wire::new(
            id.clone(),
            Endpoint::output(from.clone(), from_pin),
            Endpoint::input(to.clone(), to_pin),
        ));
        id
    }

    /// Set the value held by an input gate; returns false if there is no such input
    pub fn set_input(&mut self, id: &str, value: bool) -> bool {
        match self.gate_mut(id) {
            Some(g) if g.kind == GateKind::Input => {
                if g.outputs.is_empty() {
                    g.outputs.push(value);
                } else {
                    g.outputs[0] = value;
                }
                true
            }
            _ => false,
        }
    }

    /// Value of the primary output of a gate
    pub fn output_of(&self, id: &str) -> Option<bool> {
        self.gate(id).map(|g| g.output())
    }

    /// All output values of a gate
    pub fn outputs_of(&self, id: &str) -> Option<&[bool]> {
        self.gate(id).map(|g| g.outputs.as_slice())
    }

    /// Check the structure of the circuit, returning every problem found
    ///
    /// Duplicate identifiers, dangling wires, pins out of range and input pins driven by
    /// several wires are reported.
    pub fn check(&self) -> Vec<EvaluationError> {
        let mut errors = Vec::new();
        let mut gates: FxHashMap<&str, &Gate> = FxHashMap::default();
        for g in &self.gates {
            if gates.insert(g.id.as_str(), g).is_some() {
                errors.push(EvaluationError::invalid_gate(&g.id, "duplicate gate id"));
            }
        }

        let mut wire_ids = FxHashSet::default();
        let mut driven = FxHashSet::default();
        for w in &self.wires {
            if !wire_ids.insert(w.id.as_str()) {
                errors.push(EvaluationError::invalid_wire(&w.id, "duplicate wire id"));
            }
            let src = gates.get(w.from.gate_id.as_str());
            let dst = gates.get(w.to.gate_id.as_str());
            if src.is_none() {
                errors.push(EvaluationError::MissingDependency {
                    wire_id: w.id.clone(),
                    gate_id: w.from.gate_id.clone(),
                });
            }
            if dst.is_none() {
                errors.push(EvaluationError::MissingDependency {
                    wire_id: w.id.clone(),
                    gate_id: w.to.gate_id.clone(),
                });
            }
            if let Some(src) = src {
                let pin = w.from.output_pin();
                if pin >= src.nb_outputs() {
                    errors.push(EvaluationError::invalid_wire(
                        &w.id,
                        format!("{} has no output pin {}", src.id, pin),
                    ));
                }
            }
            if let Some(dst) = dst {
                match w.to.input_pin() {
                    Some(pin) if pin < dst.nb_inputs() => {
                        if !driven.insert((dst.id.as_str(), pin)) {
                            errors.push(EvaluationError::invalid_wire(
                                &w.id,
                                format!("input pin {} of {} has several drivers", pin, dst.id),
                            ));
                        }
                    }
                    _ => errors.push(EvaluationError::invalid_wire(
                        &w.id,
                        format!("{} has no input pin {}", dst.id, w.to.pin_index),
                    )),
                }
            }
        }
        errors
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Circuit with {} gates, {} wires:",
            self.nb_gates(),
            self.nb_wires()
        )?;
        for g in &self.gates {
            writeln!(f, "\t{}", g)?;
        }
        for w in &self.wires {
            writeln!(f, "\t{}", w)?;
        }
        Ok(())
    }
}
