use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, GateId};

/// Pin of a custom gate, and the internal gate it is bound to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinDescriptor {
    /// Display name
    pub name: String,
    /// Internal gate bound to this pin, for definitions with a sub-circuit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<GateId>,
    /// Pin of the internal gate; -1 designates the primary output
    #[serde(default = "primary_pin")]
    pub pin_index: i32,
}

fn primary_pin() -> i32 {
    -1
}

impl PinDescriptor {
    /// Pin bound to the primary pin of an internal gate
    pub fn bound(name: impl Into<String>, gate_id: impl Into<GateId>) -> PinDescriptor {
        PinDescriptor {
            name: name.into(),
            gate_id: Some(gate_id.into()),
            pin_index: -1,
        }
    }

    /// Pin bound to a given input pin of an internal gate
    pub fn bound_pin(
        name: impl Into<String>,
        gate_id: impl Into<GateId>,
        pin_index: usize,
    ) -> PinDescriptor {
        PinDescriptor {
            name: name.into(),
            gate_id: Some(gate_id.into()),
            pin_index: pin_index as i32,
        }
    }

    /// Pin with no internal binding, for truth table definitions
    pub fn named(name: impl Into<String>) -> PinDescriptor {
        PinDescriptor {
            name: name.into(),
            gate_id: None,
            pin_index: -1,
        }
    }
}

/// Definition of a custom gate
///
/// The behaviour comes from an internal circuit when present, otherwise from the truth table.
/// Truth table keys and values are bit patterns, one character per pin in pin order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomGateDefinition {
    /// Name of the gate
    pub name: String,
    /// Input pins, in order
    pub inputs: Vec<PinDescriptor>,
    /// Output pins, in order
    pub outputs: Vec<PinDescriptor>,
    /// Sub-circuit implementing the gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_circuit: Option<Circuit>,
    /// Explicit truth table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth_table: Option<BTreeMap<String, String>>,
}

impl CustomGateDefinition {
    /// Definition backed by a sub-circuit
    pub fn from_circuit(
        name: impl Into<String>,
        inputs: Vec<PinDescriptor>,
        outputs: Vec<PinDescriptor>,
        circuit: Circuit,
    ) -> Self {
        CustomGateDefinition {
            name: name.into(),
            inputs,
            outputs,
            internal_circuit: Some(circuit),
            truth_table: None,
        }
    }

    /// Definition backed by a truth table
    pub fn from_truth_table(
        name: impl Into<String>,
        inputs: &[&str],
        outputs: &[&str],
        rows: &[(&str, &str)],
    ) -> Self {
        CustomGateDefinition {
            name: name.into(),
            inputs: inputs.iter().map(|n| PinDescriptor::named(*n)).collect(),
            outputs: outputs.iter().map(|n| PinDescriptor::named(*n)).collect(),
            internal_circuit: None,
            truth_table: Some(
                rows.iter()
                    .map(|(i, o)| (i.to_string(), o.to_string()))
                    .collect(),
            ),
        }
    }
}
