use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::GateId;

/// One end of a wire: a gate and a pin index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Gate at this end
    pub gate_id: GateId,
    /// Pin index; for sources, see [`Endpoint::output_pin`]
    pub pin_index: i32,
}

impl Endpoint {
    /// Endpoint on an output pin, in the negative encoding used by circuit files
    pub fn output(gate_id: impl Into<GateId>, pin: usize) -> Endpoint {
        Endpoint {
            gate_id: gate_id.into(),
            pin_index: -(pin as i32) - 1,
        }
    }

    /// Endpoint on an input pin
    pub fn input(gate_id: impl Into<GateId>, pin: usize) -> Endpoint {
        Endpoint {
            gate_id: gate_id.into(),
            pin_index: pin as i32,
        }
    }

    /// Output pin designated by a source endpoint
    ///
    /// Output k is written as -k-1; older files use the plain non-negative index.
    pub fn output_pin(&self) -> usize {
        if self.pin_index < 0 {
            (-(self.pin_index + 1)) as usize
        } else {
            self.pin_index as usize
        }
    }

    /// Input pin designated by a destination endpoint, if valid
    pub fn input_pin(&self) -> Option<usize> {
        usize::try_from(self.pin_index).ok()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.gate_id, self.pin_index)
    }
}

/// A connection from an output pin to an input pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wire {
    /// Unique identifier
    pub id: String,
    /// Driving output pin
    pub from: Endpoint,
    /// Driven input pin
    pub to: Endpoint,
    /// Value carried at the last evaluation, for display only
    #[serde(default)]
    pub is_active: bool,
}

impl Wire {
    /// Create a wire between two endpoints
    pub fn new(id: impl Into<String>, from: Endpoint, to: Endpoint) -> Wire {
        Wire {
            id: id.into(),
            from,
            to,
            is_active: false,
        }
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.id, self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_encoding() {
        assert_eq!(Endpoint::output("a", 0).pin_index, -1);
        assert_eq!(Endpoint::output("a", 1).pin_index, -2);
        assert_eq!(Endpoint::output("a", 1).output_pin(), 1);
        assert_eq!(Endpoint::input("a", 2).output_pin(), 2);
        assert_eq!(Endpoint::input("a", 2).input_pin(), Some(2));
        assert_eq!(Endpoint::output("a", 0).input_pin(), None);
    }

    #[test]
    fn test_json_shape() {
        let w: Wire = serde_json::from_str(
            r#"{"id": "w", "from": {"gateId": "a", "pinIndex": -1},
                "to": {"gateId": "b", "pinIndex": 1}}"#,
        )
        .unwrap();
        assert_eq!(w.from.gate_id, GateId::from("a"));
        assert_eq!(w.to.input_pin(), Some(1));
        assert!(!w.is_active);
        let v = serde_json::to_value(&w).unwrap();
        assert_eq!(v["isActive"], false);
        assert_eq!(v["to"]["pinIndex"], 1);
    }
}
