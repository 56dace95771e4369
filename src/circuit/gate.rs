use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::codec;
use crate::circuit::custom::CustomGateDefinition;

/// Identifier of a gate, unique within a circuit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(String);

impl GateId {
    /// Create an identifier
    pub fn new(id: impl Into<String>) -> Self {
        GateId(id.into())
    }

    /// Access the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GateId {
    fn from(s: &str) -> Self {
        GateId(s.to_string())
    }
}

impl From<String> for GateId {
    fn from(s: String) -> Self {
        GateId(s)
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a gate, as written in circuit files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    /// Primary input, holding a value set by the user
    #[serde(rename = "INPUT")]
    Input,
    /// Primary output, showing the value of its single input
    #[serde(rename = "OUTPUT")]
    Output,
    /// 2-input And gate
    #[serde(rename = "AND")]
    And,
    /// Or gate of any arity
    #[serde(rename = "OR")]
    Or,
    /// Inverter
    #[serde(rename = "NOT")]
    Not,
    /// 2-input Xor gate
    #[serde(rename = "XOR")]
    Xor,
    /// 2-input Nand gate
    #[serde(rename = "NAND")]
    Nand,
    /// Nor gate of any arity
    #[serde(rename = "NOR")]
    Nor,
    /// Free-running clock driven by the time provider
    #[serde(rename = "CLOCK")]
    Clock,
    /// Rising-edge D flip-flop with Q and !Q outputs
    #[serde(rename = "D-FF")]
    DFlipFlop,
    /// Set-reset latch with Q and !Q outputs
    #[serde(rename = "SR-LATCH")]
    SrLatch,
    /// 2-to-1 multiplexer: I0, I1, Select
    #[serde(rename = "MUX")]
    Mux,
    /// Gate defined by a sub-circuit or a truth table
    #[serde(rename = "CUSTOM")]
    Custom,
    /// Any kind this engine does not know about
    #[serde(other)]
    Unknown,
}

impl GateKind {
    /// Default number of input pins
    pub fn default_inputs(&self) -> usize {
        use GateKind::*;
        match self {
            Input | Clock | Unknown | Custom => 0,
            Output | Not => 1,
            And | Or | Xor | Nand | Nor | DFlipFlop | SrLatch => 2,
            Mux => 3,
        }
    }

    /// Default number of output pins
    pub fn default_outputs(&self) -> usize {
        use GateKind::*;
        match self {
            DFlipFlop | SrLatch => 2,
            Custom => 0,
            _ => 1,
        }
    }

    /// Returns whether the output of the gate depends on history rather than on its current inputs
    pub fn is_sequential(&self) -> bool {
        use GateKind::*;
        matches!(self, Input | Clock | DFlipFlop | SrLatch)
    }

    /// Name used in circuit files
    pub fn name(&self) -> &'static str {
        use GateKind::*;
        match self {
            Input => "INPUT",
            Output => "OUTPUT",
            And => "AND",
            Or => "OR",
            Not => "NOT",
            Xor => "XOR",
            Nand => "NAND",
            Nor => "NOR",
            Clock => "CLOCK",
            DFlipFlop => "D-FF",
            SrLatch => "SR-LATCH",
            Mux => "MUX",
            Custom => "CUSTOM",
            Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Position of a gate on the canvas; not interpreted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

/// Persistent per-gate data
///
/// Holds the memory of sequential gates between evaluations, and the definition of custom gates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateMetadata {
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Clock: whether it is ticking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    /// Clock: frequency in Hz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    /// Clock: instant of the first tick, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    /// Flip-flop: clock level seen at the previous evaluation
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "codec::deserialize_signal"
    )]
    pub previous_clock_state: Option<bool>,
    /// Flip-flop and latch: stored Q
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "codec::deserialize_signal"
    )]
    pub q_output: Option<bool>,
    /// Flip-flop and latch: stored !Q
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "codec::deserialize_signal"
    )]
    pub q_bar_output: Option<bool>,
    /// Custom gate: its definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_gate: Option<Box<CustomGateDefinition>>,
}

/// A logic gate, as exchanged with editors and storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// Unique identifier
    pub id: GateId,
    /// Kind of gate
    #[serde(rename = "type", alias = "kind")]
    pub kind: GateKind,
    /// Canvas position
    #[serde(default)]
    pub position: Position,
    /// Value of each input pin
    #[serde(default, deserialize_with = "codec::deserialize_signals")]
    pub inputs: Vec<bool>,
    /// Value of each output pin
    #[serde(default, deserialize_with = "codec::deserialize_signals")]
    pub outputs: Vec<bool>,
    /// Memory and configuration
    #[serde(default)]
    pub metadata: GateMetadata,
}

impl Gate {
    /// Create a gate with the default pin counts of its kind, all low
    pub fn new(id: impl Into<GateId>, kind: GateKind) -> Gate {
        Gate {
            id: id.into(),
            kind,
            position: Position::default(),
            inputs: vec![false; kind.default_inputs()],
            outputs: vec![false; kind.default_outputs()],
            metadata: GateMetadata::default(),
        }
    }

    /// Create an input gate with the given value
    pub fn input(id: impl Into<GateId>, value: bool) -> Gate {
        let mut g = Gate::new(id, GateKind::Input);
        g.outputs[0] = value;
        g
    }

    /// Create a running clock
    pub fn clock(id: impl Into<GateId>, frequency: f64) -> Gate {
        let mut g = Gate::new(id, GateKind::Clock);
        g.metadata.is_running = Some(true);
        g.metadata.frequency = Some(frequency);
        g
    }

    /// Create a custom gate from its definition
    pub fn custom(id: impl Into<GateId>, definition: CustomGateDefinition) -> Gate {
        let mut g = Gate::new(id, GateKind::Custom);
        g.inputs = vec![false; definition.inputs.len()];
        g.outputs = vec![false; definition.outputs.len()];
        g.metadata.custom_gate = Some(Box::new(definition));
        g
    }

    /// Set the position on the canvas
    pub fn at(mut self, x: f64, y: f64) -> Gate {
        self.position = Position { x, y };
        self
    }

    /// Number of input pins the gate exposes
    pub fn nb_inputs(&self) -> usize {
        match (&self.kind, &self.metadata.custom_gate) {
            (GateKind::Custom, Some(def)) => def.inputs.len(),
            _ => self.inputs.len().max(self.kind.default_inputs()),
        }
    }

    /// Number of output pins the gate exposes
    pub fn nb_outputs(&self) -> usize {
        match (&self.kind, &self.metadata.custom_gate) {
            (GateKind::Custom, Some(def)) => def.outputs.len(),
            _ => self.outputs.len().max(self.kind.default_outputs()),
        }
    }

    /// Value of the primary output
    pub fn output(&self) -> bool {
        self.outputs.first().copied().unwrap_or(false)
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}({}) = {}",
            self.kind,
            self.id,
            codec::encode_all(&self.inputs),
            codec::encode_all(&self.outputs)
        )
    }
}
