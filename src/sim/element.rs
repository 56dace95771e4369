use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::circuit::{GateKind, GateMetadata};
use crate::sim::custom::{CustomGateExpander, Expansion};
use crate::sim::evaluator::PassContext;

/// Basic types of gates that reduce their inputs to a single value
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum NaryType {
    /// And gate, exactly 2 inputs
    And,
    /// Or gate of any arity
    Or,
    /// Xor gate, exactly 2 inputs
    Xor,
    /// Nand gate, exactly 2 inputs
    Nand,
    /// Nor gate of any arity
    Nor,
}

/// Memory of a clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockMemory {
    /// Whether the clock is ticking; a stopped clock outputs 0
    pub is_running: bool,
    /// Frequency in Hz
    pub frequency: f64,
    /// Instant of the first evaluation, set lazily
    pub start_time: Option<u64>,
}

/// Memory of a D flip-flop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlipFlopMemory {
    /// Clock level seen at the previous evaluation
    pub previous_clock: bool,
    /// Stored Q
    pub q: bool,
    /// Stored !Q
    pub q_bar: bool,
}

/// Memory of a set-reset latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatchMemory {
    /// Stored Q
    pub q: bool,
    /// Stored !Q
    pub q_bar: bool,
}

/// Failure of a single gate; the gate outputs 0 and evaluation goes on
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateFault {
    /// Wrong number of inputs for the gate kind
    #[error("{kind} gate requires exactly {expected} inputs, got {got}")]
    Arity {
        /// Kind of the gate
        kind: GateKind,
        /// Number of inputs required
        expected: usize,
        /// Number of inputs present
        got: usize,
    },
    /// Clock with a frequency that cannot produce a period
    #[error("clock frequency must be positive, got {0}")]
    Frequency(f64),
    /// Gate that cannot be evaluated at all
    #[error("{0}")]
    Unsupported(String),
    /// Failure inside a custom gate
    #[error("custom gate {name}: {message}")]
    Custom {
        /// Name of the definition
        name: String,
        /// Description of the failure
        message: String,
    },
}

/// A gate in the internal representation, with the memory its kind requires
///
/// Each variant carries exactly the state its kind needs, so that evaluation is a single
/// exhaustive match.
#[derive(Debug, Clone)]
pub enum Element {
    /// Primary input, holding its value
    Input {
        /// Value set by the user
        value: bool,
    },
    /// Primary output
    Output,
    /// Reducing gate (And/Or/Xor/Nand/Nor)
    Nary(NaryType),
    /// Inverter
    Not,
    /// Clock driven by time
    Clock(ClockMemory),
    /// Rising-edge D flip-flop
    DFlipFlop(FlipFlopMemory),
    /// Set-reset latch
    SrLatch(LatchMemory),
    /// Multiplexer
    Mux,
    /// Custom gate, shared with every instance of the same gate
    Custom(Arc<Expansion>),
    /// Gate that always fails: unknown kind, or custom gate with an unusable definition
    Invalid {
        /// Kind as written in the circuit
        kind: GateKind,
        /// Why the gate cannot be evaluated
        reason: String,
    },
}

impl Element {
    /// Returns whether the output depends on history rather than on the current inputs
    ///
    /// Sequential elements read their inputs from the previous pass, so they break
    /// combinational dependencies.
    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            Element::Input { .. } | Element::Clock(_) | Element::DFlipFlop(_) | Element::SrLatch(_)
        )
    }

    /// Kind of the gate this element was built from
    pub fn kind(&self) -> GateKind {
        use Element::*;
        match self {
            Input { .. } => GateKind::Input,
            Output => GateKind::Output,
            Nary(NaryType::And) => GateKind::And,
            Nary(NaryType::Or) => GateKind::Or,
            Nary(NaryType::Xor) => GateKind::Xor,
            Nary(NaryType::Nand) => GateKind::Nand,
            Nary(NaryType::Nor) => GateKind::Nor,
            Not => GateKind::Not,
            Clock(_) => GateKind::Clock,
            DFlipFlop(_) => GateKind::DFlipFlop,
            SrLatch(_) => GateKind::SrLatch,
            Mux => GateKind::Mux,
            Custom(_) => GateKind::Custom,
            Invalid { kind, .. } => *kind,
        }
    }

    /// Compute the outputs from the inputs, updating the memory
    ///
    /// Memory is only written when evaluation succeeds.
    pub fn evaluate(
        &mut self,
        inputs: &[bool],
        ctx: &mut PassContext,
    ) -> Result<Vec<bool>, GateFault> {
        use Element::*;
        let kind = self.kind();
        match self {
            Input { value } => Ok(vec![*value]),
            Output => {
                expect_inputs(kind, inputs, 1)?;
                Ok(vec![inputs[0]])
            }
            Not => {
                expect_inputs(kind, inputs, 1)?;
                Ok(vec![!inputs[0]])
            }
            Nary(tp) => Ok(vec![compute_nary(*tp, inputs)?]),
            Mux => {
                expect_inputs(kind, inputs, 3)?;
                Ok(vec![if inputs[2] { inputs[1] } else { inputs[0] }])
            }
            Clock(mem) => {
                if !mem.is_running {
                    return Ok(vec![false]);
                }
                if mem.frequency <= 0.0 || !mem.frequency.is_finite() {
                    return Err(GateFault::Frequency(mem.frequency));
                }
                let start = *mem.start_time.get_or_insert(ctx.now);
                let period = 1000.0 / mem.frequency;
                let elapsed = ctx.now.saturating_sub(start) as f64;
                let periods = (elapsed / period).floor() as u64;
                Ok(vec![periods % 2 == 1])
            }
            DFlipFlop(mem) => {
                expect_inputs(kind, inputs, 2)?;
                let (d, clk) = (inputs[0], inputs[1]);
                if !mem.previous_clock && clk {
                    mem.q = d;
                    mem.q_bar = !d;
                }
                mem.previous_clock = clk;
                Ok(vec![mem.q, mem.q_bar])
            }
            SrLatch(mem) => {
                expect_inputs(kind, inputs, 2)?;
                match (inputs[0], inputs[1]) {
                    (true, false) => {
                        mem.q = true;
                        mem.q_bar = false;
                    }
                    (false, true) => {
                        mem.q = false;
                        mem.q_bar = true;
                    }
                    (false, false) => (),
                    (true, true) => ctx.note("S and R both set; latch holds its previous state"),
                }
                Ok(vec![mem.q, mem.q_bar])
            }
            Custom(expansion) => CustomGateExpander::evaluate(expansion, inputs, ctx),
            Invalid { reason, .. } => Err(GateFault::Unsupported(reason.clone())),
        }
    }

    /// Save the memory into the gate metadata
    pub fn store(&self, metadata: &mut GateMetadata) {
        match self {
            Element::Clock(mem) => {
                metadata.is_running = Some(mem.is_running);
                metadata.frequency = Some(mem.frequency);
                metadata.start_time = mem.start_time;
            }
            Element::DFlipFlop(mem) => {
                metadata.previous_clock_state = Some(mem.previous_clock);
                metadata.q_output = Some(mem.q);
                metadata.q_bar_output = Some(mem.q_bar);
            }
            Element::SrLatch(mem) => {
                metadata.q_output = Some(mem.q);
                metadata.q_bar_output = Some(mem.q_bar);
            }
            _ => (),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Element::*;
        match self {
            Input { value } => write!(f, "Input({})", *value as u8),
            Clock(mem) => write!(f, "Clock({}Hz)", mem.frequency),
            DFlipFlop(mem) => write!(f, "Dff(q={})", mem.q as u8),
            SrLatch(mem) => write!(f, "Latch(q={})", mem.q as u8),
            Invalid { kind, reason } => write!(f, "{kind}!({reason})"),
            _ => write!(f, "{}", self.kind()),
        }
    }
}

fn expect_inputs(kind: GateKind, inputs: &[bool], expected: usize) -> Result<(), GateFault> {
    if inputs.len() != expected {
        return Err(GateFault::Arity {
            kind,
            expected,
            got: inputs.len(),
        });
    }
    Ok(())
}

fn compute_nary(tp: NaryType, inputs: &[bool]) -> Result<bool, GateFault> {
    let kind = Element::Nary(tp).kind();
    match tp {
        NaryType::And => {
            expect_inputs(kind, inputs, 2)?;
            Ok(inputs[0] && inputs[1])
        }
        NaryType::Nand => {
            expect_inputs(kind, inputs, 2)?;
            Ok(!(inputs[0] && inputs[1]))
        }
        NaryType::Xor => {
            expect_inputs(kind, inputs, 2)?;
            Ok(inputs[0] != inputs[1])
        }
        NaryType::Or => Ok(inputs.iter().any(|b| *b)),
        NaryType::Nor => Ok(!inputs.iter().any(|b| *b)),
    }
}
