//! Errors and warnings reported by evaluation
//!
//! Structural problems are returned as [`EvaluationError`] values before any gate runs.
//! Problems local to a single gate are downgraded to [`EvaluationWarning`]s, and the gate outputs `false`.
//! The service layer wraps everything in a [`ServiceError`] with a recovery hint.

use std::fmt;

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use crate::circuit::GateId;

/// Category of an [`EvaluationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A gate is malformed or duplicated
    InvalidGate,
    /// A wire is malformed, duplicated or out of range
    InvalidWire,
    /// A combinational loop prevents topological evaluation
    CircularDependency,
    /// A wire references a gate that does not exist
    MissingDependency,
    /// A gate failed during evaluation
    EvaluationError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidGate => "INVALID_GATE",
            ErrorKind::InvalidWire => "INVALID_WIRE",
            ErrorKind::CircularDependency => "CIRCULAR_DEPENDENCY",
            ErrorKind::MissingDependency => "MISSING_DEPENDENCY",
            ErrorKind::EvaluationError => "EVALUATION_ERROR",
        };
        write!(f, "{s}")
    }
}

/// Error that stops an evaluation pass
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationError {
    /// Malformed or duplicated gate
    #[error("invalid gate {gate_id}: {message}")]
    #[serde(rename_all = "camelCase")]
    InvalidGate {
        /// Offending gate
        gate_id: GateId,
        /// Description of the problem
        message: String,
    },
    /// Malformed, duplicated or out of range wire
    #[error("invalid wire {wire_id}: {message}")]
    #[serde(rename_all = "camelCase")]
    InvalidWire {
        /// Offending wire
        wire_id: String,
        /// Description of the problem
        message: String,
    },
    /// Combinational loop, with the gates forming it
    #[error("circular dependency: {}", .cycle.iter().join(" -> "))]
    CircularDependency {
        /// Witness path; the first gate is repeated at the end
        cycle: Vec<GateId>,
    },
    /// Wire endpoint referencing an unknown gate
    #[error("wire {wire_id} references missing gate {gate_id}")]
    #[serde(rename_all = "camelCase")]
    MissingDependency {
        /// Offending wire
        wire_id: String,
        /// Gate that could not be found
        gate_id: GateId,
    },
    /// Failure of a gate that could not be contained at the gate level
    #[error("evaluation of {gate_id} failed: {message}")]
    #[serde(rename_all = "camelCase")]
    EvaluationError {
        /// Offending gate
        gate_id: GateId,
        /// Description of the problem
        message: String,
    },
}

impl EvaluationError {
    /// Category of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvaluationError::InvalidGate { .. } => ErrorKind::InvalidGate,
            EvaluationError::InvalidWire { .. } => ErrorKind::InvalidWire,
            EvaluationError::CircularDependency { .. } => ErrorKind::CircularDependency,
            EvaluationError::MissingDependency { .. } => ErrorKind::MissingDependency,
            EvaluationError::EvaluationError { .. } => ErrorKind::EvaluationError,
        }
    }

    pub(crate) fn invalid_gate(gate_id: &GateId, message: impl Into<String>) -> Self {
        EvaluationError::InvalidGate {
            gate_id: gate_id.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn evaluation(gate_id: &GateId, message: impl Into<String>) -> Self {
        EvaluationError::EvaluationError {
            gate_id: gate_id.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_wire(wire_id: &str, message: impl Into<String>) -> Self {
        EvaluationError::InvalidWire {
            wire_id: wire_id.to_string(),
            message: message.into(),
        }
    }
}

/// Non-fatal problem found during evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationWarning {
    /// Gate concerned, if any
    pub gate_id: Option<GateId>,
    /// Category, when the warning stands for a contained error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorKind>,
    /// Human readable description
    pub message: String,
}

impl EvaluationWarning {
    /// Warning attached to a gate
    pub fn gate(gate_id: &GateId, message: impl Into<String>) -> Self {
        EvaluationWarning {
            gate_id: Some(gate_id.clone()),
            code: None,
            message: message.into(),
        }
    }

    /// Warning about the circuit as a whole
    pub fn circuit(message: impl Into<String>) -> Self {
        EvaluationWarning {
            gate_id: None,
            code: None,
            message: message.into(),
        }
    }

    /// Tag the warning with an error category
    pub fn with_code(mut self, code: ErrorKind) -> Self {
        self.code = Some(code);
        self
    }
}

/// An error downgraded to a warning, keeping its category
impl From<EvaluationError> for EvaluationWarning {
    fn from(e: EvaluationError) -> Self {
        let gate_id = match &e {
            EvaluationError::InvalidGate { gate_id, .. }
            | EvaluationError::MissingDependency { gate_id, .. }
            | EvaluationError::EvaluationError { gate_id, .. } => Some(gate_id.clone()),
            _ => None,
        };
        EvaluationWarning {
            gate_id,
            code: Some(e.kind()),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for EvaluationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.gate_id {
            Some(id) => write!(f, "{id}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Category of a [`ServiceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceErrorKind {
    /// The circuit failed structural validation
    CircuitInvalid,
    /// The call exceeded its time budget
    SimulationTimeout,
    /// The circuit did not settle within the iteration bound
    OscillationDetected,
    /// The circuit is too large
    MemoryLimitExceeded,
    /// The requested strategy could not evaluate the circuit
    StrategyFailed,
    /// Anything else
    UnknownError,
}

/// Error returned by the evaluation service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Structural validation failed
    #[error("circuit is invalid: {}", .errors.iter().join("; "))]
    CircuitInvalid {
        /// All structural errors found
        errors: Vec<EvaluationError>,
    },
    /// Time budget exceeded
    #[error("simulation took {elapsed_ms}ms, over the {limit_ms}ms budget")]
    SimulationTimeout {
        /// Time spent
        elapsed_ms: u64,
        /// Configured budget
        limit_ms: u64,
    },
    /// No fixed point reached
    #[error("circuit still changing after {iterations} iterations")]
    OscillationDetected {
        /// Number of passes run
        iterations: usize,
    },
    /// Circuit too large
    #[error("circuit has {gates} gates after expansion, limit is {limit}")]
    MemoryLimitExceeded {
        /// Number of gates, including custom gate internals
        gates: usize,
        /// Configured limit
        limit: usize,
    },
    /// Forced strategy failed
    #[error("{strategy} evaluation failed: {}", .errors.iter().join("; "))]
    StrategyFailed {
        /// Strategy that was attempted
        strategy: String,
        /// Errors it reported
        errors: Vec<EvaluationError>,
    },
    /// Unexpected failure
    #[error("{message}")]
    Unknown {
        /// Description
        message: String,
    },
}

impl ServiceError {
    /// Category of the error
    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            ServiceError::CircuitInvalid { .. } => ServiceErrorKind::CircuitInvalid,
            ServiceError::SimulationTimeout { .. } => ServiceErrorKind::SimulationTimeout,
            ServiceError::OscillationDetected { .. } => ServiceErrorKind::OscillationDetected,
            ServiceError::MemoryLimitExceeded { .. } => ServiceErrorKind::MemoryLimitExceeded,
            ServiceError::StrategyFailed { .. } => ServiceErrorKind::StrategyFailed,
            ServiceError::Unknown { .. } => ServiceErrorKind::UnknownError,
        }
    }

    /// Suggested remediation, suitable for display
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ServiceError::CircuitInvalid { .. } => {
                "Remove dangling wires and duplicate ids, then evaluate again"
            }
            ServiceError::SimulationTimeout { .. } => {
                "Reduce the circuit size or raise the timeout in the configuration"
            }
            ServiceError::OscillationDetected { .. } => {
                "The circuit oscillates; step it in delayed mode instead of waiting for a stable state"
            }
            ServiceError::MemoryLimitExceeded { .. } => {
                "Split the circuit or flatten deeply nested custom gates"
            }
            ServiceError::StrategyFailed { .. } => {
                "Let the service pick the strategy, or use delayed mode for circuits with feedback"
            }
            ServiceError::Unknown { .. } => "Report the circuit that triggered the failure",
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Unknown {
            message: format!("malformed circuit document: {e}"),
        }
    }
}
