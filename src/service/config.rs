use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sim::Limits;

/// Evaluation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Immediate for circuits without combinational cycles, delayed otherwise
    #[default]
    Auto,
    /// Single pass in dependency order
    Immediate,
    /// Single pass with one step of delay per gate
    Delayed,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Auto => write!(f, "auto"),
            Strategy::Immediate => write!(f, "immediate"),
            Strategy::Delayed => write!(f, "delayed"),
        }
    }
}

/// Configuration of the evaluation service
///
/// Every field has a default, so that an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Strategy used by [`evaluate`](crate::service::EvaluationService::evaluate)
    pub strategy: Strategy,
    /// Bound on delayed passes when waiting for a circuit to settle
    pub max_settle_iterations: usize,
    /// Wall-clock budget of one call, in milliseconds
    pub timeout_ms: u64,
    /// Maximum number of gates, counting the internals of custom gates
    pub max_gates: usize,
    /// Maximum nesting of custom gates
    pub max_custom_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            strategy: Strategy::Auto,
            max_settle_iterations: 50,
            timeout_ms: 5000,
            max_gates: 100_000,
            max_custom_depth: 16,
        }
    }
}

impl ServiceConfig {
    /// Parse a configuration document
    pub fn from_json(s: &str) -> Result<ServiceConfig, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Limits used when building circuits
    pub fn limits(&self) -> Limits {
        Limits {
            max_custom_depth: self.max_custom_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ServiceConfig::from_json("{}").unwrap();
        assert_eq!(c, ServiceConfig::default());
        assert_eq!(c.max_settle_iterations, 50);
        assert_eq!(c.limits().max_custom_depth, 16);
    }

    #[test]
    fn test_parse() {
        let c = ServiceConfig::from_json(r#"{"strategy": "delayed", "timeoutMs": 100}"#).unwrap();
        assert_eq!(c.strategy, Strategy::Delayed);
        assert_eq!(c.timeout_ms, 100);
        assert_eq!(c.max_gates, 100_000);
        assert!(ServiceConfig::from_json(r#"{"strategy": "fastest"}"#).is_err());
        assert_eq!(Strategy::Immediate.to_string(), "immediate");
    }
}
