//! Orchestration of evaluations: strategy selection, limits, clock stepping and statistics
//!
//! ```
//! # use gatesim::circuit::generators::basic;
//! use gatesim::service::{EvaluationService, ServiceConfig, Strategy};
//! use gatesim::sim::FixedTime;
//!
//! let mut service = EvaluationService::with_time(ServiceConfig::default(), FixedTime(0));
//! let response = service.evaluate(&basic::half_adder(true, true)).unwrap();
//! assert_eq!(response.strategy_used, Strategy::Immediate);
//! assert_eq!(response.circuit.output_of("S"), Some(false));
//! assert_eq!(response.circuit.output_of("C"), Some(true));
//! ```

mod clock;
mod config;

use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;

use crate::circuit::stats::{analyze_complexity, CircuitComplexity};
use crate::circuit::Circuit;
use crate::error::{EvaluationWarning, ServiceError};
use crate::sim::{
    cycle_error, delayed_pass, immediate_pass, DependencyGraph, Netlist, PassContext, RealTime,
    TimeProvider,
};

pub use clock::{ClockCycleContext, ClockCycleResult};
pub use config::{ServiceConfig, Strategy};

/// Measurements of one service call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceInfo {
    /// Wall-clock time of the call, in milliseconds
    pub evaluation_time_ms: f64,
    /// Number of gates, counting the internals of custom gates
    pub gate_count: usize,
    /// Number of wires
    pub wire_count: usize,
    /// Number of passes run
    pub passes: usize,
    /// Whether the last pass changed any output
    pub has_changes: bool,
}

/// Successful outcome of a service call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    /// Updated circuit
    pub circuit: Circuit,
    /// Strategy that produced the circuit
    pub strategy_used: Strategy,
    /// Measurements
    pub performance_info: PerformanceInfo,
    /// Problems that did not prevent the evaluation
    pub warnings: Vec<EvaluationWarning>,
}

/// Statistics accumulated over the lifetime of a service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    /// Number of successful calls
    pub calls: usize,
    /// Number of passes run
    pub passes: usize,
    /// Total wall-clock time of successful calls, in milliseconds
    pub total_time_ms: f64,
    /// Strategy of the last successful call
    pub last_strategy: Option<Strategy>,
}

impl PerformanceStats {
    /// Average time of a call, in milliseconds
    pub fn average_time_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_time_ms / self.calls as f64
        }
    }

    fn record(&mut self, strategy: Strategy, info: &PerformanceInfo) {
        self.calls += 1;
        self.passes += info.passes;
        self.total_time_ms += info.evaluation_time_ms;
        self.last_strategy = Some(strategy);
    }
}

/// Evaluation service for one session
///
/// Each session owns its service; nothing is shared between services.
pub struct EvaluationService {
    config: ServiceConfig,
    time: Box<dyn TimeProvider>,
    stats: PerformanceStats,
}

impl Default for EvaluationService {
    fn default() -> Self {
        EvaluationService::new(ServiceConfig::default())
    }
}

/// State of one service call
struct Call {
    start: Instant,
    net: Netlist,
    ctx: PassContext,
    passes: usize,
}

impl EvaluationService {
    /// Create a service reading the wall-clock time
    pub fn new(config: ServiceConfig) -> EvaluationService {
        Self::with_time(config, RealTime)
    }

    /// Create a service with the given source of time
    pub fn with_time<T: TimeProvider + 'static>(config: ServiceConfig, time: T) -> EvaluationService {
        EvaluationService {
            config,
            time: Box::new(time),
            stats: PerformanceStats::default(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Statistics accumulated since the creation of the service
    pub fn stats(&self) -> &PerformanceStats {
        &self.stats
    }

    /// Analyze the structure of a circuit without evaluating it
    pub fn analyze_complexity(&self, circuit: &Circuit) -> CircuitComplexity {
        analyze_complexity(circuit)
    }

    /// Evaluate a circuit with one pass of the configured strategy
    ///
    /// In automatic mode, circuits with a combinational cycle are evaluated in delayed mode.
    pub fn evaluate(&mut self, circuit: &Circuit) -> Result<ServiceResponse, ServiceError> {
        let mut call = self.start(circuit)?;
        let schedule = DependencyGraph::from_netlist(&call.net).schedule();
        let strategy = match self.config.strategy {
            Strategy::Auto if schedule.is_ok() => Strategy::Immediate,
            Strategy::Auto => Strategy::Delayed,
            s => s,
        };
        debug!(
            "Evaluating {} gates with the {} strategy",
            call.net.nb_nodes(),
            strategy
        );
        let changed = match (strategy, schedule) {
            (Strategy::Delayed, _) => delayed_pass(&mut call.net, &mut call.ctx),
            (_, Ok(schedule)) => immediate_pass(&mut call.net, &schedule, &mut call.ctx),
            (_, Err(cycle)) => {
                return Err(ServiceError::StrategyFailed {
                    strategy: strategy.to_string(),
                    errors: vec![cycle_error(&call.net, &cycle)],
                });
            }
        };
        call.passes = 1;
        self.finish(circuit, call, strategy, changed)
    }

    /// Evaluate one delayed pass, to animate a circuit step by step
    pub fn step(&mut self, circuit: &Circuit) -> Result<ServiceResponse, ServiceError> {
        let mut call = self.start(circuit)?;
        let changed = delayed_pass(&mut call.net, &mut call.ctx);
        call.passes = 1;
        self.finish(circuit, call, Strategy::Delayed, changed)
    }

    /// Evaluate delayed passes until no output changes
    ///
    /// All passes run at the same instant. Fails if the circuit is still changing after the
    /// configured number of passes.
    pub fn settle(&mut self, circuit: &Circuit) -> Result<ServiceResponse, ServiceError> {
        let mut call = self.start(circuit)?;
        let max_iterations = self.config.max_settle_iterations;
        if !self.run_until_stable(&mut call, max_iterations)? {
            warn!("Circuit did not settle after {} passes", max_iterations);
            return Err(ServiceError::OscillationDetected {
                iterations: max_iterations,
            });
        }
        self.finish(circuit, call, Strategy::Delayed, false)
    }

    /// Check the circuit and prepare a call
    fn start(&self, circuit: &Circuit) -> Result<Call, ServiceError> {
        let start = Instant::now();
        let net = Netlist::build(circuit, &self.config.limits()).map_err(|errors| {
            warn!("Rejected circuit with {} structural errors", errors.len());
            ServiceError::CircuitInvalid { errors }
        })?;
        let size = net.expanded_size();
        if size > self.config.max_gates {
            return Err(ServiceError::MemoryLimitExceeded {
                gates: size,
                limit: self.config.max_gates,
            });
        }
        let ctx = PassContext::new(
            self.time.current_time(),
            self.config.max_settle_iterations,
        );
        Ok(Call {
            start,
            net,
            ctx,
            passes: 0,
        })
    }

    /// Run delayed passes until the outputs are stable, returning whether they are
    fn run_until_stable(&self, call: &mut Call, max_iterations: usize) -> Result<bool, ServiceError> {
        for _ in 0..max_iterations {
            call.passes += 1;
            if !delayed_pass(&mut call.net, &mut call.ctx) {
                return Ok(true);
            }
            self.check_timeout(call)?;
        }
        Ok(false)
    }

    fn check_timeout(&self, call: &Call) -> Result<(), ServiceError> {
        let elapsed_ms = call.start.elapsed().as_millis() as u64;
        if elapsed_ms > self.config.timeout_ms {
            return Err(ServiceError::SimulationTimeout {
                elapsed_ms,
                limit_ms: self.config.timeout_ms,
            });
        }
        Ok(())
    }

    /// Write the results back and record the statistics
    fn finish(
        &mut self,
        circuit: &Circuit,
        call: Call,
        strategy: Strategy,
        has_changes: bool,
    ) -> Result<ServiceResponse, ServiceError> {
        self.check_timeout(&call)?;
        let mut ret = circuit.clone();
        call.net.write_back(&mut ret);
        let info = PerformanceInfo {
            evaluation_time_ms: call.start.elapsed().as_secs_f64() * 1000.0,
            gate_count: call.net.expanded_size(),
            wire_count: circuit.nb_wires(),
            passes: call.passes,
            has_changes,
        };
        self.stats.record(strategy, &info);
        info!(
            "{} evaluation: {} passes in {:.3}ms, {} warnings",
            strategy,
            info.passes,
            info.evaluation_time_ms,
            call.ctx.warnings.len()
        );
        Ok(ServiceResponse {
            circuit: ret,
            strategy_used: strategy,
            performance_info: info,
            warnings: call.ctx.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::generators::{basic, sequential};
    use crate::circuit::{Gate, GateKind};
    use crate::error::ServiceErrorKind;
    use crate::sim::{FixedTime, SteppedTime};

    fn service(config: ServiceConfig) -> EvaluationService {
        EvaluationService::with_time(config, FixedTime(1000))
    }

    #[test]
    fn test_auto_strategy() {
        let mut s = service(ServiceConfig::default());
        let r = s.evaluate(&basic::half_adder(true, false)).unwrap();
        assert_eq!(r.strategy_used, Strategy::Immediate);
        assert_eq!(r.circuit.output_of("SUM"), Some(true));
        assert_eq!(r.circuit.output_of("CARRY"), Some(false));
        assert_eq!(r.performance_info.passes, 1);
        assert_eq!(r.performance_info.gate_count, 6);

        let r = s.evaluate(&sequential::ring_oscillator(3)).unwrap();
        assert_eq!(r.strategy_used, Strategy::Delayed);
        assert!(r.performance_info.has_changes);

        assert_eq!(s.stats().calls, 2);
        assert_eq!(s.stats().last_strategy, Some(Strategy::Delayed));
        assert!(s.stats().average_time_ms() >= 0.0);
    }

    #[test]
    fn test_forced_strategy() {
        let config = ServiceConfig {
            strategy: Strategy::Immediate,
            ..ServiceConfig::default()
        };
        let mut s = service(config);
        let e = s.evaluate(&sequential::ring_oscillator(3)).unwrap_err();
        assert_eq!(e.kind(), ServiceErrorKind::StrategyFailed);
        assert_eq!(s.stats().calls, 0);
    }

    #[test]
    fn test_invalid() {
        let mut c = basic::half_adder(true, true);
        c.add(Gate::new("A", GateKind::Not));
        let mut s = service(ServiceConfig::default());
        let e = s.evaluate(&c).unwrap_err();
        assert_eq!(e.kind(), ServiceErrorKind::CircuitInvalid);
        assert!(!e.recovery_hint().is_empty());
    }

    #[test]
    fn test_memory_limit() {
        let config = ServiceConfig {
            max_gates: 4,
            ..ServiceConfig::default()
        };
        let mut s = service(config);
        let e = s.evaluate(&basic::half_adder(true, true)).unwrap_err();
        assert_eq!(
            e,
            ServiceError::MemoryLimitExceeded {
                gates: 6,
                limit: 4
            }
        );
    }

    #[test]
    fn test_settle() {
        let mut s = service(ServiceConfig::default());
        let r = s.settle(&sequential::nor_latch(true, false)).unwrap();
        assert_eq!(r.circuit.output_of("N1"), Some(true));
        assert_eq!(r.circuit.output_of("N2"), Some(false));
        assert!(!r.performance_info.has_changes);

        // Holds once S is released
        let mut c = r.circuit;
        c.set_input("S", false);
        let r = s.settle(&c).unwrap();
        assert_eq!(r.circuit.output_of("N1"), Some(true));

        let e = s.settle(&sequential::ring_oscillator(3)).unwrap_err();
        assert_eq!(e, ServiceError::OscillationDetected { iterations: 50 });
    }

    #[test]
    fn test_step() {
        let mut s = EvaluationService::with_time(ServiceConfig::default(), SteppedTime::new(0, 10));
        let mut c = sequential::ring_oscillator(3);
        let mut seen = Vec::new();
        for _ in 0..12 {
            let r = s.step(&c).unwrap();
            c = r.circuit;
            seen.push(c.output_of("O"));
        }
        assert!(seen.contains(&Some(true)));
        assert!(seen.contains(&Some(false)));
        assert_eq!(s.stats().passes, 12);
    }
}
