use log::debug;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, GateId};
use crate::error::{EvaluationError, EvaluationWarning, ServiceError};
use crate::service::{EvaluationService, PerformanceInfo, Strategy};
use crate::sim::Element;

/// Parameters of a clock cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockCycleContext {
    /// Clock gate to drive
    pub clock_id: GateId,
    /// Bound on delayed passes after each clock transition
    pub max_iterations: usize,
}

impl ClockCycleContext {
    /// Drive the given clock, with the usual iteration bound
    pub fn new(clock_id: impl Into<GateId>) -> ClockCycleContext {
        ClockCycleContext {
            clock_id: clock_id.into(),
            max_iterations: 50,
        }
    }
}

/// Outcome of a clock cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockCycleResult {
    /// Circuit after the cycle, with the clock low
    pub circuit: Circuit,
    /// Whether the output of any D flip-flop changed
    pub flip_flops_changed: bool,
    /// Measurements
    pub performance_info: PerformanceInfo,
    /// Problems that did not prevent the evaluation
    pub warnings: Vec<EvaluationWarning>,
}

impl EvaluationService {
    /// Drive a clock low, high, then low again, letting the circuit settle after each transition
    ///
    /// The clock output is forced, so the cycle does not depend on time. Each transition is
    /// followed by delayed passes until no output changes, or until the iteration bound; a
    /// circuit still changing at the bound is reported as a warning.
    pub fn execute_clock_cycle(
        &mut self,
        circuit: &Circuit,
        cycle: &ClockCycleContext,
    ) -> Result<ClockCycleResult, ServiceError> {
        let mut call = self.start(circuit)?;
        let net = &call.net;
        let clk = net
            .index_of(cycle.clock_id.as_str())
            .filter(|i| matches!(net.node(*i).element, Element::Clock(_)))
            .ok_or_else(|| ServiceError::CircuitInvalid {
                errors: vec![EvaluationError::invalid_gate(
                    &cycle.clock_id,
                    "no clock gate with this id",
                )],
            })?;
        let flip_flops: Vec<usize> = (0..net.nb_nodes())
            .filter(|i| matches!(net.node(*i).element, Element::DFlipFlop(_)))
            .collect();
        let before: Vec<Vec<bool>> = flip_flops
            .iter()
            .map(|i| net.node(*i).outputs.clone())
            .collect();

        for level in [false, true, false] {
            call.net.force_output(clk, Some(level));
            if !self.run_until_stable(&mut call, cycle.max_iterations)? {
                debug!(
                    "Clock {} at level {}: still changing after {} passes",
                    cycle.clock_id, level as u8, cycle.max_iterations
                );
                call.ctx.warnings.push(EvaluationWarning::circuit(format!(
                    "circuit still changing after {} passes with {} {}",
                    cycle.max_iterations,
                    cycle.clock_id,
                    if level { "high" } else { "low" }
                )));
            }
        }
        call.net.force_output(clk, None);

        let changed = flip_flops
            .iter()
            .zip(before.iter())
            .any(|(i, b)| call.net.node(*i).outputs != *b);
        debug!(
            "Clock cycle on {}: {} passes, flip-flops changed: {}",
            cycle.clock_id, call.passes, changed
        );
        let response = self.finish(circuit, call, Strategy::Delayed, false)?;
        Ok(ClockCycleResult {
            circuit: response.circuit,
            flip_flops_changed: changed,
            performance_info: response.performance_info,
            warnings: response.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::generators::{basic, sequential};
    use crate::circuit::{Gate, GateKind};
    use crate::error::ServiceErrorKind;
    use crate::service::ServiceConfig;
    use crate::sim::FixedTime;

    #[test]
    fn test_toggle() {
        let mut s = EvaluationService::with_time(ServiceConfig::default(), FixedTime(0));
        let ctx = ClockCycleContext::new("CLK");
        let mut c = sequential::toggle_flip_flop(1.0);
        let mut values = Vec::new();
        for _ in 0..4 {
            let r = s.execute_clock_cycle(&c, &ctx).unwrap();
            assert!(r.flip_flops_changed);
            c = r.circuit;
            values.push(c.output_of("Q"));
            assert_eq!(c.output_of("CLK"), Some(false));
        }
        assert_eq!(
            values,
            vec![Some(true), Some(false), Some(true), Some(false)]
        );
        let meta = &c.gate("FF").unwrap().metadata;
        assert_eq!(meta.q_output, Some(false));
        assert_eq!(meta.previous_clock_state, Some(false));
    }

    #[test]
    fn test_capture() {
        // D held low: the first cycle does not change the flip-flop
        let mut c = sequential::toggle_flip_flop(1.0);
        c.wires.retain(|w| w.to.gate_id.as_str() != "FF" || w.to.pin_index != 0);
        let mut s = EvaluationService::with_time(ServiceConfig::default(), FixedTime(0));
        let r = s.execute_clock_cycle(&c, &ClockCycleContext::new("CLK")).unwrap();
        assert!(!r.flip_flops_changed);
        assert_eq!(r.circuit.output_of("FF"), Some(false));
    }

    #[test]
    fn test_free_running_loop() {
        // An oscillating ring next to the flip-flop does not prevent the cycle
        let mut c = sequential::toggle_flip_flop(1.0);
        let ring: Vec<GateId> = (0..3)
            .map(|i| c.add(Gate::new(format!("R{i}"), GateKind::Not)))
            .collect();
        for i in 0..3 {
            c.connect(&ring[i], 0, &ring[(i + 1) % 3], 0);
        }
        let mut s = EvaluationService::with_time(ServiceConfig::default(), FixedTime(0));
        let r = s
            .execute_clock_cycle(&c, &ClockCycleContext::new("CLK"))
            .unwrap();
        assert!(r.flip_flops_changed);
        assert_eq!(r.circuit.output_of("Q"), Some(true));
        assert_eq!(r.warnings.len(), 3);
        assert!(r.warnings.iter().all(|w| w.gate_id.is_none()));
        assert_eq!(r.performance_info.passes, 150);
    }

    #[test]
    fn test_not_a_clock() {
        let mut s = EvaluationService::default();
        let e = s
            .execute_clock_cycle(&basic::half_adder(true, true), &ClockCycleContext::new("A"))
            .unwrap_err();
        assert_eq!(e.kind(), ServiceErrorKind::CircuitInvalid);
    }
}
