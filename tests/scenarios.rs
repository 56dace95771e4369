//! End-to-end scenarios on reference circuits

use gatesim::circuit::generators::{basic, sequential};
use gatesim::circuit::{Circuit, CustomGateDefinition, Gate, GateKind, PinDescriptor};
use gatesim::error::ErrorKind;
use gatesim::service::{ClockCycleContext, EvaluationService, ServiceConfig};
use gatesim::sim::{evaluate_delayed, evaluate_immediate, CircuitEvaluator, FixedTime};

#[test]
fn test_half_adder() {
    let res = evaluate_immediate(&basic::half_adder(true, false), 0);
    assert!(res.errors.is_empty());
    assert_eq!(res.circuit.output_of("SUM"), Some(true));
    assert_eq!(res.circuit.output_of("CARRY"), Some(false));

    let res = evaluate_immediate(&basic::half_adder(true, true), 0);
    assert_eq!(res.circuit.output_of("SUM"), Some(false));
    assert_eq!(res.circuit.output_of("CARRY"), Some(true));
    assert_eq!(res.circuit.output_of("S"), Some(false));
    assert_eq!(res.circuit.output_of("C"), Some(true));
}

#[test]
fn test_decoder() {
    for (a, b) in [(false, false), (true, false), (false, true), (true, true)] {
        let res = evaluate_immediate(&basic::decoder_2to4(a, b), 0);
        let selected = a as usize + 2 * b as usize;
        for i in 0..4 {
            assert_eq!(
                res.circuit.output_of(&format!("Y{i}")),
                Some(i == selected),
                "A={a} B={b} Y{i}"
            );
        }
    }
}

#[test]
fn test_sr_latch_hold() {
    let res = evaluate_immediate(&sequential::sr_latch(true, false), 0);
    assert_eq!(res.circuit.output_of("L"), Some(true));
    assert_eq!(res.circuit.output_of("Q"), Some(true));
    assert_eq!(res.circuit.output_of("QN"), Some(false));

    let mut c = res.circuit;
    c.set_input("S", false);
    for _ in 0..3 {
        let res = evaluate_immediate(&c, 0);
        assert_eq!(res.circuit.output_of("Q"), Some(true));
        c = res.circuit;
    }
    assert_eq!(c.gate("L").unwrap().metadata.q_output, Some(true));
}

#[test]
fn test_sr_latch_forbidden() {
    let mut c = sequential::sr_latch(true, false);
    c = evaluate_immediate(&c, 0).circuit;
    c.set_input("R", true);
    let res = evaluate_immediate(&c, 0);
    assert_eq!(res.circuit.output_of("L"), Some(true));
    assert_eq!(res.warnings.len(), 1);
    assert_eq!(res.warnings[0].gate_id.as_ref().unwrap().as_str(), "L");
}

#[test]
fn test_clocked_flip_flop() {
    // D held high, clock at 1Hz: the flip-flop captures on the first rising edge
    let mut c = Circuit::new();
    let d = c.add(Gate::input("D", true));
    let clk = c.add(Gate::clock("CLK", 1.0));
    let ff = c.add(Gate::new("FF", GateKind::DFlipFlop));
    c.connect(&d, 0, &ff, 0);
    c.connect(&clk, 0, &ff, 1);

    let evaluator = CircuitEvaluator::new();
    c = evaluator.evaluate_immediate(&c, 0).circuit;
    assert_eq!(c.output_of("FF"), Some(false));
    c = evaluator.evaluate_immediate(&c, 1000).circuit;
    assert_eq!(c.output_of("CLK"), Some(true));
    assert_eq!(c.output_of("FF"), Some(true));
    let meta = &c.gate("FF").unwrap().metadata;
    assert_eq!(meta.previous_clock_state, Some(true));
    assert_eq!(meta.q_output, Some(true));
    assert!(c.wires.iter().all(|w| w.is_active));
}

#[test]
fn test_latch_after_inverter() {
    // One pass settles a latch fed through combinational logic
    let mut c = Circuit::new();
    let a = c.add(Gate::input("A", false));
    let r = c.add(Gate::input("R", false));
    let n = c.add(Gate::new("N", GateKind::Not));
    let l = c.add(Gate::new("L", GateKind::SrLatch));
    c.connect(&a, 0, &n, 0);
    c.connect(&n, 0, &l, 0);
    c.connect(&r, 0, &l, 1);

    let first = evaluate_immediate(&c, 0);
    assert_eq!(first.circuit.output_of("N"), Some(true));
    assert_eq!(first.circuit.output_of("L"), Some(true));
    let second = evaluate_immediate(&first.circuit, 0);
    assert_eq!(second.circuit, first.circuit);
}

#[test]
fn test_ring_oscillator() {
    let mut c = sequential::ring_oscillator(3);
    let res = evaluate_immediate(&c, 0);
    assert_eq!(res.errors.len(), 1);
    assert_eq!(res.errors[0].kind(), ErrorKind::CircularDependency);

    let mut seen = Vec::new();
    for _ in 0..10 {
        let res = evaluate_delayed(&c, 0);
        assert_eq!(res.has_changes, Some(true));
        c = res.circuit;
        seen.push(c.output_of("N0").unwrap());
    }
    assert!(seen.contains(&true));
    assert!(seen.contains(&false));
}

#[test]
fn test_determinism() {
    let evaluator = CircuitEvaluator::new();
    let c = sequential::toggle_flip_flop(4.0);
    let first = evaluator.evaluate_immediate(&c, 1000).circuit;
    let a = evaluator.evaluate_immediate(&first, 1000);
    let b = evaluator.evaluate_immediate(&first, 1000);
    assert_eq!(a, b);
    let json = a.circuit.to_json().unwrap();
    assert_eq!(Circuit::from_json(&json).unwrap(), a.circuit);
}

#[test]
fn test_clock_over_time() {
    let evaluator = CircuitEvaluator::new();
    let mut c = Circuit::new();
    c.add(Gate::clock("CLK", 2.0));
    let mut levels = Vec::new();
    for t in [0, 100, 250, 400, 500, 750, 1000] {
        c = evaluator.evaluate_immediate(&c, t).circuit;
        levels.push(c.output_of("CLK").unwrap());
    }
    // Level changes every 500ms, starting low at the first evaluation
    assert_eq!(levels, vec![false, false, false, false, true, true, false]);
    assert_eq!(c.gate("CLK").unwrap().metadata.start_time, Some(0));
}

fn half_adder_definition() -> CustomGateDefinition {
    let inner = basic::half_adder(false, false);
    CustomGateDefinition::from_circuit(
        "Half adder",
        vec![PinDescriptor::bound("A", "A"), PinDescriptor::bound("B", "B")],
        vec![
            PinDescriptor::bound("Sum", "S"),
            PinDescriptor::bound("Carry", "C"),
        ],
        inner,
    )
}

#[test]
fn test_custom_half_adder() {
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        let flat = evaluate_immediate(&basic::half_adder(a, b), 0).circuit;

        let mut c = Circuit::new();
        let ia = c.add(Gate::input("a", a));
        let ib = c.add(Gate::input("b", b));
        let ha = c.add(Gate::custom("ha", half_adder_definition()));
        let sum = c.add(Gate::new("sum", GateKind::Output));
        let carry = c.add(Gate::new("carry", GateKind::Output));
        c.connect(&ia, 0, &ha, 0);
        c.connect(&ib, 0, &ha, 1);
        c.connect(&ha, 0, &sum, 0);
        c.connect(&ha, 1, &carry, 0);

        let res = evaluate_immediate(&c, 0);
        assert!(res.errors.is_empty());
        assert!(res.warnings.is_empty());
        assert_eq!(res.circuit.output_of("sum"), flat.output_of("S"));
        assert_eq!(res.circuit.output_of("carry"), flat.output_of("C"));
    }
}

#[test]
fn test_custom_from_json() {
    let doc = r#"{
        "gates": [
            {"id": "a", "type": "INPUT", "position": {"x": 0, "y": 0}, "inputs": [], "outputs": ["1"]},
            {"id": "b", "type": "INPUT", "position": {"x": 0, "y": 50}, "inputs": [], "outputs": [true]},
            {"id": "t", "type": "CUSTOM", "position": {"x": 100, "y": 0}, "inputs": [false, false], "outputs": [false],
             "metadata": {"customGate": {
                "name": "AND from table",
                "inputs": [{"name": "X"}, {"name": "Y"}],
                "outputs": [{"name": "Z"}],
                "truthTable": {"11": "1"}
             }}}
        ],
        "wires": [
            {"id": "w1", "from": {"gateId": "a", "pinIndex": 0}, "to": {"gateId": "t", "pinIndex": 0}},
            {"id": "w2", "from": {"gateId": "b", "pinIndex": -1}, "to": {"gateId": "t", "pinIndex": 1}, "isActive": false}
        ]
    }"#;
    let c = Circuit::from_json(doc).unwrap();
    let res = evaluate_immediate(&c, 0);
    assert!(res.errors.is_empty());
    assert_eq!(res.circuit.output_of("t"), Some(true));
    assert!(res.circuit.wires.iter().all(|w| w.is_active));
}

#[test]
fn test_service_counter() {
    // Two toggle flip-flops, the second clocked by the inverted output of the first
    let mut c = sequential::toggle_flip_flop(1.0);
    let ff = c.add(Gate::new("FF2", GateKind::DFlipFlop));
    let inv = c.add(Gate::new("INV2", GateKind::Not));
    c.connect(&ff, 0, &inv, 0);
    c.connect(&inv, 0, &ff, 0);
    c.connect(&"INV".into(), 0, &ff, 1);

    let mut service = EvaluationService::with_time(ServiceConfig::default(), FixedTime(0));
    let ctx = ClockCycleContext::new("CLK");
    let mut counts = Vec::new();
    for _ in 0..4 {
        c = service.execute_clock_cycle(&c, &ctx).unwrap().circuit;
        let bit0 = c.output_of("FF").unwrap() as u8;
        let bit1 = c.output_of("FF2").unwrap() as u8;
        counts.push(bit0 + 2 * bit1);
    }
    // The second flip-flop toggles on each falling edge of the first one
    for w in counts.windows(2) {
        assert_eq!(w[1], (w[0] + 1) % 4);
    }
    assert_eq!(service.stats().calls, 4);
}
