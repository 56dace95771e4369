//! Circuit generators and templates

/// Small combinational circuits
pub mod basic {
    use crate::circuit::{Circuit, Gate, GateKind};

    /// A half adder with inputs `A`, `B`, gates `SUM` (Xor) and `CARRY` (And), outputs `S` and `C`
    pub fn half_adder(a: bool, b: bool) -> Circuit {
        let mut ret = Circuit::new();
        let a = ret.add(Gate::input("A", a));
        let b = ret.add(Gate::input("B", b));
        let sum = ret.add(Gate::new("SUM", GateKind::Xor));
        let carry = ret.add(Gate::new("CARRY", GateKind::And));
        let s = ret.add(Gate::new("S", GateKind::Output));
        let c = ret.add(Gate::new("C", GateKind::Output));
        ret.connect(&a, 0, &sum, 0);
        ret.connect(&b, 0, &sum, 1);
        ret.connect(&a, 0, &carry, 0);
        ret.connect(&b, 0, &carry, 1);
        ret.connect(&sum, 0, &s, 0);
        ret.connect(&carry, 0, &c, 0);
        ret
    }

    /// A 2-to-4 decoder with inputs `A` (low bit) and `B`, outputs `Y0` to `Y3`
    pub fn decoder_2to4(a: bool, b: bool) -> Circuit {
        let mut ret = Circuit::new();
        let a = ret.add(Gate::input("A", a));
        let b = ret.add(Gate::input("B", b));
        let na = ret.add(Gate::new("NA", GateKind::Not));
        let nb = ret.add(Gate::new("NB", GateKind::Not));
        ret.connect(&a, 0, &na, 0);
        ret.connect(&b, 0, &nb, 0);
        let selects = [(&na, &nb), (&a, &nb), (&na, &b), (&a, &b)];
        let mut ands = Vec::new();
        for (i, (x, y)) in selects.into_iter().enumerate() {
            let d = ret.add(Gate::new(format!("D{i}"), GateKind::And));
            ret.connect(x, 0, &d, 0);
            ret.connect(y, 0, &d, 1);
            ands.push(d);
        }
        for (i, d) in ands.iter().enumerate() {
            let y = ret.add(Gate::new(format!("Y{i}"), GateKind::Output));
            ret.connect(d, 0, &y, 0);
        }
        ret
    }
}

/// Circuits with memory or feedback
pub mod sequential {
    use crate::circuit::{Circuit, Gate, GateKind};

    /// A ring of Not gates `N0` to `N{len-1}`, observed by output `O`
    ///
    /// With an odd length, the ring oscillates in delayed evaluation.
    pub fn ring_oscillator(len: usize) -> Circuit {
        assert!(len > 0);
        let mut ret = Circuit::new();
        let nots: Vec<_> = (0..len)
            .map(|i| ret.add(Gate::new(format!("N{i}"), GateKind::Not)))
            .collect();
        for i in 0..len {
            ret.connect(&nots[i], 0, &nots[(i + 1) % len], 0);
        }
        let o = ret.add(Gate::new("O", GateKind::Output));
        ret.connect(&nots[0], 0, &o, 0);
        ret
    }

    /// A set-reset latch gate `L` with inputs `S`, `R` and outputs `Q`, `QN`
    pub fn sr_latch(s: bool, r: bool) -> Circuit {
        let mut ret = Circuit::new();
        let s = ret.add(Gate::input("S", s));
        let r = ret.add(Gate::input("R", r));
        let l = ret.add(Gate::new("L", GateKind::SrLatch));
        let q = ret.add(Gate::new("Q", GateKind::Output));
        let qn = ret.add(Gate::new("QN", GateKind::Output));
        ret.connect(&s, 0, &l, 0);
        ret.connect(&r, 0, &l, 1);
        ret.connect(&l, 0, &q, 0);
        ret.connect(&l, 1, &qn, 0);
        ret
    }

    /// A latch made of two cross-coupled Nor gates `N1` (Q) and `N2` (!Q), with inputs `S`, `R`
    pub fn nor_latch(s: bool, r: bool) -> Circuit {
        let mut ret = Circuit::new();
        let s = ret.add(Gate::input("S", s));
        let r = ret.add(Gate::input("R", r));
        let n1 = ret.add(Gate::new("N1", GateKind::Nor));
        let n2 = ret.add(Gate::new("N2", GateKind::Nor));
        ret.connect(&r, 0, &n1, 0);
        ret.connect(&n2, 0, &n1, 1);
        ret.connect(&s, 0, &n2, 0);
        ret.connect(&n1, 0, &n2, 1);
        ret
    }

    /// A D flip-flop `FF` clocked by `CLK`, whose D input is its inverted output through `INV`
    ///
    /// Q toggles on every rising edge and is observed by output `Q`.
    pub fn toggle_flip_flop(frequency: f64) -> Circuit {
        let mut ret = Circuit::new();
        let clk = ret.add(Gate::clock("CLK", frequency));
        let ff = ret.add(Gate::new("FF", GateKind::DFlipFlop));
        let inv = ret.add(Gate::new("INV", GateKind::Not));
        let q = ret.add(Gate::new("Q", GateKind::Output));
        ret.connect(&ff, 0, &inv, 0);
        ret.connect(&inv, 0, &ff, 0);
        ret.connect(&clk, 0, &ff, 1);
        ret.connect(&ff, 0, &q, 0);
        ret
    }
}

/// Random circuits, to compare evaluation methods
pub mod random {
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use crate::circuit::{Circuit, Gate, GateId, GateKind};

    const KINDS: [GateKind; 7] = [
        GateKind::And,
        GateKind::Or,
        GateKind::Xor,
        GateKind::Nand,
        GateKind::Nor,
        GateKind::Not,
        GateKind::Mux,
    ];

    const SEQUENTIAL_KINDS: [GateKind; 2] = [GateKind::DFlipFlop, GateKind::SrLatch];

    /// A random acyclic circuit with inputs `i{k}`, gates `g{k}` and output `o`
    ///
    /// Each gate reads earlier inputs and gates; the output observes the last gate. Gates are
    /// stored in shuffled order.
    pub fn random_acyclic(nb_inputs: usize, nb_gates: usize, seed: u64) -> Circuit {
        generate(nb_inputs, nb_gates, seed, &KINDS, false)
    }

    /// A random acyclic circuit that also contains flip-flops, latches and a clock `clk`
    ///
    /// The clock runs at 1Hz from time 0, so it is high during odd seconds. Flip-flops and
    /// latches start cleared, and are read from either of their outputs.
    pub fn random_sequential(nb_inputs: usize, nb_gates: usize, seed: u64) -> Circuit {
        let kinds: Vec<GateKind> = KINDS.iter().chain(&SEQUENTIAL_KINDS).copied().collect();
        generate(nb_inputs, nb_gates, seed, &kinds, true)
    }

    fn generate(
        nb_inputs: usize,
        nb_gates: usize,
        seed: u64,
        kinds: &[GateKind],
        clocked: bool,
    ) -> Circuit {
        assert!(nb_inputs > 0);
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut gates = Vec::new();
        let mut wires = Vec::new();
        let mut signals: Vec<(GateId, usize)> = Vec::new();
        for i in 0..nb_inputs {
            let g = Gate::input(format!("i{i}"), rng.gen());
            signals.push((g.id.clone(), 1));
            gates.push(g);
        }
        if clocked {
            let mut g = Gate::clock("clk", 1.0);
            g.metadata.start_time = Some(0);
            signals.push((g.id.clone(), 1));
            gates.push(g);
        }
        for i in 0..nb_gates {
            let kind = kinds[rng.gen_range(0..kinds.len())];
            let g = Gate::new(format!("g{i}"), kind);
            for pin in 0..kind.default_inputs() {
                let (from, nb_outputs) = &signals[rng.gen_range(0..signals.len())];
                let from_pin = rng.gen_range(0..*nb_outputs);
                wires.push((from.clone(), from_pin, g.id.clone(), pin));
            }
            signals.push((g.id.clone(), kind.default_outputs()));
            gates.push(g);
        }
        let o = Gate::new("o", GateKind::Output);
        if let Some((last, _)) = signals.last() {
            wires.push((last.clone(), 0, o.id.clone(), 0));
        }
        gates.push(o);
        gates.shuffle(&mut rng);

        let mut ret = Circuit::new();
        for g in gates {
            ret.add(g);
        }
        for (from, from_pin, to, pin) in wires {
            ret.connect(&from, from_pin, &to, pin);
        }
        ret
    }
}
