use std::fmt;

use itertools::Itertools;
use log::warn;
use volute::Lut;

use crate::circuit::{codec, CustomGateDefinition, GateKind, PinDescriptor};
use crate::sim::element::{Element, GateFault};
use crate::sim::evaluator::{delayed_pass, immediate_pass, PassContext};
use crate::sim::graph::{DependencyGraph, Schedule};
use crate::sim::netlist::{Limits, Netlist};

/// Largest truth table accepted, in number of inputs
const MAX_TABLE_INPUTS: usize = 16;

/// How an external input reaches the internal circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputBinding {
    /// Sets the value of an internal input gate
    Latch(usize),
    /// Sets an input pin of an internal gate
    Pin(usize, usize),
}

/// Where an external output is read in the internal circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputTap {
    /// Value seen by an internal output gate
    OutputGate(usize),
    /// Output pin of an internal gate
    Output(usize, usize),
    /// Input pin of an internal gate
    InputPin(usize, usize),
}

/// Custom gate implemented by an internal circuit
#[derive(Debug, Clone)]
pub struct SubCircuit {
    name: String,
    template: Netlist,
    schedule: Option<Schedule>,
    inputs: Vec<InputBinding>,
    outputs: Vec<OutputTap>,
}

/// Custom gate implemented by a truth table, one Lut per output
#[derive(Clone)]
pub struct TruthTable {
    name: String,
    nb_inputs: usize,
    luts: Vec<Lut>,
    skipped: Vec<String>,
}

impl fmt::Debug for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TruthTable")
            .field("name", &self.name)
            .field("nb_inputs", &self.nb_inputs)
            .field("luts", &self.luts.iter().map(|l| l.to_string()).collect::<Vec<_>>())
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// Compiled behaviour of a custom gate
///
/// Built once per gate from its definition, and shared by its evaluations.
#[derive(Debug, Clone)]
pub enum Expansion {
    /// Internal circuit, evaluated in full for each evaluation of the gate
    Circuit(SubCircuit),
    /// Explicit truth table
    Table(TruthTable),
}

impl SubCircuit {
    /// Internal circuit, in the state used at the start of each evaluation
    pub fn template(&self) -> &Netlist {
        &self.template
    }

    /// Returns whether the internal circuit is evaluated in a single ordered pass
    pub fn is_ordered(&self) -> bool {
        self.schedule.is_some()
    }

    fn evaluate(&self, inputs: &[bool], ctx: &mut PassContext) -> Result<Vec<bool>, GateFault> {
        check_arity(inputs, self.inputs.len())?;
        let mut net = self.template.clone();
        for (binding, v) in self.inputs.iter().zip(inputs) {
            match *binding {
                InputBinding::Latch(i) => {
                    let node = net.node_mut(i);
                    node.element = Element::Input { value: *v };
                    node.outputs[0] = *v;
                }
                InputBinding::Pin(i, p) => net.node_mut(i).inputs[p] = *v,
            }
        }

        let mut inner = PassContext::new(ctx.now, ctx.max_settle_iterations);
        match &self.schedule {
            Some(schedule) => {
                immediate_pass(&mut net, schedule, &mut inner);
            }
            None => {
                // Feedback inside the gate: iterate until the internal state is stable
                let settled =
                    (0..ctx.max_settle_iterations).any(|_| !delayed_pass(&mut net, &mut inner));
                if !settled {
                    return Err(GateFault::Custom {
                        name: self.name.clone(),
                        message: format!(
                            "internal circuit did not settle within {} passes",
                            ctx.max_settle_iterations
                        ),
                    });
                }
            }
        }
        for w in inner.warnings {
            ctx.note(format!("in {}, {}", self.name, w));
        }

        let read = |v: Option<&bool>| v.copied().unwrap_or(false);
        Ok(self
            .outputs
            .iter()
            .map(|tap| match *tap {
                OutputTap::OutputGate(i) => read(net.node(i).inputs.first()),
                OutputTap::Output(i, p) => read(net.node(i).outputs.get(p)),
                OutputTap::InputPin(i, p) => read(net.node(i).inputs.get(p)),
            })
            .collect())
    }
}

impl TruthTable {
    /// Rows of the definition that were ignored, with the reason
    pub fn skipped_rows(&self) -> &[String] {
        &self.skipped
    }

    fn evaluate(&self, inputs: &[bool], ctx: &mut PassContext) -> Result<Vec<bool>, GateFault> {
        check_arity(inputs, self.nb_inputs)?;
        for reason in &self.skipped {
            ctx.note(format!("in {}, {}", self.name, reason));
        }
        let mask = pattern_mask(inputs);
        Ok(self.luts.iter().map(|lut| lut.value(mask)).collect())
    }
}

/// Bit i of the mask is input i
fn pattern_mask(values: &[bool]) -> usize {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v)
        .fold(0, |m, (i, _)| m | (1 << i))
}

fn check_arity(inputs: &[bool], expected: usize) -> Result<(), GateFault> {
    if inputs.len() != expected {
        return Err(GateFault::Arity {
            kind: GateKind::Custom,
            expected,
            got: inputs.len(),
        });
    }
    Ok(())
}

/// Compiles and evaluates custom gates
pub struct CustomGateExpander;

impl CustomGateExpander {
    /// Compile a definition at the given nesting depth
    ///
    /// The internal circuit takes precedence over the truth table. Errors are described as text,
    /// and make the gate invalid.
    pub fn compile(
        def: &CustomGateDefinition,
        limits: &Limits,
        depth: usize,
    ) -> Result<Expansion, String> {
        if depth > limits.max_custom_depth {
            return Err(format!(
                "custom gates nested deeper than {}",
                limits.max_custom_depth
            ));
        }
        if let Some(circuit) = &def.internal_circuit {
            let template = Netlist::build_scoped(circuit, limits, depth).map_err(|errors| {
                format!(
                    "invalid internal circuit in {}: {}",
                    def.name,
                    errors.iter().join("; ")
                )
            })?;
            Self::compile_circuit(def, template).map(Expansion::Circuit)
        } else if def.truth_table.is_some() {
            Self::compile_table(def).map(Expansion::Table)
        } else {
            Err(format!(
                "{} has neither an internal circuit nor a truth table",
                def.name
            ))
        }
    }

    fn compile_circuit(def: &CustomGateDefinition, template: Netlist) -> Result<SubCircuit, String> {
        let lookup = |pin: &PinDescriptor| -> Result<usize, String> {
            let id = pin
                .gate_id
                .as_ref()
                .ok_or_else(|| format!("pin {} of {} is not bound", pin.name, def.name))?;
            template
                .index_of(id.as_str())
                .ok_or_else(|| format!("pin {} of {} is bound to unknown gate {}", pin.name, def.name, id))
        };
        let out_of_range = |pin: &PinDescriptor| {
            format!(
                "pin {} of {} is bound to missing pin {}",
                pin.name, def.name, pin.pin_index
            )
        };

        let mut inputs = Vec::new();
        for pin in &def.inputs {
            let i = lookup(pin)?;
            let node = template.node(i);
            if matches!(node.element, Element::Input { .. }) {
                inputs.push(InputBinding::Latch(i));
            } else {
                let p = pin.pin_index.max(0) as usize;
                if p >= node.inputs.len() {
                    return Err(out_of_range(pin));
                }
                inputs.push(InputBinding::Pin(i, p));
            }
        }

        let mut outputs = Vec::new();
        for pin in &def.outputs {
            let i = lookup(pin)?;
            let node = template.node(i);
            let tap = if node.element.kind() == GateKind::Output {
                OutputTap::OutputGate(i)
            } else if pin.pin_index < 0 {
                let p = (-(pin.pin_index as i64) - 1) as usize;
                if p >= node.outputs.len() {
                    return Err(out_of_range(pin));
                }
                OutputTap::Output(i, p)
            } else {
                let p = pin.pin_index as usize;
                if p >= node.inputs.len() {
                    return Err(out_of_range(pin));
                }
                OutputTap::InputPin(i, p)
            };
            outputs.push(tap);
        }

        let schedule = DependencyGraph::from_netlist(&template).schedule().ok();
        Ok(SubCircuit {
            name: def.name.clone(),
            template,
            schedule,
            inputs,
            outputs,
        })
    }

    fn compile_table(def: &CustomGateDefinition) -> Result<TruthTable, String> {
        let nb_inputs = def.inputs.len();
        let nb_outputs = def.outputs.len();
        if nb_inputs > MAX_TABLE_INPUTS {
            return Err(format!(
                "truth table of {} has {} inputs, at most {} are supported",
                def.name, nb_inputs, MAX_TABLE_INPUTS
            ));
        }
        let mut luts = vec![Lut::zero(nb_inputs); nb_outputs];
        let mut skipped = Vec::new();
        for (ins, outs) in def.truth_table.iter().flatten() {
            let Some(pattern) = codec::decode_pattern(ins).filter(|p| p.len() == nb_inputs) else {
                skipped.push(format!("ignored row with invalid input pattern {ins:?}"));
                continue;
            };
            let Some(values) = codec::decode_pattern(outs).filter(|p| p.len() == nb_outputs) else {
                skipped.push(format!("ignored row with invalid output pattern {outs:?}"));
                continue;
            };
            let mask = pattern_mask(&pattern);
            for (lut, v) in luts.iter_mut().zip(values) {
                lut.set_value(mask, v);
            }
        }
        for reason in &skipped {
            warn!("Truth table of {}: {}", def.name, reason);
        }
        Ok(TruthTable {
            name: def.name.clone(),
            nb_inputs,
            luts,
            skipped,
        })
    }

    /// Evaluate a compiled custom gate
    pub fn evaluate(
        expansion: &Expansion,
        inputs: &[bool],
        ctx: &mut PassContext,
    ) -> Result<Vec<bool>, GateFault> {
        match expansion {
            Expansion::Circuit(sub) => sub.evaluate(inputs, ctx),
            Expansion::Table(table) => table.evaluate(inputs, ctx),
        }
    }

    /// Compile and evaluate a definition on its own
    pub fn evaluate_definition(
        def: &CustomGateDefinition,
        inputs: &[bool],
        now: u64,
    ) -> Result<Vec<bool>, GateFault> {
        let limits = Limits::default();
        let expansion = Self::compile(def, &limits, 1).map_err(|message| {
            warn!("Custom gate {} cannot be compiled: {}", def.name, message);
            GateFault::Custom {
                name: def.name.clone(),
                message,
            }
        })?;
        let mut ctx = PassContext::new(now, 50);
        Self::evaluate(&expansion, inputs, &mut ctx)
    }
}

impl Expansion {
    /// Name of the definition
    pub fn name(&self) -> &str {
        match self {
            Expansion::Circuit(sub) => &sub.name,
            Expansion::Table(table) => &table.name,
        }
    }

    /// Number of internal nodes, recursively
    pub fn expanded_size(&self) -> usize {
        match self {
            Expansion::Circuit(sub) => sub.template.expanded_size(),
            Expansion::Table(_) => 0,
        }
    }
}
