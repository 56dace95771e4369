//! Representation of circuits, as exchanged with editors and storage

#[allow(clippy::module_inception)]
mod circuit;
pub mod codec;
mod custom;
mod gate;
pub mod generators;
pub mod stats;
mod wire;

pub use circuit::Circuit;
pub use custom::{CustomGateDefinition, PinDescriptor};
pub use gate::{Gate, GateId, GateKind, GateMetadata, Position};
pub use wire::{Endpoint, Wire};
