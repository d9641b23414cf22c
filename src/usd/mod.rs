//! Composed stages.

mod mask;
mod stage;

pub use mask::PopulationMask;
pub use stage::{Stage, TimeCode, VariantSelectionGuard};
