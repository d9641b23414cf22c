//! `usd_export` extracts prims from a USD stage into a new, self-contained
//! layer.
//!
//! The selection is flattened out of its layer stack with the selected
//! variants folded in, copied under fresh names together with the prims it
//! references from elsewhere, re-centered around its combined bounds when
//! several prims are exported, and given back every variant set it had.
//!
//! # Modules
//!
//! - `sdf` - Scene Description Foundations: paths, values, specs and layers
//! - `usda` - Text format (.usda) reader and writer
//! - `usdz` - Archive format (.usdz) reader
//! - `composition` - Layer stacks (sublayers)
//! - `usd` - Composed stage: variants, population masks, flattening
//! - `geom` - Transforms and bounding boxes
//! - `export` - Prim extraction, and the save workflow around it
//! - `settings` - Persistent preferences
//! - `events` - Save and stage notifications

pub mod composition;
pub mod events;
pub mod export;
pub mod geom;
pub mod sdf;
pub mod settings;
pub mod usd;
pub mod usda;
pub mod usdz;

pub use half::f16;
