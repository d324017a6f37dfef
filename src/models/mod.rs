//! Physical model implementations.
//!
//! Models are implemented as small, pure functions so that the fit engines
//! can stay focused on data selection, weighting and solver configuration.

pub mod burkert;
pub mod rar;

pub use burkert::*;
pub use rar::*;
