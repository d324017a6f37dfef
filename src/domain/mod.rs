//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - physical constants and unit conversions (`units`)
//! - raw and derived rotation-curve observations (`GalaxyRecord`, `DerivedRecord`)
//! - the immutable, galaxy-indexed `Dataset`
//! - fit outputs (`FitResult`, `FitQuality`, etc.) and run configuration

pub mod dataset;
pub mod types;
pub mod units;

pub use dataset::*;
pub use types::*;
pub use units::*;
