//! Input/output helpers.
//!
//! - catalog CSV ingest + normalization (`ingest`)
//! - normalized dataset export to CSV (`export`)
//! - fit report JSON read/write (`results`)

pub mod export;
pub mod ingest;
pub mod results;

pub use export::*;
pub use ingest::*;
pub use results::*;
