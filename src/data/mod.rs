//! Data sources other than a user-supplied catalog.

pub mod synthetic;

pub use synthetic::*;
