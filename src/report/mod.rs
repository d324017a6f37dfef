//! Reporting: RAR offsets, rankings, and the plain-text run summary.

pub mod format;

pub use format::*;
