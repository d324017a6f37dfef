//! Model fitting engines.
//!
//! Responsibilities:
//!
//! - RAR: one bounded fit of the global acceleration scale `g0` (`rar`)
//! - Burkert: one unconstrained fit of `(rho0, r0)` per galaxy (`halo`)
//! - independent per-galaxy fits over a whole dataset, in parallel (`batch`)

pub mod batch;
pub mod halo;
pub mod rar;
mod summary;

pub use batch::*;
pub use halo::*;
pub use rar::*;
