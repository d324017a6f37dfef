//! Numerical utilities: SVD least squares and Levenberg–Marquardt.

pub mod linalg;
pub mod lm;

pub use linalg::*;
pub use lm::*;
