//! Small dense linear-algebra helpers built on SVD.
//!
//! The Levenberg–Marquardt solver repeatedly solves tiny damped least-squares
//! systems (1–2 columns), and the fit engines need `(J^T J)^-1` for parameter
//! covariance. Both are done with SVD:
//!
//! - it handles tall systems (more rows than columns) robustly
//! - near-singular directions are dropped instead of blowing up
//!
//! Jacobian columns in this crate can differ by 40 orders of magnitude
//! (e.g. `d V / d rho0` vs `d V / d r0`), and nalgebra's SVD tolerance is
//! absolute, so callers pass column-scaled matrices.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Euclidean norm of each column.
pub fn column_norms(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(m.ncols(), m.column_iter().map(|c| c.norm()))
}

/// Parameter covariance `s^2 (J^T J)^+` from a Jacobian at the optimum.
///
/// `s^2 = sse / (n - p)` is the residual variance. Singular values below
/// `eps * max(n, p) * s_max` are discarded. Returns `None` when there are no
/// spare degrees of freedom or the result is not finite.
pub fn covariance_from_jacobian(jac: &DMatrix<f64>, sse: f64) -> Option<DMatrix<f64>> {
    let (n, p) = jac.shape();
    if n <= p {
        return None;
    }

    // Scale columns to unit norm so the SVD cutoff is meaningful.
    let scale = column_norms(jac).map(|c| if c > 0.0 { c } else { 1.0 });
    let mut js = jac.clone();
    for (j, mut col) in js.column_iter_mut().enumerate() {
        col /= scale[j];
    }

    let svd = js.svd(false, true);
    let v_t = svd.v_t?;
    let s_max = svd.singular_values.max();
    let cutoff = f64::EPSILON * n.max(p) as f64 * s_max;

    let mut inv = DMatrix::<f64>::zeros(p, p);
    for (k, &s) in svd.singular_values.iter().enumerate() {
        if s <= cutoff {
            continue;
        }
        let v = v_t.row(k).transpose();
        inv += (&v * v.transpose()) / (s * s);
    }

    let s2 = sse / (n - p) as f64;
    let mut cov = inv * s2;
    for i in 0..p {
        for j in 0..p {
            cov[(i, j)] /= scale[i] * scale[j];
        }
    }

    cov.iter().all(|v| v.is_finite()).then_some(cov)
}
