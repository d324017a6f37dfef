//! Burkert (cored) dark-matter halo rotation curve.
//!
//! `V^2(r) = 4 pi G rho0 r0^3 [ln(1 + x) - atan(x) + 0.5 ln(1 + x^2)] / r`, `x = r / r0`
//!
//! All quantities are SI: `r`, `r0` in metres, `rho0` in kg/m^3, `V` in m/s.
//!
//! Numerical notes:
//! - For small `x` the bracket cancels down to `2x^3/3`; we switch to the
//!   series below `SMALL_X` to avoid catastrophic cancellation.
//! - Parameters are unconstrained during fitting; negative `rho0` (or an `r0`
//!   with `x <= -1`) yields NaN, which the solver treats as a rejected step.

use std::f64::consts::PI;

use crate::domain::G_NEWTON;

/// Threshold below which we switch to the small-x series approximation.
const SMALL_X: f64 = 1e-3;

/// The bracketed shape term `ln(1+x) - atan(x) + 0.5 ln(1+x^2)`.
pub fn burkert_shape(x: f64) -> f64 {
    if x.abs() < SMALL_X {
        // Series: 2x^3/3 - x^4/2 + 2x^7/7
        let x3 = x * x * x;
        return x3 * (2.0 / 3.0 - x / 2.0 + 2.0 * x3 * x / 7.0);
    }
    x.ln_1p() - x.atan() + 0.5 * (x * x).ln_1p()
}

/// Squared halo circular velocity (m^2/s^2) at radius `r_m`.
pub fn burkert_velocity_sq(r_m: f64, rho0: f64, r0: f64) -> f64 {
    4.0 * PI * G_NEWTON * rho0 * r0.powi(3) * burkert_shape(r_m / r0) / r_m
}

/// Halo circular velocity (m/s) at radius `r_m`.
pub fn burkert_velocity(r_m: f64, rho0: f64, r0: f64) -> f64 {
    burkert_velocity_sq(r_m, rho0, r0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KPC_TO_M;

    #[test]
    fn shape_series_matches_closed_form_below_switch() {
        let x = 0.9 * SMALL_X;
        let closed = x.ln_1p() - x.atan() + 0.5 * (x * x).ln_1p();
        let series = burkert_shape(x);
        assert!(((closed - series) / series).abs() < 1e-6, "closed={closed} series={series}");
    }

    #[test]
    fn shape_positive_for_positive_x() {
        for &x in &[1e-8, 1e-4, 0.01, 0.5, 1.0, 10.0, 1e3] {
            assert!(burkert_shape(x) > 0.0, "x = {x}");
        }
    }

    #[test]
    fn galactic_velocity_scale() {
        // rho0 = 1e-21 kg/m^3, r0 = 1e20 m gives tens of km/s at a few kpc.
        let v = burkert_velocity(3.0 * KPC_TO_M, 1e-21, 1e20);
        assert!(v > 1e4 && v < 2e5, "v = {v}");
    }

    #[test]
    fn negative_density_is_nan() {
        assert!(burkert_velocity(KPC_TO_M, -1e-21, 1e20).is_nan());
    }
}
