//! Radial Acceleration Relation (McGaugh form).
//!
//! `g_obs = g_bar / (1 - exp(-sqrt(g_bar / g0)))`
//!
//! Numerical notes:
//! - `1 - exp(-x)` is computed as `-expm1(-x)` so the deep-MOND regime
//!   (`g_bar << g0`, small `x`) keeps full precision.
//! - The relation is undefined for `g0 <= 0`; callers keep `g0` in a positive box.

/// Predicted observed acceleration for baryonic acceleration `g_bar` (m/s^2).
pub fn rar_g_obs(g_bar: f64, g0: f64) -> f64 {
    let x = (g_bar / g0).sqrt();
    g_bar / -(-x).exp_m1()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtonian_limit_at_high_acceleration() {
        let g0 = 1.2e-10;
        let g_bar = 1e-7;
        let g = rar_g_obs(g_bar, g0);
        assert!(((g - g_bar) / g_bar).abs() < 1e-9, "g = {g}");
    }

    #[test]
    fn deep_mond_limit_at_low_acceleration() {
        // g_obs -> sqrt(g_bar * g0) as g_bar -> 0.
        let g0 = 1.2e-10;
        let g_bar = 1e-16;
        let g = rar_g_obs(g_bar, g0);
        let deep = (g_bar * g0).sqrt();
        assert!(((g - deep) / deep).abs() < 1e-2, "g = {g}, deep = {deep}");
    }

    #[test]
    fn always_at_least_baryonic() {
        for &g_bar in &[1e-13, 1e-11, 1e-10, 1e-9] {
            assert!(rar_g_obs(g_bar, 1.2e-10) >= g_bar);
        }
    }
}
