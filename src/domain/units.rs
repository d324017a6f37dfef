//! Fixed physical constants and SI conversions.
//!
//! These are constants of nature (or of the unit system), not configuration.

/// Metres per kilometre (velocities: km/s -> m/s).
pub const KM_TO_M: f64 = 1000.0;

/// Metres per kiloparsec.
pub const KPC_TO_M: f64 = 3.085677581e19;

/// Newtonian gravitational constant (m^3 kg^-1 s^-2).
pub const G_NEWTON: f64 = 6.67430e-11;

pub fn kms_to_ms(v_kms: f64) -> f64 {
    v_kms * KM_TO_M
}

pub fn ms_to_kms(v_ms: f64) -> f64 {
    v_ms / KM_TO_M
}

pub fn kpc_to_m(r_kpc: f64) -> f64 {
    r_kpc * KPC_TO_M
}

pub fn m_to_kpc(r_m: f64) -> f64 {
    r_m / KPC_TO_M
}

/// Centripetal acceleration `v^2 / r` (SI).
pub fn centripetal_acceleration(v_ms: f64, r_m: f64) -> f64 {
    v_ms * v_ms / r_m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_round_trip() {
        for &v in &[0.0, 1.0, 12.5, 187.3, 312.0] {
            let back = ms_to_kms(kms_to_ms(v));
            assert!((back - v).abs() <= f64::EPSILON * v.abs().max(1.0), "{v} -> {back}");
        }
    }

    #[test]
    fn radius_round_trip() {
        for &r in &[0.08, 1.0, 3.7, 25.4, 120.0] {
            let back = m_to_kpc(kpc_to_m(r));
            assert!(((back - r) / r).abs() < 1e-15, "{r} -> {back}");
        }
    }

    #[test]
    fn acceleration_magnitude_is_galactic() {
        // 200 km/s at 10 kpc is a few 1e-11 m/s^2.
        let g = centripetal_acceleration(kms_to_ms(200.0), kpc_to_m(10.0));
        assert!(g > 1e-11 && g < 1e-9, "g = {g}");
    }
}
