//! Synthetic rotation-curve catalogs.
//!
//! Each galaxy gets a toy baryonic curve (exponential-ish stellar disk plus a
//! slowly rising gas term). Observed velocities then follow the RAR at a chosen
//! `g0`, optionally with multiplicative Gaussian noise. Useful for demos and
//! for checking that the fits recover known parameters.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{GalaxyRecord, kms_to_ms, kpc_to_m, ms_to_kms};
use crate::error::AppError;
use crate::models::rar_g_obs;

/// Relative velocity uncertainty reported when the catalog is noise-free.
const MIN_REPORTED_REL_ERR: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub galaxies: usize,
    pub points_per_galaxy: usize,
    /// RAR acceleration scale the catalog follows (m/s^2).
    pub g0: f64,
    /// Relative 1-sigma noise on `Vobs`; `0.0` for exact curves.
    pub noise: f64,
    pub r_min_kpc: f64,
    pub r_max_kpc: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            galaxies: 12,
            points_per_galaxy: 15,
            g0: 1.2e-10,
            noise: 0.0,
            r_min_kpc: 0.5,
            r_max_kpc: 20.0,
            seed: 42,
        }
    }
}

impl SyntheticSpec {
    fn validate(&self) -> Result<(), AppError> {
        if self.galaxies == 0 || self.points_per_galaxy == 0 {
            return Err(AppError::InvalidConfig(
                "synthetic catalog needs at least one galaxy and one point per galaxy".to_string(),
            ));
        }
        if !(self.g0.is_finite() && self.g0 > 0.0) {
            return Err(AppError::InvalidConfig(format!("g0 must be positive, got {}", self.g0)));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(AppError::InvalidConfig(format!("noise must be >= 0, got {}", self.noise)));
        }
        if !(self.r_min_kpc.is_finite() && self.r_max_kpc.is_finite())
            || self.r_min_kpc <= 0.0
            || self.r_max_kpc <= self.r_min_kpc
        {
            return Err(AppError::InvalidConfig(format!(
                "invalid radius range {}..{} kpc",
                self.r_min_kpc, self.r_max_kpc
            )));
        }
        Ok(())
    }
}

/// Generate a catalog. Same spec, same rows.
pub fn generate_catalog(spec: &SyntheticSpec) -> Result<Vec<GalaxyRecord>, AppError> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::InvalidConfig(format!("noise distribution error: {e}")))?;

    let mut records = Vec::with_capacity(spec.galaxies * spec.points_per_galaxy);

    for g in 0..spec.galaxies {
        let name = format!("SYN{:03}", g + 1);
        let v_disk_max: f64 = rng.gen_range(40.0..220.0);
        let v_gas_max: f64 = rng.gen_range(10.0..60.0);
        let scale_kpc: f64 = rng.gen_range(1.0..5.0);
        let distance_mpc: f64 = rng.gen_range(3.0..60.0);

        for i in 0..spec.points_per_galaxy {
            let r_kpc = radius_at(spec, i);
            let x = r_kpc / scale_kpc;

            let v_disk = v_disk_max * (1.0 - (-x).exp());
            let v_gas = v_gas_max * (x / (1.0 + x)).sqrt();

            let r_m = kpc_to_m(r_kpc);
            let g_bar = (kms_to_ms(v_disk).powi(2) + kms_to_ms(v_gas).powi(2)) / r_m;
            let v_true = ms_to_kms((rar_g_obs(g_bar, spec.g0) * r_m).sqrt());

            let v_obs = if spec.noise > 0.0 {
                v_true * (1.0 + spec.noise * normal.sample(&mut rng))
            } else {
                v_true
            };

            records.push(GalaxyRecord {
                galaxy: name.clone(),
                distance_mpc: Some(distance_mpc),
                r_kpc,
                v_obs_kms: v_obs,
                ev_obs_kms: Some(v_true * spec.noise.max(MIN_REPORTED_REL_ERR)),
                v_gas_kms: v_gas,
                v_disk_kms: v_disk,
                v_bulge_kms: 0.0,
                sb_disk: None,
                sb_bulge: None,
            });
        }
    }

    Ok(records)
}

fn radius_at(spec: &SyntheticSpec, i: usize) -> f64 {
    if spec.points_per_galaxy == 1 {
        return spec.r_min_kpc;
    }
    let u = i as f64 / (spec.points_per_galaxy - 1) as f64;
    spec.r_min_kpc + u * (spec.r_max_kpc - spec.r_min_kpc)
}

/// Write records as a SPARC-style catalog CSV.
pub fn write_catalog_csv(path: &Path, records: &[GalaxyRecord]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    write_catalog(BufWriter::new(file), records).map_err(|e| AppError::io(path, e))
}

pub fn write_catalog<W: Write>(mut out: W, records: &[GalaxyRecord]) -> std::io::Result<()> {
    writeln!(out, "ID,D,R,Vobs,e_Vobs,Vgas,Vdisk,Vbul")?;
    for r in records {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            r.galaxy,
            r.distance_mpc.map(|d| format!("{d:.2}")).unwrap_or_default(),
            r.r_kpc,
            r.v_obs_kms,
            r.ev_obs_kms.map(|e| e.to_string()).unwrap_or_default(),
            r.v_gas_kms,
            r.v_disk_kms,
            r.v_bulge_kms,
        )?;
    }
    out.flush()
}
