//! Export the normalized dataset to CSV.
//!
//! Headers use the loader's canonical column names, so an exported file can be
//! loaded again as a catalog. The SI columns ride along for spreadsheets.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::Dataset;
use crate::error::AppError;

const HEADER: &str = "galaxy,d_mpc,r_kpc,vobs_kms,ev_kms,vgas_kms,vdisk_kms,vbul_kms,sbdisk,sbbul,vbar_kms,r_m,vobs_ms,vbar_ms,g_obs,g_bar,g_obs_err";

/// Write every record of `dataset` (catalog order) to `path`.
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    write_dataset(BufWriter::new(file), dataset).map_err(|e| AppError::io(path, e))
}

/// Same as [`write_dataset_csv`], to any writer.
pub fn write_dataset<W: Write>(mut out: W, dataset: &Dataset) -> std::io::Result<()> {
    writeln!(out, "{HEADER}")?;

    for r in dataset.iter() {
        let rec = &r.record;
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{:e},{},{},{:e},{:e},{}",
            quote(&rec.galaxy),
            opt(rec.distance_mpc),
            rec.r_kpc,
            rec.v_obs_kms,
            opt(rec.ev_obs_kms),
            rec.v_gas_kms,
            rec.v_disk_kms,
            rec.v_bulge_kms,
            opt(rec.sb_disk),
            opt(rec.sb_bulge),
            r.v_bar_kms,
            r.r_m,
            r.v_obs_ms,
            r.v_bar_ms,
            r.g_obs,
            r.g_bar,
            r.g_obs_err.map(|v| format!("{v:e}")).unwrap_or_default(),
        )?;
    }

    out.flush()
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn quote(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
