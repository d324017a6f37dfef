//! CSV ingest and normalization.
//!
//! This module is responsible for turning a galaxy rotation-curve catalog into
//! a clean, immutable [`Dataset`] of SI-derived observations that are safe to fit.
//!
//! Design goals:
//! - **Strict schema** for required columns (missing column aborts the load)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};

use crate::domain::{Dataset, DerivedRecord, GalaxyRecord};
use crate::error::AppError;

/// Catalog columns the loader understands. Everything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Galaxy,
    Distance,
    Radius,
    VObs,
    EVObs,
    VGas,
    VDisk,
    VBulge,
    SbDisk,
    SbBulge,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Galaxy,
        Column::Distance,
        Column::Radius,
        Column::VObs,
        Column::EVObs,
        Column::VGas,
        Column::VDisk,
        Column::VBulge,
        Column::SbDisk,
        Column::SbBulge,
    ];

    pub const BARYONIC: [Column; 3] = [Column::VGas, Column::VDisk, Column::VBulge];

    /// Canonical name used in messages.
    pub fn name(self) -> &'static str {
        self.aliases()[0]
    }

    /// Accepted header spellings (lower-cased). SPARC mass-model tables and the
    /// converted report use different names for the same quantity.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Galaxy => &["galaxy", "id", "name"],
            Column::Distance => &["d_mpc", "d", "d(assumed_distance)"],
            Column::Radius => &["r_kpc", "r", "rad", "r(galactocentric_rad...)"],
            Column::VObs => &["vobs_kms", "vobs"],
            Column::EVObs => &["ev_kms", "e_vobs", "e_vbos", "errv", "evobs"],
            Column::VGas => &["vgas_kms", "vgas"],
            Column::VDisk => &["vdisk_kms", "vdisk"],
            Column::VBulge => &["vbul_kms", "vbul", "vbulge"],
            Column::SbDisk => &["sbdisk"],
            Column::SbBulge => &["sbbul", "sbb"],
        }
    }
}

/// What went wrong with a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowErrorKind {
    /// Cell present but not a number.
    Parse { column: String, value: String },
    /// Required cell blank or non-finite.
    Missing { column: String },
    /// Derived quantities failed validation.
    Derived(String),
    /// The CSV reader could not split the record.
    Malformed(String),
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub galaxy: Option<String>,
    pub kind: RowErrorKind,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)?;
        if let Some(g) = &self.galaxy {
            write!(f, " ({g})")?;
        }
        match &self.kind {
            RowErrorKind::Parse { column, value } => write!(f, ": `{column}` is not numeric ('{value}')"),
            RowErrorKind::Missing { column } => write!(f, ": missing `{column}` value"),
            RowErrorKind::Derived(msg) => write!(f, ": {msg}"),
            RowErrorKind::Malformed(msg) => write!(f, ": CSV parse error: {msg}"),
        }
    }
}

/// Ingest output: normalized dataset + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load and normalize a catalog file.
pub fn load_dataset(path: &Path) -> Result<IngestedData, AppError> {
    let file = std::fs::File::open(path).map_err(|e| AppError::io(path, e))?;
    let data = load_from_reader(file).map_err(|e| match e {
        AppError::Io { source, .. } => AppError::io(path, source),
        other => other,
    })?;
    info!(
        "Loaded '{}': {} row(s) read, {} used, {} dropped",
        path.display(),
        data.rows_read,
        data.rows_used,
        data.row_errors.len()
    );
    Ok(data)
}

/// Load and normalize a catalog from any reader.
pub fn load_from_reader<R: Read>(mut reader: R) -> Result<IngestedData, AppError> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| AppError::io("<input>", e))?;
    load_from_str(&text)
}

/// Load and normalize a catalog held in memory.
pub fn load_from_str(text: &str) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let columns = resolve_columns(&build_header_map(&headers))?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based, plus the header line.
        let line = idx + 2;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                rows_read += 1;
                row_errors.push(RowError {
                    line,
                    galaxy: None,
                    kind: RowErrorKind::Malformed(e.to_string()),
                });
                continue;
            }
        };
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows_read += 1;

        let outcome = parse_row(&record, &columns).and_then(|row| {
            let galaxy = row.galaxy.clone();
            DerivedRecord::derive(row).map_err(|msg| (Some(galaxy), RowErrorKind::Derived(msg)))
        });

        match outcome {
            Ok(derived) => records.push(derived),
            Err((galaxy, kind)) => {
                let err = RowError { line, galaxy, kind };
                debug!("Dropping {err}");
                row_errors.push(err);
            }
        }
    }

    if records.is_empty() {
        let first_parse = row_errors.iter().find_map(|e| match &e.kind {
            RowErrorKind::Parse { column, value } => Some(AppError::Parse {
                line: e.line,
                column: column.clone(),
                value: value.clone(),
            }),
            _ => None,
        });
        return Err(first_parse.unwrap_or(AppError::EmptyDataset { rows_read }));
    }

    let rows_used = records.len();
    Ok(IngestedData {
        dataset: Dataset::from_records(records),
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Pick the delimiter that occurs most often in the header line.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|&d| header.bytes().filter(|&b| b == d).count())
        .filter(|&d| header.bytes().any(|b| b == d))
        .unwrap_or(b',')
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_columns(header_map: &HashMap<String, usize>) -> Result<HashMap<Column, usize>, AppError> {
    let mut columns = HashMap::new();
    for col in Column::ALL {
        if let Some(idx) = col.aliases().iter().find_map(|a| header_map.get(*a)) {
            columns.insert(col, *idx);
        }
    }

    for col in [Column::Galaxy, Column::Radius, Column::VObs] {
        if !columns.contains_key(&col) {
            return Err(AppError::Schema {
                column: col.name().to_string(),
            });
        }
    }
    if !Column::BARYONIC.iter().any(|c| columns.contains_key(c)) {
        return Err(AppError::Schema {
            column: "one of `vgas_kms`, `vdisk_kms`, `vbul_kms`".to_string(),
        });
    }

    Ok(columns)
}

type RowFailure = (Option<String>, RowErrorKind);

fn parse_row(record: &StringRecord, columns: &HashMap<Column, usize>) -> Result<GalaxyRecord, RowFailure> {
    let galaxy = get_cell(record, columns, Column::Galaxy)
        .map(str::to_string)
        .ok_or_else(|| {
            (
                None,
                RowErrorKind::Missing {
                    column: Column::Galaxy.name().to_string(),
                },
            )
        })?;

    let required = |col: Column| -> Result<f64, RowFailure> {
        required_f64(record, columns, col).map_err(|kind| (Some(galaxy.clone()), kind))
    };

    let r_kpc = required(Column::Radius)?;
    let v_obs_kms = required(Column::VObs)?;

    // Absent baryonic columns contribute nothing; present ones must parse.
    let baryonic = |col: Column| -> Result<f64, RowFailure> {
        if columns.contains_key(&col) { required(col) } else { Ok(0.0) }
    };
    let v_gas_kms = baryonic(Column::VGas)?;
    let v_disk_kms = baryonic(Column::VDisk)?;
    let v_bulge_kms = baryonic(Column::VBulge)?;

    Ok(GalaxyRecord {
        distance_mpc: optional_f64(record, columns, Column::Distance),
        r_kpc,
        v_obs_kms,
        ev_obs_kms: optional_f64(record, columns, Column::EVObs),
        v_gas_kms,
        v_disk_kms,
        v_bulge_kms,
        sb_disk: optional_f64(record, columns, Column::SbDisk),
        sb_bulge: optional_f64(record, columns, Column::SbBulge),
        galaxy,
    })
}

fn get_cell<'a>(record: &'a StringRecord, columns: &HashMap<Column, usize>, col: Column) -> Option<&'a str> {
    let idx = columns.get(&col)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn required_f64(record: &StringRecord, columns: &HashMap<Column, usize>, col: Column) -> Result<f64, RowErrorKind> {
    let missing = || RowErrorKind::Missing {
        column: col.name().to_string(),
    };
    let s = get_cell(record, columns, col).ok_or_else(missing)?;
    let v = s.parse::<f64>().map_err(|_| RowErrorKind::Parse {
        column: col.name().to_string(),
        value: s.to_string(),
    })?;
    // +/-inf and NaN count as missing.
    if v.is_finite() { Ok(v) } else { Err(missing()) }
}

fn optional_f64(record: &StringRecord, columns: &HashMap<Column, usize>, col: Column) -> Option<f64> {
    let v = get_cell(record, columns, col)?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPARC: &str = "\
ID,D(Assumed_Distance),R(Galactocentric_Rad...),Vobs,e_Vbos,Vgas,Vdisk,Vbul,SBdisk,SBbul
UGC02953,16.5,1.0,120.0,5.0,10.0,90.0,40.0,900.0,300.0
UGC02953,16.5,2.0,180.0,4.0,15.0,120.0,30.0,500.0,100.0
NGC0024,7.3,0.5,40.0,3.0,8.0,30.0,0.0,200.0,0.0
";

    #[test]
    fn loads_sparc_headers_and_converts_units() {
        let data = load_from_str(SPARC).unwrap();
        assert_eq!(data.rows_read, 3);
        assert_eq!(data.rows_used, 3);
        assert!(data.row_errors.is_empty());

        let rows = data.dataset.galaxy("UGC02953").unwrap();
        let first = rows[0];
        assert_eq!(first.record.distance_mpc, Some(16.5));
        assert_eq!(first.record.ev_obs_kms, Some(5.0));
        let v_bar = (10.0f64.powi(2) + 90.0f64.powi(2) + 40.0f64.powi(2)).sqrt();
        assert!((first.v_bar_kms - v_bar).abs() < 1e-12);
        assert_eq!(first.v_obs_ms, 120_000.0);
    }

    #[test]
    fn every_loaded_row_is_finite_and_positive() {
        let csv = "\
galaxy,r,vobs,vgas,vdisk
A,1.0,50,10,20
A,0.0,50,10,20
A,-1.0,50,10,20
A,2.0,inf,10,20
A,3.0,60,0,0
A,4.0,70,,20
A,5.0,80,12,25
";
        let data = load_from_str(csv).unwrap();
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.row_errors.len(), 5);
        for r in data.dataset.iter() {
            for v in [r.r_m, r.v_obs_ms, r.v_bar_ms, r.g_obs, r.g_bar, r.v_bar_kms] {
                assert!(v.is_finite());
            }
            assert!(r.g_obs > 0.0 && r.g_bar > 0.0);
        }
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let csv = "galaxy,vobs,vdisk\nA,50,20\n";
        match load_from_str(csv) {
            Err(AppError::Schema { column }) => assert_eq!(column, "r_kpc"),
            other => panic!("expected Schema, got {other:?}"),
        }
    }

    #[test]
    fn no_baryonic_column_is_schema_error() {
        let csv = "galaxy,r,vobs\nA,1,50\n";
        assert!(matches!(load_from_str(csv), Err(AppError::Schema { .. })));
    }

    #[test]
    fn absent_component_columns_contribute_zero() {
        let csv = "galaxy,r,vobs,vdisk\nA,1,50,30\n";
        let data = load_from_str(csv).unwrap();
        let r = &data.dataset.records()[0];
        assert_eq!(r.record.v_gas_kms, 0.0);
        assert_eq!(r.record.v_bulge_kms, 0.0);
        assert_eq!(r.v_bar_kms, 30.0);
        assert!(r.g_obs_err.is_none());
    }

    #[test]
    fn non_numeric_cells_drop_rows_and_name_the_column() {
        let csv = "galaxy,r,vobs,vdisk\nA,1,fast,30\nA,2,60,35\n";
        let data = load_from_str(csv).unwrap();
        assert_eq!(data.rows_used, 1);
        assert_eq!(
            data.row_errors[0].kind,
            RowErrorKind::Parse {
                column: "vobs_kms".to_string(),
                value: "fast".to_string()
            }
        );
        assert_eq!(data.row_errors[0].line, 2);
        assert_eq!(data.row_errors[0].galaxy.as_deref(), Some("A"));
    }

    #[test]
    fn dataset_emptied_by_parse_errors_is_a_parse_error() {
        let csv = "galaxy,r,vobs,vdisk\nA,one,50,30\n";
        match load_from_str(csv) {
            Err(AppError::Parse { line, column, value }) => {
                assert_eq!(line, 2);
                assert_eq!(column, "r_kpc");
                assert_eq!(value, "one");
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn dataset_emptied_by_filtering_is_empty_dataset() {
        let csv = "galaxy,r,vobs,vdisk\nA,0,50,30\n";
        assert!(matches!(load_from_str(csv), Err(AppError::EmptyDataset { rows_read: 1 })));
    }

    #[test]
    fn semicolon_and_tab_delimiters_are_detected() {
        let semi = "galaxy;r;vobs;vdisk\nA;1;50;30\n";
        assert_eq!(load_from_str(semi).unwrap().rows_used, 1);
        let tab = "galaxy\tr\tvobs\tvdisk\nA\t1\t50\t30\n";
        assert_eq!(load_from_str(tab).unwrap().rows_used, 1);
    }

    #[test]
    fn bom_and_unknown_columns_are_tolerated() {
        let csv = "\u{feff}ID,R,Vobs,Vdisk,Quality\nA,1,50,30,good\n";
        let data = load_from_str(csv).unwrap();
        assert_eq!(data.rows_used, 1);
    }

    #[test]
    fn uncertainty_blank_cell_keeps_the_row() {
        let csv = "galaxy,r,vobs,errv,vdisk\nA,1,50,,30\nA,2,55,3,32\n";
        let data = load_from_str(csv).unwrap();
        assert_eq!(data.rows_used, 2);
        let rows = data.dataset.galaxy("A").unwrap();
        assert!(rows[0].g_obs_err.is_none());
        assert!(rows[1].g_obs_err.is_some());
    }
}
