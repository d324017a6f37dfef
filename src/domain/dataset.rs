//! The immutable, galaxy-indexed working dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::types::DerivedRecord;
use crate::error::AppError;

/// Ordered collection of derived observations, grouped by galaxy identifier.
///
/// A `Dataset` is built once and never mutated; filters return a new value.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<DerivedRecord>,
    by_galaxy: BTreeMap<String, Vec<usize>>,
}

/// Summary stats about the points in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n_points: usize,
    pub n_galaxies: usize,
    pub r_kpc_min: f64,
    pub r_kpc_max: f64,
    pub g_bar_min: f64,
    pub g_bar_max: f64,
    pub g_obs_min: f64,
    pub g_obs_max: f64,
}

impl Dataset {
    pub fn from_records(records: Vec<DerivedRecord>) -> Self {
        let mut by_galaxy: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, rec) in records.iter().enumerate() {
            by_galaxy.entry(rec.galaxy().to_string()).or_default().push(idx);
        }
        Self { records, by_galaxy }
    }

    pub fn records(&self) -> &[DerivedRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Galaxy identifiers in sorted order.
    pub fn galaxy_ids(&self) -> impl Iterator<Item = &str> {
        self.by_galaxy.keys().map(String::as_str)
    }

    pub fn galaxy_count(&self) -> usize {
        self.by_galaxy.len()
    }

    pub fn contains_galaxy(&self, id: &str) -> bool {
        self.by_galaxy.contains_key(id)
    }

    /// All rows of one galaxy, sorted by increasing radius.
    pub fn galaxy(&self, id: &str) -> Result<Vec<&DerivedRecord>, AppError> {
        let idx = self.by_galaxy.get(id).ok_or_else(|| AppError::NotFound {
            galaxy: id.to_string(),
        })?;
        let mut rows: Vec<&DerivedRecord> = idx.iter().map(|&i| &self.records[i]).collect();
        rows.sort_by(|a, b| {
            a.record
                .r_kpc
                .partial_cmp(&b.record.r_kpc)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rows)
    }

    /// Keep rows with `σV_obs / V_obs < threshold`.
    ///
    /// Rows without a known uncertainty cannot pass the filter.
    pub fn filter_relative_error(&self, threshold: f64) -> Dataset {
        let kept: Vec<DerivedRecord> = self
            .records
            .iter()
            .filter(|r| r.relative_error().is_some_and(|rel| rel < threshold))
            .cloned()
            .collect();
        Dataset::from_records(kept)
    }

    pub fn stats(&self) -> Option<DatasetStats> {
        if self.records.is_empty() {
            return None;
        }

        let mut s = DatasetStats {
            n_points: self.records.len(),
            n_galaxies: self.by_galaxy.len(),
            r_kpc_min: f64::INFINITY,
            r_kpc_max: f64::NEG_INFINITY,
            g_bar_min: f64::INFINITY,
            g_bar_max: f64::NEG_INFINITY,
            g_obs_min: f64::INFINITY,
            g_obs_max: f64::NEG_INFINITY,
        };
        for r in &self.records {
            s.r_kpc_min = s.r_kpc_min.min(r.record.r_kpc);
            s.r_kpc_max = s.r_kpc_max.max(r.record.r_kpc);
            s.g_bar_min = s.g_bar_min.min(r.g_bar);
            s.g_bar_max = s.g_bar_max.max(r.g_bar);
            s.g_obs_min = s.g_obs_min.min(r.g_obs);
            s.g_obs_max = s.g_obs_max.max(r.g_obs);
        }
        Some(s)
    }
}
