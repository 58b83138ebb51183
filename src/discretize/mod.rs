//! # Row-adaptive Gaussian discretization
//!
//! Each row is snapped onto `bins` candidate centres spread evenly over standard scores
//! `[-3, 3]` of that row's own distribution, so variables measured on different scales end up
//! with comparable partitions. A value is assigned to the centre with the largest Gaussian
//! kernel weight `exp(-0.5 * ((v - c_k) / sigma)^2)`, ties going to the lower index.

use crate::error::{Error, Result};
use crate::table::{DiscretizedTable, Table};
use crate::utils::{DefinedValues, RowMoments};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Lowest and highest standard score covered by the candidate centres.
pub const STANDARD_SCORE_RANGE: (f64, f64) = (-3.0, 3.0);

/// Scale in which discretized levels are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSpace {
    #[default]
    StandardScore,
    OriginalScale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretizeConfig {
    pub sigma: f64,
    pub bins: usize,
    pub value_space: ValueSpace,
}

impl Default for DiscretizeConfig {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            bins: 7,
            value_space: ValueSpace::StandardScore,
        }
    }
}

impl DiscretizeConfig {
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    pub fn value_space(mut self, value_space: ValueSpace) -> Self {
        self.value_space = value_space;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_kernel(self.sigma, self.bins)
    }
}

pub(crate) fn validate_kernel(sigma: f64, bins: usize) -> Result<()> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::argument(format!(
            "sigma must be a positive number, got {}",
            sigma
        )));
    }
    if bins < 2 {
        return Err(Error::argument(format!("bins must be at least 2, got {}", bins)));
    }
    Ok(())
}

/// Standard scores `z_k = -3 + 6k / (bins - 1)` of the candidate centres.
pub fn standard_score_centers(bins: usize) -> Array1<f64> {
    let (lo, hi) = STANDARD_SCORE_RANGE;
    let last = (bins - 1) as f64;
    Array1::from_iter((0..bins).map(|k| lo + (hi - lo) * k as f64 / last))
}

pub fn discretize(table: &Table, sigma: f64, bins: usize, value_space: ValueSpace) -> Result<DiscretizedTable> {
    discretize_with(
        table,
        &DiscretizeConfig {
            sigma,
            bins,
            value_space,
        },
    )
}

pub fn discretize_with(table: &Table, config: &DiscretizeConfig) -> Result<DiscretizedTable> {
    config.validate()?;
    table.ensure_rows_observed()?;

    let (n_rows, n_cols) = table.dim();
    debug!(
        "Discretizing {} x {} table (sigma={}, bins={}, {:?})",
        n_rows, n_cols, config.sigma, config.bins, config.value_space
    );
    let started = Instant::now();

    let z_centers = standard_score_centers(config.bins);
    let values = table.values();
    let rows: Vec<DiscretizedRow> = (0..n_rows)
        .into_par_iter()
        .map(|i| discretize_row(values.row(i), &z_centers, config.sigma, config.value_space))
        .collect();

    let mut out_values = Array2::from_elem((n_rows, n_cols), f64::NAN);
    let mut out_levels = Array2::from_elem((n_rows, n_cols), None);
    for (i, row) in rows.into_iter().enumerate() {
        out_values.row_mut(i).assign(&Array1::from(row.values));
        for (j, level) in row.levels.into_iter().enumerate() {
            out_levels[[i, j]] = level;
        }
    }

    let out = Table::new(
        table.row_labels().to_vec(),
        table.col_labels().to_vec(),
        out_values,
    )?;
    info!(
        "Discretized {} rows into {} levels in {:?}",
        n_rows,
        config.bins,
        started.elapsed()
    );
    Ok(DiscretizedTable::new(out, out_levels, config.bins, config.value_space))
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DiscretizedRow {
    pub values: Vec<f64>,
    pub levels: Vec<Option<u32>>,
}

pub(crate) fn discretize_row(
    row: ArrayView1<f64>,
    z_centers: &Array1<f64>,
    sigma: f64,
    value_space: ValueSpace,
) -> DiscretizedRow {
    let n = row.len();
    let Some(moments) = row.moments() else {
        return DiscretizedRow {
            values: vec![f64::NAN; n],
            levels: vec![None; n],
        };
    };

    if moments.is_degenerate() {
        return degenerate_row(row, z_centers.len(), moments, value_space);
    }

    let centers = z_centers.mapv(|z| moments.mean + moments.std_dev * z);
    let mut values = Vec::with_capacity(n);
    let mut levels = Vec::with_capacity(n);
    for &v in row.iter() {
        if v.is_nan() {
            values.push(f64::NAN);
            levels.push(None);
            continue;
        }
        let k = heaviest_center(v, &centers, sigma);
        values.push(match value_space {
            ValueSpace::StandardScore => z_centers[k],
            ValueSpace::OriginalScale => centers[k],
        });
        levels.push(Some(k as u32));
    }

    DiscretizedRow { values, levels }
}

/// Every defined entry gets standard score 0 (the row mean in original units) and the middle
/// index `(bins - 1) / 2`. With an even `bins` no centre sits at 0, so that index is nominal.
fn degenerate_row(row: ArrayView1<f64>, bins: usize, moments: RowMoments, value_space: ValueSpace) -> DiscretizedRow {
    let level = value_space_level(value_space, moments.mean);
    let middle = ((bins - 1) / 2) as u32;
    let (values, levels) = row
        .iter()
        .map(|v| if v.is_nan() { (f64::NAN, None) } else { (level, Some(middle)) })
        .unzip();
    DiscretizedRow { values, levels }
}

fn value_space_level(value_space: ValueSpace, mean: f64) -> f64 {
    match value_space {
        ValueSpace::StandardScore => 0.0,
        ValueSpace::OriginalScale => mean,
    }
}

/// Index of the centre with the largest kernel weight, first one on ties.
///
/// Compares log-weights so that values far from every centre still land on the nearest one
/// instead of all weights underflowing to zero.
fn heaviest_center(v: f64, centers: &Array1<f64>, sigma: f64) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (k, &c) in centers.iter().enumerate() {
        let u = (v - c) / sigma;
        let score = -0.5 * u * u;
        if score > best_score {
            best = k;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn scenario() -> Table {
        Table::from_rows(vec![
            ("A", vec![1.0, 1.0, 1.0, 1.0]),
            ("B", vec![1.0, 2.0, 3.0, 4.0]),
            ("C", vec![4.0, 3.0, 2.0, 1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_standard_score_centers() {
        let centers = standard_score_centers(7);
        assert_eq!(centers.len(), 7);
        assert_relative_eq!(centers[0], -3.0);
        assert_relative_eq!(centers[3], 0.0);
        assert_relative_eq!(centers[6], 3.0);
        assert_eq!(standard_score_centers(2).to_vec(), vec![-3.0, 3.0]);
    }

    #[test]
    fn test_constant_row_collapses_to_zero() {
        for bins in [2, 7, 13] {
            for sigma in [0.1, 1.0, 25.0] {
                let out = discretize(&scenario(), sigma, bins, ValueSpace::StandardScore).unwrap();
                assert_eq!(out.values().row(0).to_vec(), vec![0.0; 4]);
            }
        }
    }

    #[test]
    fn test_constant_row_keeps_original_value() {
        let out = discretize(&scenario(), 1.0, 7, ValueSpace::OriginalScale).unwrap();
        assert_eq!(out.values().row(0).to_vec(), vec![1.0; 4]);
        assert_eq!(out.levels()[[0, 0]], Some(3));
    }

    #[test]
    fn test_row_levels() {
        // B: mean 2.5, sample std 1.291; z-scores -1.16, -0.39, 0.39, 1.16
        let out = discretize(&scenario(), 1.0, 7, ValueSpace::StandardScore).unwrap();
        assert_eq!(out.values().row(1).to_vec(), vec![-1.0, 0.0, 0.0, 1.0]);
        assert_eq!(out.values().row(2).to_vec(), vec![1.0, 0.0, 0.0, -1.0]);
        assert_eq!(
            out.levels().row(1).to_vec(),
            vec![Some(2), Some(3), Some(3), Some(4)]
        );
        assert_eq!(out.bins(), 7);
        assert_eq!(out.value_space(), ValueSpace::StandardScore);
    }

    #[test]
    fn test_original_scale_maps_back() {
        let out = discretize(&scenario(), 1.0, 7, ValueSpace::OriginalScale).unwrap();
        let std = (5.0f64 / 3.0).sqrt();
        let row = out.values().row(1).to_vec();
        assert_relative_eq!(row[0], 2.5 - std, epsilon = 1e-12);
        assert_relative_eq!(row[1], 2.5, epsilon = 1e-12);
        assert_relative_eq!(row[3], 2.5 + std, epsilon = 1e-12);
    }

    #[test]
    fn test_every_entry_is_a_row_center() {
        let table = Table::with_default_labels(array![
            [0.3, 10.0, -4.0, 2.2, 7.7, 1.0],
            [100.0, 250.0, 175.0, 90.0, 310.0, 205.0]
        ])
        .unwrap();
        let out = discretize(&table, 0.5, 13, ValueSpace::StandardScore).unwrap();
        let centers = standard_score_centers(13);
        for (&v, level) in out.values().iter().zip(out.levels().iter()) {
            let k = level.unwrap() as usize;
            assert_eq!(v, centers[k]);
        }
    }

    #[test]
    fn test_deterministic() {
        let table = scenario();
        let a = discretize(&table, 0.7, 13, ValueSpace::OriginalScale).unwrap();
        let b = discretize(&table, 0.7, 13, ValueSpace::OriginalScale).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_values_stay_missing() {
        let table = Table::from_rows(vec![("A", vec![f64::NAN, 1.0, 5.0, 9.0])]).unwrap();
        let out = discretize(&table, 1.0, 7, ValueSpace::StandardScore).unwrap();
        assert!(out.values()[[0, 0]].is_nan());
        assert_eq!(out.levels()[[0, 0]], None);
        let row = out.values().row(0).to_vec();
        assert_eq!(&row[1..], &[-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_far_values_pick_nearest_center() {
        // Weights underflow to zero for a tiny sigma; the assignment must not fall back to index 0.
        let table = Table::from_rows(vec![("A", vec![0.0, 1000.0, 2000.0])]).unwrap();
        let out = discretize(&table, 1e-3, 7, ValueSpace::StandardScore).unwrap();
        assert_eq!(out.values().row(0).to_vec(), vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_row_shape_decides_levels_not_scale() {
        let table = Table::from_rows(vec![
            ("unit", vec![1.0, 2.0, 3.0]),
            ("tiny", vec![1e-13, 2e-13, 3e-13]),
            ("epoch_ms", vec![1.7e12, 1.7e12 + 1.0, 1.7e12 + 2.0]),
        ])
        .unwrap();
        let out = discretize(&table, 1.0, 7, ValueSpace::StandardScore).unwrap();
        for i in 0..3 {
            assert_eq!(out.values().row(i).to_vec(), vec![-1.0, 0.0, 1.0]);
            assert_eq!(out.levels().row(i).to_vec(), vec![Some(2), Some(3), Some(4)]);
        }
    }

    #[test]
    fn test_constant_row_with_even_bins() {
        let out = discretize(&scenario(), 1.0, 2, ValueSpace::StandardScore).unwrap();
        assert_eq!(out.values().row(0).to_vec(), vec![0.0; 4]);
        assert_eq!(out.levels().row(0).to_vec(), vec![Some(0); 4]);

        let out = discretize(&scenario(), 1.0, 8, ValueSpace::StandardScore).unwrap();
        assert_eq!(out.levels()[[0, 0]], Some(3));
    }

    #[test]
    fn test_invalid_arguments() {
        let table = scenario();
        assert!(matches!(
            discretize(&table, -1.0, 7, ValueSpace::StandardScore),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            discretize(&table, 0.0, 7, ValueSpace::StandardScore),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            discretize(&table, f64::NAN, 7, ValueSpace::StandardScore),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            discretize(&table, 1.0, 1, ValueSpace::StandardScore),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unobserved_row_rejected() {
        let table = Table::from_rows(vec![("A", vec![1.0, 2.0]), ("B", vec![f64::NAN, f64::NAN])]).unwrap();
        assert!(matches!(
            discretize(&table, 1.0, 7, ValueSpace::StandardScore),
            Err(Error::InvalidInput(_))
        ));
    }
}
