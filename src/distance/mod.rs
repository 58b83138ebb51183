//! # Pairwise dissimilarity between rows
//!
//! Three interchangeable metrics produce a [`DissimilarityMatrix`]:
//! - **Euclidean**: straight-line distance between rows as points in column space, optionally
//!   after z-scoring each row
//! - **Information**: variation of information between the partitions induced by the
//!   row-adaptive discretization (the default information distance)
//! - **SymmetricKl**: legacy symmetrised KL divergence over softmax-normalised discretized rows
//!
//! All metrics work on pairwise-complete observations. A pair of rows without a single
//! shared defined position gets `NaN` instead of failing the whole matrix.

mod measure;

pub use measure::{DissimilarityMeasure, EuclideanDistance, SymmetricKlDivergence, VariationOfInformation};

use crate::discretize::{discretize_with, validate_kernel, DiscretizeConfig, ValueSpace};
use crate::error::{Error, Result};
use crate::information::{encode_categories, DEFAULT_LOG_BASE};
use crate::table::{DiscretizedTable, DissimilarityMatrix, Table};
use crate::utils::StandardizeRows;
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMethod {
    #[default]
    Euclidean,
    #[serde(alias = "vi")]
    Information,
    #[serde(alias = "kl")]
    SymmetricKl,
}

impl FromStr for DistanceMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(DistanceMethod::Euclidean),
            "information" | "vi" | "variation-of-information" => Ok(DistanceMethod::Information),
            "symmetric-kl" | "kl" => Ok(DistanceMethod::SymmetricKl),
            other => Err(Error::argument(format!(
                "unknown distance method '{}' (expected euclidean, information or symmetric-kl)",
                other
            ))),
        }
    }
}

impl fmt::Display for DistanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceMethod::Euclidean => "euclidean",
            DistanceMethod::Information => "information",
            DistanceMethod::SymmetricKl => "symmetric-kl",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    pub method: DistanceMethod,
    /// Kernel width of the discretization step (information-based methods only).
    pub sigma: f64,
    pub bins: usize,
    /// Logarithm base of the entropies behind variation of information.
    pub log_base: f64,
    /// Z-score each row before measuring Euclidean distance.
    pub standardize: bool,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            method: DistanceMethod::default(),
            sigma: 1.0,
            bins: 7,
            log_base: DEFAULT_LOG_BASE,
            standardize: false,
        }
    }
}

impl DistanceConfig {
    pub fn new(method: DistanceMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    pub fn log_base(mut self, log_base: f64) -> Self {
        self.log_base = log_base;
        self
    }

    pub fn standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_kernel(self.sigma, self.bins)?;
        if !(self.log_base.is_finite() && self.log_base > 0.0 && self.log_base != 1.0) {
            return Err(Error::argument(format!(
                "log_base must be positive and different from 1, got {}",
                self.log_base
            )));
        }
        Ok(())
    }

    fn discretize_config(&self) -> DiscretizeConfig {
        DiscretizeConfig::default()
            .sigma(self.sigma)
            .bins(self.bins)
            .value_space(ValueSpace::StandardScore)
    }
}

pub fn compute_distance(table: &Table, method: DistanceMethod, sigma: f64, bins: usize) -> Result<DissimilarityMatrix> {
    compute_distance_with(table, &DistanceConfig::new(method).sigma(sigma).bins(bins))
}

pub fn compute_distance_with(table: &Table, config: &DistanceConfig) -> Result<DissimilarityMatrix> {
    config.validate()?;
    table.ensure_rows_observed()?;

    let (n_rows, n_cols) = table.dim();
    debug!(
        "Computing {} distances between {} rows over {} columns",
        config.method, n_rows, n_cols
    );
    let started = Instant::now();

    let values = match config.method {
        DistanceMethod::Euclidean => {
            let points = if config.standardize {
                table.values().standardize_rows()
            } else {
                table.values().to_owned()
            };
            pairwise_matrix(points.view(), &EuclideanDistance)
        }
        DistanceMethod::Information => {
            let discretized = discretize_with(table, &config.discretize_config())?;
            let codes = category_codes(&discretized);
            pairwise_matrix(codes.view(), &VariationOfInformation::new(config.log_base))
        }
        DistanceMethod::SymmetricKl => {
            let discretized = discretize_with(table, &config.discretize_config())?;
            pairwise_matrix(discretized.values(), &SymmetricKlDivergence)
        }
    };

    let matrix = DissimilarityMatrix::from_labeled(table.row_labels().to_vec(), values)?;
    let undefined = matrix.undefined_pairs();
    if !undefined.is_empty() {
        warn!(
            "{} row pairs share no comparable observations, e.g. ('{}', '{}')",
            undefined.len(),
            undefined[0].0,
            undefined[0].1
        );
    }
    info!(
        "Computed {} x {} {} matrix in {:?}",
        n_rows,
        n_rows,
        config.method,
        started.elapsed()
    );
    Ok(matrix)
}

/// Row-local category codes of a discretized table, `NaN` where the input was missing.
fn category_codes(discretized: &DiscretizedTable) -> Array2<f64> {
    let values = discretized.values();
    let mut codes = Array2::from_elem(values.dim(), f64::NAN);
    for (i, row) in values.rows().into_iter().enumerate() {
        for (j, code) in encode_categories(row).into_iter().enumerate() {
            if let Some(code) = code {
                codes[[i, j]] = code as f64;
            }
        }
    }
    codes
}

/// Fills a symmetric matrix by evaluating `measure` on every pair `i < j` in parallel.
///
/// The diagonal is zero. Pairs without comparable observations are `NaN`.
pub fn pairwise_matrix<M: DissimilarityMeasure>(rows: ArrayView2<f64>, measure: &M) -> Array2<f64> {
    let n = rows.nrows();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();

    let distances: Vec<f64> = pairs
        .par_iter()
        .map(|&(i, j)| measure.calculate(rows.row(i), rows.row(j)).unwrap_or(f64::NAN))
        .collect();

    let mut out = Array2::zeros((n, n));
    for (&(i, j), d) in pairs.iter().zip(distances) {
        out[[i, j]] = d;
        out[[j, i]] = d;
    }
    out
}
