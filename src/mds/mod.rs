//! # Multidimensional scaling
//!
//! Embeds points in a low-dimensional Euclidean space so that their distances approximate a
//! precomputed dissimilarity matrix.
//!
//! ## Available solvers
//! - [`Smacof`]: metric stress majorization with random restarts, the default
//! - [`ClassicalMds`]: Torgerson scaling through an eigendecomposition of the double-centred
//!   squared dissimilarities; exact for Euclidean input
//!
//! Both implement [`MdsSolver`], which is the seam the reduction stage calls through.

use crate::error::{Error, Result};
use log::{debug, warn};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Embedded distances of exactly zero are floored at this value in the Guttman transform.
const MIN_EMBEDDED_DISTANCE: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MdsInit {
    /// Uniform coordinates in `[0, 1)` drawn from the seeded generator.
    #[default]
    Random,
    /// Start from the classical MDS solution (a single deterministic run).
    Classical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdsConfig {
    pub n_components: usize,
    /// Number of independent SMACOF runs; the one with the lowest stress wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative stress improvement below which a run stops.
    pub eps: f64,
    /// `None` draws a fresh seed from the thread generator.
    pub random_state: Option<u64>,
    pub init: MdsInit,
}

impl Default for MdsConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            n_init: 4,
            max_iter: 300,
            eps: 1e-3,
            random_state: Some(42),
            init: MdsInit::Random,
        }
    }
}

impl MdsConfig {
    pub fn with_components(n_components: usize) -> Self {
        Self {
            n_components,
            ..Self::default()
        }
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn random_state(mut self, random_state: Option<u64>) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn init(mut self, init: MdsInit) -> Self {
        self.init = init;
        self
    }

    /// Checks the solver settings, without reference to a particular matrix.
    pub fn validate(&self) -> Result<()> {
        if self.n_components == 0 {
            return Err(Error::argument("n_components must be a positive integer"));
        }
        if self.n_init == 0 {
            return Err(Error::argument("n_init must be at least 1"));
        }
        if self.max_iter == 0 {
            return Err(Error::argument("max_iter must be at least 1"));
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::argument(format!("eps must be positive, got {}", self.eps)));
        }
        Ok(())
    }

    /// Checks the settings against a matrix of `n_samples` points.
    pub fn validate_for(&self, n_samples: usize) -> Result<()> {
        self.validate()?;
        if self.n_components > n_samples {
            return Err(Error::argument(format!(
                "n_components ({}) cannot exceed the number of points ({})",
                self.n_components, n_samples
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdsResult {
    /// `n x n_components` coordinates.
    pub embedding: Array2<f64>,
    /// Raw stress: half the sum of squared differences between embedded and input distances.
    pub stress: f64,
    pub n_iter: usize,
    pub converged: bool,
}

pub trait MdsSolver: Send + Sync {
    fn embed(&self, dissimilarities: ArrayView2<f64>, config: &MdsConfig) -> Result<MdsResult>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Smacof;

impl MdsSolver for Smacof {
    fn embed(&self, dissimilarities: ArrayView2<f64>, config: &MdsConfig) -> Result<MdsResult> {
        check_dissimilarities(dissimilarities)?;
        let n = dissimilarities.nrows();
        config.validate_for(n)?;
        let k = config.n_components;

        if n == 1 {
            return Ok(single_point(k));
        }

        let n_runs = match config.init {
            MdsInit::Random => config.n_init,
            MdsInit::Classical => 1,
        };
        let seeds = run_seeds(config.random_state, n_runs);
        debug!(
            "SMACOF on {} points: {} runs, max_iter={}, eps={}",
            n, n_runs, config.max_iter, config.eps
        );

        let runs: Vec<MdsResult> = seeds
            .par_iter()
            .map(|&seed| {
                let init = match config.init {
                    MdsInit::Random => random_init(n, k, seed),
                    MdsInit::Classical => classical_embedding(dissimilarities, k),
                };
                smacof_single(dissimilarities, init, config.max_iter, config.eps)
            })
            .collect();

        let best = runs
            .into_iter()
            .reduce(|best, run| if run.stress < best.stress { run } else { best })
            .ok_or_else(|| Error::argument("n_init must be at least 1"))?;

        if !best.converged {
            warn!(
                "SMACOF stopped after max_iter={} iterations without converging (stress {:.6})",
                config.max_iter, best.stress
            );
        }
        debug!("SMACOF best stress {:.6} after {} iterations", best.stress, best.n_iter);
        Ok(best)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicalMds;

impl MdsSolver for ClassicalMds {
    fn embed(&self, dissimilarities: ArrayView2<f64>, config: &MdsConfig) -> Result<MdsResult> {
        check_dissimilarities(dissimilarities)?;
        let n = dissimilarities.nrows();
        config.validate_for(n)?;
        if n == 1 {
            return Ok(single_point(config.n_components));
        }

        let embedding = classical_embedding(dissimilarities, config.n_components);
        let stress = raw_stress(embedded_distances(embedding.view()).view(), dissimilarities);
        Ok(MdsResult {
            embedding,
            stress,
            n_iter: 0,
            converged: true,
        })
    }
}

fn check_dissimilarities(d: ArrayView2<f64>) -> Result<()> {
    let (n_rows, n_cols) = d.dim();
    if n_rows == 0 {
        return Err(Error::input("dissimilarity matrix is empty"));
    }
    if n_rows != n_cols {
        return Err(Error::input(format!(
            "dissimilarity matrix must be square, got {} x {}",
            n_rows, n_cols
        )));
    }
    if let Some(((i, j), v)) = d.indexed_iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        return Err(Error::input(format!(
            "dissimilarity at ({}, {}) is {}; every pair needs a finite, non-negative value",
            i, j, v
        )));
    }
    Ok(())
}

fn single_point(n_components: usize) -> MdsResult {
    MdsResult {
        embedding: Array2::zeros((1, n_components)),
        stress: 0.0,
        n_iter: 0,
        converged: true,
    }
}

/// One seed per run, derived from a single master generator.
fn run_seeds(random_state: Option<u64>, n_runs: usize) -> Vec<u64> {
    let master_seed = random_state.unwrap_or_else(|| rand::rng().random());
    let mut master = ChaCha8Rng::seed_from_u64(master_seed);
    (0..n_runs).map(|_| master.random()).collect()
}

fn random_init(n: usize, k: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((n, k), || rng.random::<f64>())
}

pub fn embedded_distances(x: ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut out = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let diff = &x.row(i) - &x.row(j);
            let d = diff.dot(&diff).sqrt();
            out[[i, j]] = d;
            out[[j, i]] = d;
        }
    }
    out
}

/// Half the squared Frobenius distance between embedded and target distances.
pub fn raw_stress(embedded: ArrayView2<f64>, dissimilarities: ArrayView2<f64>) -> f64 {
    embedded
        .iter()
        .zip(dissimilarities.iter())
        .map(|(&a, &b)| (a - b) * (a - b))
        .sum::<f64>()
        / 2.0
}

fn smacof_single(delta: ArrayView2<f64>, mut x: Array2<f64>, max_iter: usize, eps: f64) -> MdsResult {
    let n = delta.nrows();
    let mut old_stress: Option<f64> = None;
    let mut stress = f64::INFINITY;
    let mut n_iter = 0;
    let mut converged = false;

    for it in 1..=max_iter {
        n_iter = it;
        let dis = embedded_distances(x.view());
        stress = raw_stress(dis.view(), delta);

        // Guttman transform: X <- B(X) X / n
        let mut b = Array2::zeros((n, n));
        for i in 0..n {
            let mut row_sum = 0.0;
            for j in 0..n {
                if i == j {
                    continue;
                }
                let ratio = delta[[i, j]] / dis[[i, j]].max(MIN_EMBEDDED_DISTANCE);
                b[[i, j]] = -ratio;
                row_sum += ratio;
            }
            b[[i, i]] = row_sum;
        }
        x = b.dot(&x) / n as f64;

        let norm: f64 = x.rows().into_iter().map(|r| r.dot(&r).sqrt()).sum();
        let normalized = stress / norm;
        if let Some(old) = old_stress {
            if old - normalized < eps {
                converged = true;
                break;
            }
        }
        old_stress = Some(normalized);
    }

    MdsResult {
        embedding: x,
        stress,
        n_iter,
        converged,
    }
}

/// Torgerson scaling: top eigenpairs of `-1/2 J D^2 J`, negative eigenvalues clamped to zero.
pub fn classical_embedding(delta: ArrayView2<f64>, n_components: usize) -> Array2<f64> {
    let n = delta.nrows();
    let squared = DMatrix::from_fn(n, n, |i, j| delta[[i, j]] * delta[[i, j]]);
    let row_means: Vec<f64> = (0..n).map(|i| squared.row(i).mean()).collect();
    let col_means: Vec<f64> = (0..n).map(|j| squared.column(j).mean()).collect();
    let grand_mean = squared.mean();
    let centred = DMatrix::from_fn(n, n, |i, j| {
        -0.5 * (squared[(i, j)] - row_means[i] - col_means[j] + grand_mean)
    });

    let eigen = SymmetricEigen::new(centred);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    Array2::from_shape_fn((n, n_components), |(i, k)| {
        let idx = order[k];
        let scale = eigen.eigenvalues[idx].max(0.0).sqrt();
        eigen.eigenvectors[(i, idx)] * scale
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn unit_square() -> Array2<f64> {
        let points = array![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        embedded_distances(points.view())
    }

    fn assert_distances_match(embedding: &Array2<f64>, target: &Array2<f64>, tolerance: f64) {
        let got = embedded_distances(embedding.view());
        for (a, b) in got.iter().zip(target.iter()) {
            assert_relative_eq!(*a, *b, epsilon = tolerance);
        }
    }

    #[test]
    fn test_embedded_distances() {
        let d = unit_square();
        assert_relative_eq!(d[[0, 1]], 1.0);
        assert_relative_eq!(d[[0, 2]], 2.0f64.sqrt());
        assert_eq!(d[[3, 3]], 0.0);
        assert_eq!(raw_stress(d.view(), d.view()), 0.0);
    }

    #[test]
    fn test_classical_recovers_planar_configuration() {
        let target = unit_square();
        let result = ClassicalMds.embed(target.view(), &MdsConfig::default()).unwrap();
        assert_eq!(result.embedding.dim(), (4, 2));
        assert!(result.stress < 1e-12);
        assert_distances_match(&result.embedding, &target, 1e-9);
    }

    #[test]
    fn test_smacof_from_classical_start_stays_put() {
        let target = unit_square();
        let config = MdsConfig::default().init(MdsInit::Classical);
        let result = Smacof.embed(target.view(), &config).unwrap();
        assert!(result.stress < 1e-8);
        assert_distances_match(&result.embedding, &target, 1e-6);
    }

    #[test]
    fn test_smacof_random_triangle() {
        let points = array![[0.0, 0.0], [3.0, 0.0], [0.0, 4.0]];
        let target = embedded_distances(points.view());
        let config = MdsConfig::default().max_iter(5000).eps(1e-12);
        let result = Smacof.embed(target.view(), &config).unwrap();
        assert!(result.stress < 1e-4, "stress {}", result.stress);
    }

    #[test]
    fn test_smacof_is_reproducible_with_seed() {
        let target = unit_square();
        let config = MdsConfig::default().random_state(Some(7));
        let a = Smacof.embed(target.view(), &config).unwrap();
        let b = Smacof.embed(target.view(), &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.embedding.dim(), (4, 2));
        assert!(a.n_iter >= 1 && a.n_iter <= config.max_iter);
    }

    #[test]
    fn test_unseeded_runs_still_embed() {
        let target = unit_square();
        let config = MdsConfig::default().random_state(None);
        let result = Smacof.embed(target.view(), &config).unwrap();
        assert_eq!(result.embedding.dim(), (4, 2));
        assert!(result.stress.is_finite());
    }

    #[test]
    fn test_single_point() {
        let result = Smacof.embed(array![[0.0]].view(), &MdsConfig::with_components(1)).unwrap();
        assert_eq!(result.embedding, array![[0.0]]);
        assert_eq!(result.stress, 0.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let target = unit_square();
        assert!(matches!(
            Smacof.embed(target.view(), &MdsConfig::with_components(0)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Smacof.embed(target.view(), &MdsConfig::with_components(5)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Smacof.embed(target.view(), &MdsConfig::default().n_init(0)),
            Err(Error::InvalidArgument(_))
        ));

        let mut with_gap = target.clone();
        with_gap[[0, 1]] = f64::NAN;
        with_gap[[1, 0]] = f64::NAN;
        assert!(matches!(
            Smacof.embed(with_gap.view(), &MdsConfig::default()),
            Err(Error::InvalidInput(_))
        ));

        let empty = Array2::<f64>::zeros((0, 0));
        assert!(matches!(
            ClassicalMds.embed(empty.view(), &MdsConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
