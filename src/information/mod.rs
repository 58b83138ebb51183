//! Entropy-based measures over discretized rows.

use ahash::AHashMap;
use ndarray::{Array2, ArrayView1};

/// Default logarithm base for entropies (bits).
pub const DEFAULT_LOG_BASE: f64 = 2.0;

/// Re-encodes a row's discrete values as categories `1, 2, ...` in order of first appearance.
/// Missing entries stay `None`. The encoding is local to the row.
pub fn encode_categories(row: ArrayView1<f64>) -> Vec<Option<u32>> {
    let mut codes: AHashMap<u64, u32> = AHashMap::new();
    row.iter()
        .map(|&v| {
            if v.is_nan() {
                return None;
            }
            // -0.0 and 0.0 are the same level
            let key = if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
            let next = codes.len() as u32 + 1;
            Some(*codes.entry(key).or_insert(next))
        })
        .collect()
}

/// Shannon entropy of a frequency distribution in the given logarithm base.
pub fn entropy_from_counts<I>(counts: I, log_base: f64) -> f64
where
    I: IntoIterator<Item = usize>,
{
    let counts: Vec<usize> = counts.into_iter().filter(|&c| c > 0).collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let h: f64 = counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum();
    h / log_base.ln()
}

/// Joint frequency table of two category sequences observed at the same positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable {
    counts: Array2<usize>,
    total: usize,
}

impl ContingencyTable {
    /// Categories are expected to start at `1`, as produced by [`encode_categories`].
    pub fn from_pairs(pairs: &[(u32, u32)]) -> Self {
        let kx = pairs.iter().map(|&(x, _)| x).max().unwrap_or(0) as usize;
        let ky = pairs.iter().map(|&(_, y)| y).max().unwrap_or(0) as usize;
        let mut counts = Array2::zeros((kx, ky));
        for &(x, y) in pairs {
            counts[[x as usize - 1, y as usize - 1]] += 1;
        }
        ContingencyTable {
            counts,
            total: pairs.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn entropy_x(&self, log_base: f64) -> f64 {
        entropy_from_counts(self.counts.rows().into_iter().map(|r| r.sum()), log_base)
    }

    pub fn entropy_y(&self, log_base: f64) -> f64 {
        entropy_from_counts(self.counts.columns().into_iter().map(|c| c.sum()), log_base)
    }

    pub fn joint_entropy(&self, log_base: f64) -> f64 {
        entropy_from_counts(self.counts.iter().copied(), log_base)
    }

    /// `VI = 2 H(X,Y) - H(X) - H(Y)`, clamped at zero against rounding.
    pub fn variation_of_information(&self, log_base: f64) -> f64 {
        let vi = 2.0 * self.joint_entropy(log_base) - self.entropy_x(log_base) - self.entropy_y(log_base);
        vi.max(0.0)
    }
}

/// Variation of information between two encoded rows over their pairwise-complete positions.
/// `None` when no position is defined in both.
pub fn variation_of_information(x: &[Option<u32>], y: &[Option<u32>], log_base: f64) -> Option<f64> {
    let pairs: Vec<(u32, u32)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    Some(ContingencyTable::from_pairs(&pairs).variation_of_information(log_base))
}

/// Numerically stable softmax.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Kullback-Leibler divergence `KL(p || q)` in nats. Infinite when `q` vanishes where `p` does not.
pub fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .map(|(&pi, &qi)| {
            if pi <= 0.0 {
                0.0
            } else if qi <= 0.0 {
                f64::INFINITY
            } else {
                pi * (pi / qi).ln()
            }
        })
        .sum()
}

/// `0.5 * (KL(p||q) + KL(q||p))` between the softmax-normalised pairwise-complete entries of two rows.
pub fn symmetric_kl(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .unzip();
    if xs.is_empty() {
        return None;
    }
    let p = softmax(&xs);
    let q = softmax(&ys);
    Some(0.5 * (kl_divergence(&p, &q) + kl_divergence(&q, &p)))
}
