use crate::information;
use ndarray::ArrayView1;

/// Dissimilarity between two rows over the positions where both are defined.
///
/// Returns `None` when the rows share no comparable observation.
pub trait DissimilarityMeasure: Sync {
    fn calculate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64>;
}

pub struct EuclideanDistance;

impl DissimilarityMeasure for EuclideanDistance {
    fn calculate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
        let mut squared_dist = 0.0;
        let mut shared = 0usize;
        for (&x, &y) in a.iter().zip(b.iter()) {
            if x.is_nan() || y.is_nan() {
                continue;
            }
            let diff = x - y;
            squared_dist += diff * diff;
            shared += 1;
        }
        (shared > 0).then(|| squared_dist.sqrt())
    }
}

/// Variation of information between rows holding category codes (`1, 2, ...`, `NaN` = missing).
pub struct VariationOfInformation {
    log_base: f64,
}

impl VariationOfInformation {
    pub fn new(log_base: f64) -> Self {
        Self { log_base }
    }
}

impl Default for VariationOfInformation {
    fn default() -> Self {
        Self {
            log_base: information::DEFAULT_LOG_BASE,
        }
    }
}

impl DissimilarityMeasure for VariationOfInformation {
    fn calculate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
        let to_codes = |row: ArrayView1<f64>| -> Vec<Option<u32>> {
            row.iter()
                .map(|&v| (!v.is_nan()).then_some(v as u32))
                .collect()
        };
        information::variation_of_information(&to_codes(a), &to_codes(b), self.log_base)
    }
}

/// Legacy symmetrised KL divergence between softmax-normalised rows.
pub struct SymmetricKlDivergence;

impl DissimilarityMeasure for SymmetricKlDivergence {
    fn calculate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
        information::symmetric_kl(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_euclidean_distance() {
        let a = array![1.0, 1.0, 1.0, 1.0];
        let b = array![1.0, 2.0, 3.0, 4.0];
        let result = EuclideanDistance.calculate(a.view(), b.view()).unwrap();
        assert_relative_eq!(result, 14.0f64.sqrt());
    }

    #[test]
    fn test_euclidean_skips_missing() {
        let a = array![0.0, f64::NAN, 3.0];
        let b = array![4.0, 1.0, f64::NAN];
        assert_relative_eq!(EuclideanDistance.calculate(a.view(), b.view()).unwrap(), 4.0);

        let c = array![f64::NAN, 2.0, f64::NAN];
        assert_eq!(EuclideanDistance.calculate(a.view(), c.view()), None);
    }

    #[test]
    fn test_variation_of_information_codes() {
        let a = array![1.0, 1.0, 2.0, 2.0];
        let b = array![1.0, 2.0, 1.0, 2.0];
        let vi = VariationOfInformation::default();
        assert_relative_eq!(vi.calculate(a.view(), b.view()).unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(vi.calculate(a.view(), a.view()).unwrap(), 0.0, epsilon = 1e-12);

        let nats = VariationOfInformation::new(std::f64::consts::E);
        assert_relative_eq!(
            nats.calculate(a.view(), b.view()).unwrap(),
            2.0 * 2.0f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_symmetric_kl_divergence() {
        let a = array![3.0, 0.0, 0.0];
        let b = array![0.0, 0.0, 3.0];
        let d = SymmetricKlDivergence.calculate(a.view(), b.view()).unwrap();
        assert!(d > 0.0);
        assert_relative_eq!(d, SymmetricKlDivergence.calculate(b.view(), a.view()).unwrap(), epsilon = 1e-12);
    }
}
