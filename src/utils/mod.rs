use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use statrs::statistics::Statistics;

/// Mean and sample standard deviation over the defined entries of a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMoments {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl RowMoments {
    /// True when every defined value is equal, or the spread is below the rounding error of
    /// the row's own largest magnitude. Scale-free: a row and any rescaled or shifted copy of
    /// it that `f64` still resolves get the same answer.
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max || self.std_dev <= f64::EPSILON * self.min.abs().max(self.max.abs())
    }
}

pub trait DefinedValues {
    /// Entries that are not missing, in their original order.
    fn defined(&self) -> Vec<f64>;

    /// `None` when the row has no defined entry at all.
    fn moments(&self) -> Option<RowMoments>;
}

impl DefinedValues for ArrayView1<'_, f64> {
    fn defined(&self) -> Vec<f64> {
        self.iter().copied().filter(|v| !v.is_nan()).collect()
    }

    fn moments(&self) -> Option<RowMoments> {
        let values = self.defined();
        match values.len() {
            0 => None,
            1 => Some(RowMoments {
                mean: values[0],
                std_dev: 0.0,
                min: values[0],
                max: values[0],
                count: 1,
            }),
            count => Some(RowMoments {
                mean: values.iter().mean(),
                std_dev: values.iter().std_dev(),
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                count,
            }),
        }
    }
}

pub trait StandardizeRows {
    /// Z-scores every row against its own moments. Constant rows become zeros,
    /// missing entries stay missing.
    fn standardize_rows(&self) -> Array2<f64>;
}

impl StandardizeRows for ArrayView2<'_, f64> {
    fn standardize_rows(&self) -> Array2<f64> {
        let mut out = self.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            let Some(m) = row.view().moments() else {
                continue;
            };
            let degenerate = m.is_degenerate();
            row.mapv_inplace(|v| {
                if v.is_nan() {
                    v
                } else if degenerate {
                    0.0
                } else {
                    (v - m.mean) / m.std_dev
                }
            });
        }
        out
    }
}
