//! # Labeled tables
//!
//! Every pipeline stage consumes and produces a [`Table`]: a dense `f64` matrix with string
//! labels on both axes. Missing observations are stored in-band as `NaN`.
//!
//! The stage outputs are wrapped in newtypes that carry their extra invariants:
//! - [`DiscretizedTable`]: levels drawn from a per-row set of `bins` centres
//! - [`DissimilarityMatrix`]: square, symmetric, identical axis labels
//! - [`CoordinateTable`]: one row per matrix row, one column per embedding axis

use crate::discretize::ValueSpace;
use crate::error::{Error, Result};
use ahash::AHashSet;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Absolute tolerance used when checking a loaded dissimilarity matrix for symmetry.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    values: Array2<f64>,
}

impl Table {
    pub fn new(row_labels: Vec<String>, col_labels: Vec<String>, values: Array2<f64>) -> Result<Self> {
        let (n_rows, n_cols) = values.dim();
        if n_rows == 0 || n_cols == 0 {
            return Err(Error::input(format!(
                "table is empty ({} rows x {} columns)",
                n_rows, n_cols
            )));
        }
        if row_labels.len() != n_rows {
            return Err(Error::input(format!(
                "{} row labels for {} rows",
                row_labels.len(),
                n_rows
            )));
        }
        if col_labels.len() != n_cols {
            return Err(Error::input(format!(
                "{} column labels for {} columns",
                col_labels.len(),
                n_cols
            )));
        }

        let mut seen = AHashSet::with_capacity(n_rows);
        for label in &row_labels {
            if !seen.insert(label.as_str()) {
                return Err(Error::input(format!("duplicate row label '{}'", label)));
            }
        }

        if let Some(((i, j), v)) = values.indexed_iter().find(|(_, v)| v.is_infinite()) {
            return Err(Error::input(format!(
                "non-numeric value {} at row '{}', column '{}'",
                v, row_labels[i], col_labels[j]
            )));
        }

        Ok(Table {
            row_labels,
            col_labels,
            values,
        })
    }

    /// Builds a table from labeled rows, rejecting ragged input. Columns are labeled `0..m`.
    pub fn from_rows<S: Into<String>>(rows: Vec<(S, Vec<f64>)>) -> Result<Self> {
        let n_cols = rows.first().map(|(_, r)| r.len()).unwrap_or(0);
        let mut row_labels = Vec::with_capacity(rows.len());
        let mut flat = Vec::with_capacity(rows.len() * n_cols);

        for (label, row) in rows {
            let label = label.into();
            if row.len() != n_cols {
                return Err(Error::input(format!(
                    "row '{}' has {} values, expected {}",
                    label,
                    row.len(),
                    n_cols
                )));
            }
            row_labels.push(label);
            flat.extend(row);
        }

        let values = Array2::from_shape_vec((row_labels.len(), n_cols), flat)
            .map_err(|e| Error::input(e.to_string()))?;
        Table::new(row_labels, index_labels(n_cols), values)
    }

    /// Labels rows and columns by position.
    pub fn with_default_labels(values: Array2<f64>) -> Result<Self> {
        let (n_rows, n_cols) = values.dim();
        Table::new(index_labels(n_rows), index_labels(n_cols), values)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    pub fn row_index(&self, label: &str) -> Option<usize> {
        self.row_labels.iter().position(|l| l == label)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get((row, col)).copied()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<String>, Array2<f64>) {
        (self.row_labels, self.col_labels, self.values)
    }

    /// Fails when some row has no defined value, since nothing about it can be measured.
    pub(crate) fn ensure_rows_observed(&self) -> Result<()> {
        for (i, row) in self.values.rows().into_iter().enumerate() {
            if row.iter().all(|v| v.is_nan()) {
                return Err(Error::input(format!(
                    "row '{}' has no defined values",
                    self.row_labels[i]
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn index_labels(n: usize) -> Vec<String> {
    (0..n).map(|i| i.to_string()).collect()
}

/// A table whose entries were snapped to row-specific representative levels.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretizedTable {
    table: Table,
    levels: Array2<Option<u32>>,
    bins: usize,
    value_space: ValueSpace,
}

impl DiscretizedTable {
    pub(crate) fn new(table: Table, levels: Array2<Option<u32>>, bins: usize, value_space: ValueSpace) -> Self {
        debug_assert_eq!(table.dim(), levels.dim());
        DiscretizedTable {
            table,
            levels,
            bins,
            value_space,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.table.values()
    }

    /// Index of the centre each entry was assigned to; `None` where the input was missing.
    ///
    /// Constant rows record the middle index `(bins - 1) / 2` while their value is standard
    /// score 0. For an even `bins` that index is nominal: its centre is not 0.
    pub fn levels(&self) -> ArrayView2<'_, Option<u32>> {
        self.levels.view()
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn value_space(&self) -> ValueSpace {
        self.value_space
    }
}

/// Square matrix of pairwise dissimilarities between the rows of a source table.
///
/// `NaN` marks a pair of rows that share no comparable observation.
#[derive(Debug, Clone, PartialEq)]
pub struct DissimilarityMatrix {
    table: Table,
}

impl DissimilarityMatrix {
    pub(crate) fn from_labeled(labels: Vec<String>, values: Array2<f64>) -> Result<Self> {
        let table = Table::new(labels.clone(), labels, values)?;
        Ok(DissimilarityMatrix { table })
    }

    /// Validates a table (for instance a previously saved matrix) as a dissimilarity matrix.
    pub fn from_table(table: Table) -> Result<Self> {
        let (n_rows, n_cols) = table.dim();
        if n_rows != n_cols {
            return Err(Error::input(format!(
                "dissimilarity matrix must be square, got {} x {}",
                n_rows, n_cols
            )));
        }
        if table.row_labels() != table.col_labels() {
            return Err(Error::input(
                "dissimilarity matrix row and column labels differ",
            ));
        }

        let values = table.values();
        for i in 0..n_rows {
            if values[[i, i]] != 0.0 {
                return Err(Error::input(format!(
                    "dissimilarity of '{}' with itself is {}, expected 0",
                    table.row_labels()[i],
                    values[[i, i]]
                )));
            }
            for j in (i + 1)..n_cols {
                let (a, b) = (values[[i, j]], values[[j, i]]);
                if a.is_nan() != b.is_nan() || (!a.is_nan() && (a - b).abs() > SYMMETRY_TOLERANCE) {
                    return Err(Error::input(format!(
                        "dissimilarity matrix is not symmetric at ('{}', '{}')",
                        table.row_labels()[i],
                        table.row_labels()[j]
                    )));
                }
                if a < 0.0 {
                    return Err(Error::input(format!(
                        "negative dissimilarity {} at ('{}', '{}')",
                        a,
                        table.row_labels()[i],
                        table.row_labels()[j]
                    )));
                }
            }
        }

        Ok(DissimilarityMatrix { table })
    }

    pub fn len(&self) -> usize {
        self.table.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.table.nrows() == 0
    }

    pub fn labels(&self) -> &[String] {
        self.table.row_labels()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.table.values()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.table.get(i, j)
    }

    /// Looks a dissimilarity up by row labels.
    pub fn between(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.table.row_index(a)?;
        let j = self.table.row_index(b)?;
        self.table.get(i, j)
    }

    /// Label pairs `(a, b)` with `a` before `b` whose dissimilarity is undefined.
    pub fn undefined_pairs(&self) -> Vec<(&str, &str)> {
        let labels = self.labels();
        let values = self.values();
        let mut pairs = Vec::new();
        for i in 0..labels.len() {
            for j in i..labels.len() {
                if values[[i, j]].is_nan() {
                    pairs.push((labels[i].as_str(), labels[j].as_str()));
                }
            }
        }
        pairs
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Low-dimensional coordinates for each row of a dissimilarity matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateTable {
    table: Table,
    stress: f64,
}

impl CoordinateTable {
    pub(crate) fn new(table: Table, stress: f64) -> Self {
        CoordinateTable { table, stress }
    }

    pub fn n_components(&self) -> usize {
        self.table.ncols()
    }

    pub fn labels(&self) -> &[String] {
        self.table.row_labels()
    }

    pub fn axis_labels(&self) -> &[String] {
        self.table.col_labels()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.table.values()
    }

    /// Raw stress of the embedding the coordinates came from.
    pub fn stress(&self) -> f64 {
        self.stress
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}
