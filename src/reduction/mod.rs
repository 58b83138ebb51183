use crate::error::{Error, Result};
use crate::mds::{MdsConfig, MdsSolver, Smacof};
use crate::table::{CoordinateTable, DissimilarityMatrix, Table};
use log::{debug, info};
use std::time::Instant;

/// Column names of the coordinate table: `x`, `y`, then `dim_3`, `dim_4`, ...
pub fn axis_labels(n_components: usize) -> Vec<String> {
    (0..n_components)
        .map(|k| match k {
            0 => "x".to_string(),
            1 => "y".to_string(),
            _ => format!("dim_{}", k + 1),
        })
        .collect()
}

/// Embeds the rows of `dissimilarity` with metric SMACOF.
pub fn reduce(dissimilarity: &DissimilarityMatrix, n_components: usize, random_state: Option<u64>) -> Result<CoordinateTable> {
    let config = MdsConfig::with_components(n_components).random_state(random_state);
    reduce_with(dissimilarity, &config, &Smacof)
}

pub fn reduce_with<S: MdsSolver>(dissimilarity: &DissimilarityMatrix, config: &MdsConfig, solver: &S) -> Result<CoordinateTable> {
    if dissimilarity.is_empty() {
        return Err(Error::input("dissimilarity matrix is empty"));
    }
    config.validate_for(dissimilarity.len())?;
    if let Some((a, b)) = dissimilarity.undefined_pairs().first() {
        return Err(Error::input(format!(
            "dissimilarity between '{}' and '{}' is undefined; MDS needs every pair",
            a, b
        )));
    }

    debug!(
        "Reducing {} x {} dissimilarity matrix to {} components",
        dissimilarity.len(),
        dissimilarity.len(),
        config.n_components
    );
    let started = Instant::now();
    let result = solver.embed(dissimilarity.values(), config)?;

    let table = Table::new(
        dissimilarity.labels().to_vec(),
        axis_labels(config.n_components),
        result.embedding,
    )?;
    info!(
        "Embedded {} rows in {} dimensions (stress {:.6}) in {:?}",
        table.nrows(),
        table.ncols(),
        result.stress,
        started.elapsed()
    );
    Ok(CoordinateTable::new(table, result.stress))
}
