//! Sequencing of the three stages. Every intermediate result is returned to the caller;
//! nothing is cached between runs.

use crate::config::RelevanceConfig;
use crate::discretize::discretize_with;
use crate::distance::compute_distance_with;
use crate::error::Result;
use crate::mds::{MdsSolver, Smacof};
use crate::reduction::reduce_with;
use crate::table::{CoordinateTable, DiscretizedTable, DissimilarityMatrix, Table};
use log::info;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub discretized: DiscretizedTable,
    pub distance: DissimilarityMatrix,
    pub coordinates: CoordinateTable,
}

pub struct Pipeline<S: MdsSolver = Smacof> {
    config: RelevanceConfig,
    solver: S,
}

impl Pipeline<Smacof> {
    pub fn new(config: RelevanceConfig) -> Self {
        Pipeline {
            config,
            solver: Smacof,
        }
    }
}

impl<S: MdsSolver> Pipeline<S> {
    pub fn with_solver(config: RelevanceConfig, solver: S) -> Self {
        Pipeline { config, solver }
    }

    pub fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    /// Discretizes, measures and embeds `table`. Fails before any stage runs if the
    /// configuration is invalid. The `discretize` section sets the kernel of both stages.
    pub fn run(&self, table: &Table) -> Result<PipelineOutput> {
        self.config.validate()?;
        let discretized = discretize_with(table, &self.config.discretize)?;
        let distance = compute_distance_with(table, &self.config.pipeline_distance())?;
        let coordinates = reduce_with(&distance, &self.config.mds, &self.solver)?;
        info!(
            "Pipeline finished: {} rows, {} distance, stress {:.6}",
            table.nrows(),
            self.config.distance.method,
            coordinates.stress()
        );
        Ok(PipelineOutput {
            discretized,
            distance,
            coordinates,
        })
    }
}
