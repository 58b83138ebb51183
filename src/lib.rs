//! Relatedness analysis of tabular data: row-adaptive discretization, pairwise Euclidean or
//! information distances, and MDS layouts of the resulting dissimilarity matrix.

pub mod config;
pub mod discretize;
pub mod distance;
mod error;
pub mod information;
pub mod io;
pub mod mds;
pub mod pipeline;
pub mod reduction;
pub mod table;
mod utils;

pub use config::RelevanceConfig;
pub use discretize::{discretize, discretize_with, DiscretizeConfig, ValueSpace};
pub use distance::{compute_distance, compute_distance_with, DistanceConfig, DistanceMethod};
pub use error::{Error, Result};
pub use io::{load_table, save_table};
pub use mds::{ClassicalMds, MdsConfig, MdsInit, MdsSolver, Smacof};
pub use pipeline::{Pipeline, PipelineOutput};
pub use reduction::{reduce, reduce_with};
pub use table::{CoordinateTable, DiscretizedTable, DissimilarityMatrix, Table};
pub use utils::{DefinedValues, RowMoments};
