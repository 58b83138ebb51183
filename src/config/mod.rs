use crate::discretize::DiscretizeConfig;
use crate::distance::DistanceConfig;
use crate::error::{Error, Result};
use crate::mds::MdsConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for every stage of the pipeline. Missing sections and fields take their defaults.
///
/// ```json
/// {
///   "discretize": { "sigma": 1.0, "bins": 13, "value_space": "original-scale" },
///   "distance": { "method": "information", "log_base": 2.0 },
///   "mds": { "n_components": 2, "random_state": 42 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelevanceConfig {
    pub discretize: DiscretizeConfig,
    pub distance: DistanceConfig,
    pub mds: MdsConfig,
}

impl RelevanceConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: RelevanceConfig =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Distance settings with the kernel taken from the `discretize` section, so the pipeline's
    /// information distances measure the same partition it reports as discretized.
    pub fn pipeline_distance(&self) -> DistanceConfig {
        DistanceConfig {
            sigma: self.discretize.sigma,
            bins: self.discretize.bins,
            ..self.distance.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.discretize.validate()?;
        self.distance.validate()?;
        self.mds.validate()
    }
}
