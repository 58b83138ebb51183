use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use relevance_algebra::{
    compute_distance_with, discretize_with, load_table, reduce_with, save_table, DissimilarityMatrix, MdsInit,
    Pipeline, RelevanceConfig, Smacof, ValueSpace,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Discretize tables, measure row relatedness and lay rows out in the plane
#[derive(Parser, Debug)]
#[command(name = "relevance")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// JSON file with pipeline settings; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Snap each row onto its own Gaussian-kernel levels
    Discretize {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        kernel: KernelArgs,
        /// Report levels in the row's original units instead of standard scores
        #[arg(long)]
        original_scale: bool,
    },
    /// Compute the pairwise dissimilarity matrix between rows
    Distance {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        distance: DistanceArgs,
    },
    /// Embed a saved dissimilarity matrix with MDS
    Reduce {
        matrix: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        mds: MdsArgs,
    },
    /// Discretize, measure and embed in one go
    Run {
        input: PathBuf,
        /// Directory receiving discretized.csv, distance.csv and coordinates.csv
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long)]
        original_scale: bool,
        #[command(flatten)]
        distance: DistanceArgs,
        #[command(flatten)]
        mds: MdsArgs,
    },
}

#[derive(Args, Debug)]
struct KernelArgs {
    /// Gaussian kernel width
    #[arg(long)]
    sigma: Option<f64>,
    /// Number of discretization levels
    #[arg(long)]
    bins: Option<usize>,
}

#[derive(Args, Debug)]
struct DistanceArgs {
    /// euclidean, information (vi) or symmetric-kl
    #[arg(long)]
    method: Option<String>,
    #[command(flatten)]
    kernel: KernelArgs,
    /// Logarithm base of the entropies
    #[arg(long)]
    log_base: Option<f64>,
    /// Z-score rows before Euclidean distance
    #[arg(long)]
    standardize: bool,
}

#[derive(Args, Debug)]
struct MdsArgs {
    /// Number of embedding dimensions
    #[arg(long)]
    components: Option<usize>,
    /// Seed of the solver's random initialisation
    #[arg(long, conflicts_with = "no_seed")]
    seed: Option<u64>,
    /// Draw a fresh seed on every run
    #[arg(long)]
    no_seed: bool,
    #[arg(long)]
    n_init: Option<usize>,
    #[arg(long)]
    max_iter: Option<usize>,
    /// Start from classical MDS instead of random coordinates
    #[arg(long)]
    classical_init: bool,
}

impl KernelArgs {
    fn apply(&self, sigma: &mut f64, bins: &mut usize) {
        if let Some(s) = self.sigma {
            *sigma = s;
        }
        if let Some(b) = self.bins {
            *bins = b;
        }
    }
}

impl DistanceArgs {
    fn apply(&self, config: &mut RelevanceConfig) -> Result<()> {
        let distance = &mut config.distance;
        if let Some(method) = &self.method {
            distance.method = method.parse()?;
        }
        self.kernel.apply(&mut distance.sigma, &mut distance.bins);
        if let Some(base) = self.log_base {
            distance.log_base = base;
        }
        if self.standardize {
            distance.standardize = true;
        }
        Ok(())
    }
}

impl MdsArgs {
    fn apply(&self, config: &mut RelevanceConfig) {
        let mds = &mut config.mds;
        if let Some(k) = self.components {
            mds.n_components = k;
        }
        if self.no_seed {
            mds.random_state = None;
        } else if let Some(seed) = self.seed {
            mds.random_state = Some(seed);
        }
        if let Some(n) = self.n_init {
            mds.n_init = n;
        }
        if let Some(n) = self.max_iter {
            mds.max_iter = n;
        }
        if self.classical_init {
            mds.init = MdsInit::Classical;
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RelevanceConfig> {
    match path {
        Some(path) => RelevanceConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(RelevanceConfig::default()),
    }
}

fn value_space(original_scale: bool, configured: ValueSpace) -> ValueSpace {
    if original_scale {
        ValueSpace::OriginalScale
    } else {
        configured
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str())).init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Discretize {
            input,
            output,
            kernel,
            original_scale,
        } => {
            kernel.apply(&mut config.discretize.sigma, &mut config.discretize.bins);
            config.discretize.value_space = value_space(original_scale, config.discretize.value_space);

            let table = load_table(&input).with_context(|| format!("loading {}", input.display()))?;
            let discretized = discretize_with(&table, &config.discretize)?;
            save_table(discretized.table(), &output).with_context(|| format!("saving {}", output.display()))?;
        }
        Command::Distance {
            input,
            output,
            distance,
        } => {
            distance.apply(&mut config)?;

            let table = load_table(&input).with_context(|| format!("loading {}", input.display()))?;
            let matrix = compute_distance_with(&table, &config.distance)?;
            save_table(matrix.table(), &output).with_context(|| format!("saving {}", output.display()))?;
        }
        Command::Reduce { matrix, output, mds } => {
            mds.apply(&mut config);

            let table = load_table(&matrix).with_context(|| format!("loading {}", matrix.display()))?;
            let matrix = DissimilarityMatrix::from_table(table)?;
            let coordinates = reduce_with(&matrix, &config.mds, &Smacof)?;
            save_table(coordinates.table(), &output).with_context(|| format!("saving {}", output.display()))?;
        }
        Command::Run {
            input,
            out_dir,
            original_scale,
            distance,
            mds,
        } => {
            // The pipeline reads its kernel from the discretize section
            distance.apply(&mut config)?;
            distance.kernel.apply(&mut config.discretize.sigma, &mut config.discretize.bins);
            mds.apply(&mut config);
            config.discretize.value_space = value_space(original_scale, config.discretize.value_space);

            let table = load_table(&input).with_context(|| format!("loading {}", input.display()))?;
            let output = Pipeline::new(config).run(&table)?;

            fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
            save_table(output.discretized.table(), &out_dir.join("discretized.csv"))?;
            save_table(output.distance.table(), &out_dir.join("distance.csv"))?;
            save_table(output.coordinates.table(), &out_dir.join("coordinates.csv"))?;
            info!("Wrote results to {}", out_dir.display());
        }
    }

    Ok(())
}
