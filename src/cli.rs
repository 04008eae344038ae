//! Command-line surface over the model-fitting core. Kept deliberately thin
//! and synchronous: library modules never depend on anything defined here.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "statismo-core",
    version,
    about = "Point distribution model fitting: PCA, posterior conditioning, variance reduction"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit a PCA model from a directory of whitespace/csv sample vector files.
    BuildPca {
        #[arg(short = 's', long = "samples", required = true)]
        samples: PathBuf,

        #[arg(long = "noise-variance", default_value_t = 0.0)]
        noise_variance: f64,

        #[arg(long = "method", default_value = "jacobi")]
        method: String,

        #[arg(long = "scores", default_value_t = false)]
        scores: bool,

        #[arg(short = 'o', long = "output", required = true)]
        output: PathBuf,
    },

    /// Condition a saved model on known point values.
    Condition {
        #[arg(short = 'm', long = "model", required = true)]
        model: PathBuf,

        /// `point=value` pairs, e.g. `0=1.5 2=-0.3`.
        #[arg(short = 'c', long = "constraint", required = true, num_args = 1..)]
        constraint: Vec<String>,

        #[arg(long = "noise-variance", default_value_t = 1e-4)]
        noise_variance: f64,

        #[arg(short = 'o', long = "output", required = true)]
        output: PathBuf,
    },

    /// Trim a saved model down to its leading components.
    Reduce {
        #[arg(short = 'm', long = "model", required = true)]
        model: PathBuf,

        #[arg(long = "variance")]
        variance: Option<f64>,

        #[arg(long = "components")]
        components: Option<usize>,

        #[arg(short = 'o', long = "output", required = true)]
        output: PathBuf,
    },

    /// Print a saved model's provenance and shape.
    Info {
        #[arg(short = 'm', long = "model", required = true)]
        model: PathBuf,
    },
}
