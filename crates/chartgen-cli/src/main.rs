//! chartgen CLI - Helm charts from rendered Kubernetes manifests

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "chartgen")]
#[command(author = "chartgen Contributors")]
#[command(version)]
#[command(about = "Generate Helm charts from rendered Kubernetes manifests", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a Helm chart
    Generate {
        /// Chart configuration file
        #[arg(short, long, default_value = "chartgen.yaml")]
        config: PathBuf,

        /// Manifest files, or directories searched for *.yml/*.yaml files
        #[arg(short, long = "manifests", required = true)]
        manifests: Vec<PathBuf>,

        /// Directory holding user chart files (templates, values.yaml, README.md, ...)
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// Output directory; the chart is written to <output-dir>/<name>
        #[arg(short, long, default_value = "target/helm")]
        output_dir: PathBuf,

        /// Chart version used when the configuration sets none
        #[arg(long, env = "CHARTGEN_DEFAULT_VERSION", default_value = "0.1.0")]
        default_version: String,

        /// Package the chart into an archive
        #[arg(long)]
        package: bool,

        /// Do not run `helm dependency build` for declared dependencies
        #[arg(long)]
        skip_dependency_build: bool,

        /// Print the produced artifacts as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Generate {
            config,
            manifests,
            input_dir,
            output_dir,
            default_version,
            package,
            skip_dependency_build,
            json,
        } => commands::generate::run(&commands::generate::GenerateArgs {
            config,
            manifests,
            input_dir,
            output_dir,
            default_version,
            package,
            skip_dependency_build,
            json,
        }),
    }
}
