use std::path::PathBuf;

use chipet::commands::{self, OptimizeOptions};
use chipet::init_logging;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chipet")]
#[command(about = "Parameter-sweep simulation campaigns with particle swarm search")]
struct Args {
    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create one simulation directory per parameter combination
    Create {
        /// Campaign YAML file
        config: PathBuf,

        /// Directory receiving the simulations
        #[arg(short, long, default_value = ".")]
        run_dir: PathBuf,

        /// One directory per particle instead of the full cartesian product
        #[arg(long)]
        shotgun: bool,
    },

    /// Run particle swarm generations against the analysis tool
    Optimize {
        /// Campaign YAML file
        config: PathBuf,

        #[arg(short, long, default_value = ".")]
        run_dir: PathBuf,

        #[arg(short, long, default_value_t = 1)]
        generations: usize,

        /// Continue from the snapshot instead of seeding a new swarm
        #[arg(long)]
        resume: bool,

        /// Snapshot path (default: <run_dir>/swarm.json)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// File of `particle value...` rows overriding initial positions
        #[arg(long)]
        bias: Option<PathBuf>,

        /// Score with synthetic Gaussian bumps instead of the analysis tool
        #[arg(long)]
        mock: bool,
    },

    /// List seed directories with pending stages
    Status {
        /// Simulation directories (database .txt files are skipped)
        #[arg(required = true)]
        sim_dirs: Vec<PathBuf>,

        /// Only count these stages
        #[arg(short, long = "state")]
        states: Vec<String>,
    },
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Command::Create {
            config,
            run_dir,
            shotgun,
        } => {
            init_logging(Some(run_dir.as_path()), &args.log_level)?;
            commands::create(&config, &run_dir, shotgun)?;
        }
        Command::Optimize {
            config,
            run_dir,
            generations,
            resume,
            snapshot,
            bias,
            mock,
        } => {
            init_logging(Some(run_dir.as_path()), &args.log_level)?;
            let options = OptimizeOptions {
                generations,
                resume,
                snapshot,
                bias,
                mock,
            };
            commands::optimize(&config, &run_dir, &options)?;
        }
        Command::Status { sim_dirs, states } => {
            init_logging(None, &args.log_level)?;
            commands::status(&sim_dirs, &states)?;
        }
    }

    tracing::debug!("chipet shutting down");
    Ok(())
}
