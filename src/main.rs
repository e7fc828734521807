use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "qcflow")]
#[command(version, about = "Workflow tracking for quantum-chemistry calculations")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the shared workflow store. Overrides QCFLOW_DB and qcflow.toml.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a workflow for a run directory (done by the job launcher)
    Register {
        /// Run directory to register. Defaults to the current directory.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Extra attributes to attach, as key=value pairs
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },
    /// Report the current stage of the workflow owning this directory
    Report {
        /// Status message, e.g. "optimizing" or "failed at step 3"
        message: String,

        /// Directory to resolve. Defaults to the current directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print which workflow owns a directory
    Resolve {
        /// Directory to resolve. Defaults to the current directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List all tracked workflows
    List,
    /// Show one workflow record as JSON
    Show {
        /// Workflow hash, as printed by `register` and `list`
        hash: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = qcflow::config::Config::new(cli.db.clone())?;

    match &cli.command {
        Commands::Register { dir, attrs } => cmd::cmd_register(&config, dir.as_deref(), attrs)?,
        Commands::Report { message, dir } => cmd::cmd_report(&config, dir.as_deref(), message)?,
        Commands::Resolve { dir } => cmd::cmd_resolve(&config, dir.as_deref())?,
        Commands::List => cmd::cmd_list(&config)?,
        Commands::Show { hash } => cmd::cmd_show(&config, hash)?,
    }

    Ok(())
}

/// Warnings go to stderr: `report` promises that everything on stdout was
/// printed by the host computation, in order.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "qcflow=debug" } else { "qcflow=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
