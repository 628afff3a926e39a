mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{batch::BatchSubcommand, job::JobSubcommand, template::TemplateSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flowforge",
    about = "Materialize flow templates into per-site task graphs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .flowforge/)
    #[arg(long, global = true, env = "FLOWFORGE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .flowforge/ with a default config and a sample template
    Init,

    /// Inspect and edit flow templates
    Template {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Materialize a template for explicit site groups
    Materialize(cmd::materialize::MaterializeArgs),

    /// Submit tabular batches
    Batch {
        #[command(subcommand)]
        subcommand: BatchSubcommand,
    },

    /// Inspect batch jobs
    Job {
        #[command(subcommand)]
        subcommand: JobSubcommand,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "3141")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Template { subcommand } => cmd::template::run(&root, subcommand, cli.json),
        Commands::Materialize(args) => cmd::materialize::run(&root, args, cli.json),
        Commands::Batch { subcommand } => cmd::batch::run(&root, subcommand, cli.json),
        Commands::Job { subcommand } => cmd::job::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
