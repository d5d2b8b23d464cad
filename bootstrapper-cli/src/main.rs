//! `bootstrapper` binary: synthesizes a GitOps deployment repository.
//!
//! # Usage
//!
//! ```text
//! bootstrapper manage-deployment-repo <config> --git-config <file> [--ocm-config <file>]
//!     [--kubeconfig <file>] [--extra-manifest-dir <dir>] [--kustomization-patches <file>]
//!     [--disable-git-push] [--disable-kustomization-apply] [--dry-run]
//!     [--print-kustomized] [--commit-message <msg>] [--apply-all-manifests]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::manage_repo::ManageRepoArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "bootstrapper",
    version,
    about = "Bootstrap GitOps deployment repositories for openMCP landscapes",
    long_about = None,
)]
struct Cli {
    /// Default log level; `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the deployment repository for one environment, push it and
    /// apply the sync controller Kustomizations to the target cluster.
    ManageDeploymentRepo(ManageRepoArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    match cli.command {
        Commands::ManageDeploymentRepo(args) => args.run(),
    }
}

fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
