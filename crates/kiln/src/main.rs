//! Kiln - machine image builder for Google Compute Engine
//!
//! Main entry point for the Kiln CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

use commands::{build, plan, validate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Kiln - machine image builder for Google Compute Engine
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a build template for errors
    Validate(validate::ValidateArgs),

    /// Show the steps a build would run
    Plan(plan::PlanArgs),

    /// Run a build against the in-memory compute backend
    Build(build::BuildArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing: console layer plus a daily JSON log file
    let filter = if cli.verbose {
        "kiln=debug,kiln_gce=debug,kiln_engine=debug,kiln_config=debug,info"
    } else {
        "kiln=info,kiln_gce=warn,kiln_engine=warn,kiln_config=warn,warn"
    };

    let log_dir = kiln_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "kiln.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "kiln=trace,kiln_gce=trace,kiln_engine=trace,kiln_config=trace,kiln_types=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Validate(args) => validate::run(args, &ctx).await,
        Commands::Plan(args) => plan::run(args, &ctx).await,
        Commands::Build(args) => build::run(args, &ctx).await,
    }
}
