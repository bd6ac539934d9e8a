//! Build command - runs a build against the in-memory compute backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use kiln_gce::{
    Builder, Collaborators, MemoryCommunicator, MemoryDriver, MemoryDriverFactory,
};
use kiln_types::{Artifact, InlineShellHook};

use super::{Context, load_template};
use crate::ui::{ConsoleUi, StdinPause};

/// Arguments for the build command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Build template (defaults to ./kiln.toml)
    pub template: Option<PathBuf>,

    /// Run every step except image capture
    #[arg(long)]
    pub dry_run: bool,

    /// Pause after each step and keep generated keys on disk
    #[arg(long)]
    pub debug: bool,
}

/// Run the build command.
pub async fn run(args: BuildArgs, ctx: &Context) -> Result<()> {
    let (_, mut config) = load_template(args.template.as_deref())?;
    config.dry_run |= args.dry_run;
    config.debug |= args.debug;

    let project_id = config.project_id.clone();
    let hook = Arc::new(InlineShellHook::new(config.inline_commands()));
    let ui = Arc::new(ConsoleUi::new(&config.build_name));

    let mut builder = Builder::new();
    let warnings = builder.prepare(config).context("invalid build template")?;
    let yellow = Style::new().yellow();
    for warning in &warnings {
        eprintln!("{} {warning}", yellow.apply_to("warning:"));
    }

    let collaborators = Collaborators {
        driver_factory: Arc::new(MemoryDriverFactory::new(Arc::new(MemoryDriver::new(
            project_id,
        )))),
        communicator: Arc::new(MemoryCommunicator::new()),
        hook,
        ui,
        pause: Some(Arc::new(StdinPause)),
    };

    let builder = Arc::new(builder);
    let interrupt = {
        let builder = builder.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received");
                builder.cancel();
            }
        })
    };

    let result = builder.run(collaborators).await;
    interrupt.abort();
    let artifact = result?;

    if ctx.json_output {
        let output = match &artifact {
            Some(a) => serde_json::json!({
                "builder_id": a.builder_id(),
                "id": a.id(),
                "description": a.description(),
                "project_id": a.state("project_id"),
                "zone": a.state("zone"),
            }),
            None => serde_json::json!({ "dry_run": true }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    match artifact {
        Some(a) => {
            println!(
                "{} {}",
                style("==> Builds finished.").green().bold(),
                style(a.description()).bold()
            );
            println!("    {} {}", style("ID:").dim(), a.id());
        }
        None => println!(
            "{}",
            style("==> Dry run finished; no image was created.")
                .green()
                .bold()
        ),
    }
    Ok(())
}
