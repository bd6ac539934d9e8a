//! Plan command - lists the steps a build would run.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;

use super::{Context, load_template};

/// Arguments for the plan command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Build template (defaults to ./kiln.toml)
    pub template: Option<PathBuf>,

    /// Plan a dry run (no image capture)
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the plan command.
pub async fn run(args: PlanArgs, ctx: &Context) -> Result<()> {
    let (_, mut config) = load_template(args.template.as_deref())?;
    if args.dry_run {
        config.dry_run = true;
    }

    let names = kiln_gce::plan_names(&config);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    for (i, name) in names.iter().enumerate() {
        println!("{} {name}", dim.apply_to(format!("{:>2}.", i + 1)));
    }
    if ctx.verbose {
        println!();
        println!(
            "{}",
            dim.apply_to(format!(
                "dry_run={} startup_script={}",
                config.dry_run,
                config.has_startup_script()
            ))
        );
    }
    Ok(())
}
