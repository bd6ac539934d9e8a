//! Validate command - checks a build template without building.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use super::{Context, load_template};

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Build template (defaults to ./kiln.toml)
    pub template: Option<PathBuf>,
}

/// Run the validate command.
pub async fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let (path, config) = load_template(args.template.as_deref())?;

    let (problems, warnings) = match config.prepare() {
        Ok(prepared) => (Vec::new(), prepared.warnings),
        Err(kiln_config::ConfigError::Validation(problems)) => (problems, Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if ctx.json_output {
        let output = serde_json::json!({
            "template": path.display().to_string(),
            "valid": problems.is_empty(),
            "problems": problems,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let yellow = Style::new().yellow();
        for warning in &warnings {
            println!("{} {warning}", yellow.apply_to("warning:"));
        }
        if problems.is_empty() {
            println!(
                "{} {}",
                style("✓").green().bold(),
                style(format!("{} is valid", path.display())).bold()
            );
        } else {
            let red = Style::new().red();
            println!("{}", red.apply_to(format!("{} is invalid:", path.display())));
            for problem in &problems {
                println!("  {} {problem}", red.apply_to("*"));
            }
        }
    }

    if !problems.is_empty() {
        anyhow::bail!("template has {} problem(s)", problems.len());
    }
    Ok(())
}
