//! Terminal output for builds.

use async_trait::async_trait;
use console::Style;
use kiln_engine::{PauseHandler, StateBag, StepAction};
use kiln_types::Ui;

/// Prints build progress prefixed with the build name.
pub struct ConsoleUi {
    prefix: String,
    say: Style,
    error: Style,
}

impl ConsoleUi {
    pub fn new(build_name: &str) -> Self {
        Self {
            prefix: build_name.to_string(),
            say: Style::new().green().bold(),
            error: Style::new().red().bold(),
        }
    }
}

impl Ui for ConsoleUi {
    fn say(&self, message: &str) {
        println!("{}", self.say.apply_to(format!("==> {}: {message}", self.prefix)));
    }

    fn message(&self, message: &str) {
        for line in message.lines() {
            println!("    {}: {line}", self.prefix);
        }
    }

    fn error(&self, message: &str) {
        eprintln!("{}", self.error.apply_to(format!("==> {}: {message}", self.prefix)));
    }
}

/// Waits for Enter between steps in debug mode.
pub struct StdinPause;

#[async_trait]
impl PauseHandler for StdinPause {
    async fn pause(&self, step: &str, action: StepAction, _state: &StateBag) {
        let outcome = match action {
            StepAction::Continue => "finished",
            StepAction::Halt => "halted",
        };
        println!(
            "{}",
            Style::new()
                .yellow()
                .apply_to(format!("Step '{step}' {outcome}. Press enter to continue."))
        );
        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)
        })
        .await;
        if let Ok(Err(e)) = read {
            tracing::warn!(error = %e, "Failed to read from stdin; continuing");
        }
    }
}
