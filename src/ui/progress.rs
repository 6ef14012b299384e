//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (nothing is shown until `start`)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            println!("{} {}", style("✓").green(), message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else if self.interactive {
            println!("{} {}", style("✗").red(), message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }

    /// Clear the spinner without any message
    pub fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.clear();
        }
    }
}

/// Counting bar for per-file work such as digest stamping.
///
/// Hidden in CI, where a single summary line is printed instead.
pub fn file_bar(ctx: &UiContext, label: &str, total: u64) -> ProgressBar {
    if !ctx.use_fancy_output() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("  {spinner:.magenta} {prefix}  {bar:24.magenta/dim} {pos}/{len} {msg:.dim}")
    {
        bar.set_style(
            template
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .progress_chars("━╸─"),
        );
    }
    bar.set_prefix(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Byte-counting bar for uploads to one provider; deployers set the length
/// once they know how much content is missing remotely
pub fn transfer_bar(ctx: &UiContext, provider: &str) -> ProgressBar {
    if !ctx.use_fancy_output() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(template) = ProgressStyle::default_bar().template(
        "  {spinner:.magenta} Uploading to {prefix}  {bar:24.magenta/dim} {bytes}/{total_bytes} {elapsed:.dim}",
    ) {
        bar.set_style(template.progress_chars("━╸─"));
    }
    bar.set_prefix(provider.to_string());
    bar
}
