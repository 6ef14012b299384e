//! Terminal output for the publish commands
//!
//! Uses `cliclack` for spinners and prompts, with plain line output in CI
//! and other non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use pawgen_publish::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Verifying output checksums...");
//! spinner.stop("120 files verified");
//!
//! if ui::confirm(&ctx, "Deploy 120 files to netlify?", true).await? {
//!     ui::outro_success(&ctx, "Deploy complete");
//! }
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, outro_warn, remark, step_error_detail, step_ok,
    step_ok_detail, step_warn_hint,
};
pub use progress::{file_bar, transfer_bar, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, PawgenTheme};
