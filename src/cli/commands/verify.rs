//! Verify command - compare output files with their recorded digests

use super::{join_error, output_dir};
use crate::cli::args::VerifyArgs;
use crate::config::Config;
use crate::digest::{ChecksumVerifier, DigestService};
use crate::error::{PublishError, PublishResult};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the verify command
pub async fn execute(args: VerifyArgs, config: &Config) -> PublishResult<()> {
    let ctx = UiContext::detect();
    let dir = output_dir(args.dir, config);
    if !dir.is_dir() {
        return Err(PublishError::PathNotFound(dir));
    }

    let verifier = ChecksumVerifier::new(DigestService::new(config.output.digest_storage));
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Verifying {}", dir.display()));

    let target = dir.clone();
    let checked = tokio::task::spawn_blocking(move || verifier.check(&target))
        .await
        .map_err(join_error)?;
    let report = match checked {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Verification failed");
            return Err(e);
        }
    };

    if report.is_ok() {
        spinner.stop(&format!("{} files match their digests", report.checked));
        return Ok(());
    }

    spinner.stop_error(&format!(
        "{} of {} files changed since they were digested",
        report.failed_files(),
        report.checked
    ));
    for m in &report.mismatches {
        ui::step_error_detail(
            &ctx,
            &m.path.display().to_string(),
            &format!("{} expected {} found {}", m.algorithm, m.expected, m.actual),
        );
    }

    Err(PublishError::ChecksumMismatch {
        count: report.failed_files(),
    })
}
