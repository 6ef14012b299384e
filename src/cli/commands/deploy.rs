//! Deploy command - verify the output tree and publish it

use super::{join_error, output_dir};
use crate::audit::AuditLog;
use crate::cli::args::DeployArgs;
use crate::config::Config;
use crate::deploy::{collect_items, DispatchReport, Dispatcher};
use crate::digest::{ChecksumVerifier, DigestService};
use crate::error::{PublishError, PublishResult};
use crate::ui::{self, TaskSpinner, UiContext};
use tracing::debug;

/// Execute the deploy command
pub async fn execute(args: DeployArgs, config: &Config) -> PublishResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let dir = output_dir(args.dir, config);
    if !dir.is_dir() {
        return Err(PublishError::PathNotFound(dir));
    }

    let names = if args.providers.is_empty() {
        config.deploy.providers.clone()
    } else {
        args.providers
    };
    debug!("Requested providers: {:?}", names);

    // Settings errors surface before any file is read
    let dispatcher =
        Dispatcher::from_config(config, &names, |provider| ui::transfer_bar(&ctx, provider.name()))?;

    ui::intro(&ctx, "pawgen deploy");

    let service = DigestService::new(config.output.digest_storage);
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Verifying output checksums...");

    let target = dir.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        let report = ChecksumVerifier::new(service).verify_or_abort(&target)?;
        let items = collect_items(&service, &target)?;
        Ok::<_, PublishError>((report, items))
    })
    .await
    .map_err(join_error)?;

    let (verified, items) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            spinner.stop_error("Checksum verification failed");
            return Err(e);
        }
    };
    spinner.stop(&format!("{} files verified", verified.checked));

    if dispatcher.is_empty() {
        ui::outro_success(&ctx, "Output verified, no deploy providers selected");
        return Ok(());
    }

    let targets = dispatcher
        .providers()
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ");
    let question = format!("Deploy {} files to {}?", items.len(), targets);
    if !ui::confirm(&ctx, &question, true).await? {
        ui::outro_warn(&ctx, "Deploy cancelled");
        return Ok(());
    }

    let report = tokio::task::spawn_blocking(move || dispatcher.dispatch(&items))
        .await
        .map_err(join_error)?;

    print_report(&ctx, &report);
    AuditLog::new(config).record_dispatch(&dir, &report).await;

    if report.is_success() {
        ui::outro_success(&ctx, "Deploy complete");
    } else {
        ui::outro_error(&ctx, "Deploy finished with errors");
    }
    report.into_result().map(|_| ())
}

fn print_report(ctx: &UiContext, report: &DispatchReport) {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(summary) => {
                ui::step_ok_detail(
                    ctx,
                    &format!(
                        "{}: {} uploaded, {} unchanged",
                        outcome.provider, summary.uploaded_files, summary.skipped_files
                    ),
                    &summary.deploy_id,
                );
                if let Some(url) = &summary.url {
                    ui::key_value(ctx, "url", url);
                }
            }
            Err(e) => {
                ui::step_error_detail(ctx, outcome.provider.name(), &e.to_string());
                if let Some(hint) = e.hint() {
                    ui::remark(ctx, hint);
                }
            }
        }
    }
}
