//! Digest command - record digests for an existing output tree

use super::join_error;
use crate::cli::args::DigestArgs;
use crate::config::Config;
use crate::digest::verify::output_files;
use crate::digest::DigestService;
use crate::error::{PublishError, PublishResult};
use crate::ui::{self, UiContext};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Execute the digest command
pub async fn execute(args: DigestArgs, config: &Config) -> PublishResult<()> {
    let ctx = UiContext::detect();
    let dir = args.dir;
    if !dir.is_dir() {
        return Err(PublishError::PathNotFound(dir));
    }

    let service = DigestService::new(config.output.digest_storage);
    let files = output_files(&dir)?;
    let bar = ui::file_bar(&ctx, "Digesting", files.len() as u64);

    let worker_bar = bar.clone();
    let stamped = tokio::task::spawn_blocking(move || stamp_all(service, &files, &worker_bar))
        .await
        .map_err(join_error)?;
    bar.finish_and_clear();
    let count = stamped?;

    ui::step_ok_detail(
        &ctx,
        &format!("Recorded digests for {} files", count),
        &dir.display().to_string(),
    );
    Ok(())
}

fn stamp_all(service: DigestService, files: &[PathBuf], bar: &ProgressBar) -> PublishResult<usize> {
    files.par_iter().try_for_each(|file| {
        let digests = service.stamp(file)?;
        debug!("{} sha1={}", file.display(), digests.sha1_hex());
        bar.inc(1);
        Ok::<_, PublishError>(())
    })?;
    Ok(files.len())
}
