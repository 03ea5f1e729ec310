use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;
use steelproc::prelude::*;
use tokio::task::JoinHandle;

use crate::{cli::AppContext, output::OutputFormat};

pub async fn restore(ctx: &AppContext, file: PathBuf) -> Result<()> {
    if let AuthNext::ExistingData { versions } = ctx.login().await? {
        ctx.output
            .status(&format!("{} existing database(s) on the server", versions.len()));
        ctx.workflow.proceed_to_upload()?;
    }
    let outcome = upload_file(ctx, file).await?;
    let manager = ctx.workflow.version_manager()?;
    ctx.output.emit_notices(&manager.take_notices());
    ctx.output.emit_json(&json!({
        "db_name": outcome.db_name,
        "versions": manager.versions(),
    }))
}

/// Selects and uploads a file in the `Uploading` stage, showing progress on stderr.
pub async fn upload_file(ctx: &AppContext, file: PathBuf) -> Result<UploadOutcome> {
    let uploader = ctx.workflow.upload_controller()?;
    let selection = uploader.select_path(&file).await?;
    if let Some(advisory) = &selection.advisory {
        eprintln!("warning: {advisory}");
    }
    ctx.output.status(&format!(
        "Uploading {} ({})",
        selection.file_name,
        steelproc::validation::format_file_size(selection.size)
    ));

    let printer = (ctx.output.format() != OutputFormat::Quiet)
        .then(|| spawn_progress_printer(uploader.subscribe_progress()));
    let result = ctx.workflow.upload().await;
    if let Some(printer) = printer {
        printer.abort();
        eprintln!();
    }
    match result {
        Ok(outcome) => {
            ctx.output.status("Database restored successfully");
            Ok(outcome)
        }
        Err(e) => Err(e.into()),
    }
}

fn spawn_progress_printer(mut progress: tokio::sync::watch::Receiver<u8>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            eprint!("\rUploading... {value:>3}%");
        }
    })
}
