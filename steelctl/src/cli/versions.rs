use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use steelproc::prelude::*;

use crate::{
    cli::{AppContext, confirm},
    output::{OutputFormat, VersionRow},
};

pub async fn list(ctx: &AppContext) -> Result<()> {
    let manager = ctx.open_versions().await?;
    emit_versions(ctx, &manager)
}

pub fn emit_versions(ctx: &AppContext, manager: &VersionManager<GatewayClient>) -> Result<()> {
    let snapshot = manager.snapshot();
    if ctx.output.format() == OutputFormat::Table {
        let rows = VersionRow::from_list(&snapshot.versions, snapshot.selected.as_deref());
        return ctx.output.emit_table(&rows);
    }
    ctx.output.emit_json(&json!({
        "count": snapshot.versions.len(),
        "versions": snapshot.versions,
        "selected": snapshot.selected,
    }))
}

pub async fn process(
    ctx: &AppContext,
    db: &str,
    location: Location,
    download: Option<PathBuf>,
) -> Result<()> {
    let manager = ctx.open_versions().await?;
    manager.select(db)?;
    ctx.output.status(&format!(
        "Processing {db} for location {location} ({})...",
        location.description()
    ));
    let result = manager.generate_report(location).await;
    ctx.output.emit_notices(&manager.take_notices());
    let report = result?;

    let saved_to = match download {
        Some(dir) => Some(manager.download(&dir).await?),
        None => None,
    };
    ctx.output.emit_json(&json!({
        "db_name": db,
        "location": location,
        "file_name": report.file_name,
        "download_url": manager.download_url()?,
        "saved_to": saved_to,
    }))
}

pub async fn delete(ctx: &AppContext, db: &str, yes: bool) -> Result<()> {
    let manager = ctx.open_versions().await?;
    manager.request_deletion(db)?;
    let confirmed = yes
        || confirm(&format!(
            "Delete database \"{db}\"? This action cannot be undone."
        ))?;
    if !confirmed {
        manager.cancel_deletion()?;
        ctx.output.status("Deletion cancelled");
        return ctx
            .output
            .emit_json(&json!({ "db_name": db, "deleted": false }));
    }

    let result = manager.confirm_deletion().await;
    ctx.output.emit_notices(&manager.take_notices());
    result?;
    ctx.output.emit_json(&json!({
        "db_name": db,
        "deleted": true,
        "versions": manager.versions(),
    }))
}

/// Fetches a report by name without logging in; the download endpoint is public.
pub async fn download_file(ctx: &AppContext, file: &str, dir: &Path) -> Result<()> {
    let gateway = ctx.workflow.gateway();
    let url = gateway.resolve_download_url(file)?;
    let name = local_file_name(file).with_context(|| format!("no file name in '{file}'"))?;
    let data = gateway.download(&url).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, &data)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    ctx.output.emit_json(&json!({
        "url": url,
        "saved_to": path,
        "size": data.len(),
    }))
}
