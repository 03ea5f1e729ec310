//! Interactive session walking through the same screens as the web client:
//! login, upload decision, then a version management loop.

use std::path::PathBuf;

use anyhow::Result;
use steelproc::prelude::*;

use crate::cli::{AppContext, confirm, prompt, restore::upload_file, versions::emit_versions};

const MENU: &str = "\
Commands:
  list                 show database versions
  select <name|#>      choose a version
  process [250|255]    generate a report for the selected version
  download [dir]       save the last report (default: current directory)
  delete <name|#>      delete a version
  refresh              reload the version list
  quit";

pub async fn run(ctx: &AppContext) -> Result<()> {
    eprintln!("Connecting to {} as {}", ctx.server, ctx.username);
    match ctx.login().await? {
        AuthNext::ExistingData { versions } => {
            eprintln!("Found {} existing database(s):", versions.len());
            for name in &versions {
                eprintln!("  {name}");
            }
            if confirm("Upload a new backup?")? {
                ctx.workflow.proceed_to_upload()?;
                upload_loop(ctx).await?;
            } else {
                ctx.workflow.skip_upload().await?;
            }
        }
        AuthNext::NoData => {
            eprintln!("No databases found. Upload a .bacpac backup to continue.");
            upload_loop(ctx).await?;
        }
    }
    manage_versions(ctx).await
}

/// Prompts for a backup until one restores, or the operator skips.
async fn upload_loop(ctx: &AppContext) -> Result<()> {
    loop {
        let path = prompt("Backup file (.bacpac, empty to skip): ")?.unwrap_or_default();
        if path.is_empty() {
            ctx.workflow.skip_upload().await?;
            return Ok(());
        }
        match upload_file(ctx, PathBuf::from(path.as_str())).await {
            Ok(outcome) => {
                if let Some(name) = outcome.db_name {
                    eprintln!("Restored as {name}");
                }
                return Ok(());
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
}

async fn manage_versions(ctx: &AppContext) -> Result<()> {
    let manager = ctx.workflow.version_manager()?;
    ctx.output.emit_notices(&manager.take_notices());
    emit_versions(ctx, &manager)?;
    eprintln!("{MENU}");

    loop {
        let Some(line) = prompt("> ")? else {
            eprintln!();
            break;
        };
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let arg = words.next();
        let result = match command {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                eprintln!("{MENU}");
                Ok(())
            }
            "list" | "ls" => emit_versions(ctx, &manager),
            "refresh" => match manager.refresh().await {
                Ok(_) => emit_versions(ctx, &manager),
                Err(e) => Err(e.into()),
            },
            "select" => match resolve_name(&manager, arg) {
                Some(name) => manager.select(&name).map_err(Into::into),
                None => Err(anyhow::anyhow!("usage: select <name|#>")),
            },
            "process" => process(ctx, &manager, arg).await,
            "download" => {
                let dir = PathBuf::from(arg.unwrap_or("."));
                match manager.download(&dir).await {
                    Ok(path) => {
                        eprintln!("Saved {}", path.display());
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            "delete" => delete(&manager, arg).await,
            other => Err(anyhow::anyhow!("unknown command '{other}', type help")),
        };
        ctx.output.emit_notices(&manager.take_notices());
        if let Err(e) = result {
            eprintln!("error: {e}");
        }
    }
    ctx.workflow.logout();
    Ok(())
}

async fn process(
    ctx: &AppContext,
    manager: &VersionManager<GatewayClient>,
    arg: Option<&str>,
) -> Result<()> {
    let location = arg.map_or(Ok(Location::default()), str::parse::<Location>)?;
    let selected = manager.selected().unwrap_or_default();
    ctx.output
        .status(&format!("Processing {selected} for location {location}..."));
    let report = manager.generate_report(location).await?;
    eprintln!("Report ready: {}", manager.download_url()?);
    eprintln!("File: {}", report.file_name);
    Ok(())
}

async fn delete(manager: &VersionManager<GatewayClient>, arg: Option<&str>) -> Result<()> {
    let Some(name) = resolve_name(manager, arg) else {
        anyhow::bail!("usage: delete <name|#>");
    };
    manager.request_deletion(&name)?;
    if confirm(&format!("Delete database \"{name}\"? This action cannot be undone."))? {
        manager.confirm_deletion().await?;
    } else {
        manager.cancel_deletion()?;
        eprintln!("Deletion cancelled");
    }
    Ok(())
}

/// Accepts a version name or its 1-based position in the list.
fn resolve_name(manager: &VersionManager<GatewayClient>, arg: Option<&str>) -> Option<String> {
    let arg = arg?;
    let versions = manager.versions();
    match arg.parse::<usize>() {
        Ok(idx) if (1..=versions.len()).contains(&idx) && !versions.iter().any(|v| v == arg) => {
            Some(versions[idx - 1].clone())
        }
        _ => Some(arg.to_string()),
    }
}
