/*
 * steelctl - restore, process, and manage steel processing databases
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use steelproc::prelude::*;
use tracing::warn;
use zeroize::Zeroizing;

use crate::output::{Output, OutputFormat};

pub mod guided;
pub mod restore;
pub mod versions;

const DEFAULT_SERVER: &str = "localhost,1433";
const DEFAULT_USERNAME: &str = "sa";

#[derive(Parser, Debug)]
#[command(name = "steelctl")]
#[command(author, version, about = "steelctl: restore backups, process databases, and download steel processing reports", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Processing server URL. Default: environment `STEELPROC_URL` or <http://127.0.0.1:8000>
    #[arg(short = 'u', long, env = "STEELPROC_URL")]
    pub url: Option<String>,

    /// Database server address, forwarded to the processing server
    #[arg(long, env = "STEELPROC_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Database login
    #[arg(long, env = "STEELPROC_USERNAME", default_value = DEFAULT_USERNAME)]
    pub username: String,

    /// Database password. Prompted on stdin if not set.
    #[arg(long, env = "STEELPROC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds (default: none)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write output to file (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// JSON output (default)
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Table output format
    #[arg(short, long, global = true)]
    pub table: bool,

    /// Quiet mode - suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (repeat for more: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global=true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the server is reachable and accepts the credentials
    Health,

    /// List database versions
    #[command(alias = "list")]
    Versions,

    /// Upload a .bacpac backup and restore it into a new database
    Restore {
        /// Backup file
        file: PathBuf,
    },

    /// Generate a report for a database version
    Process {
        /// Database version name
        db: String,

        /// Location code: 250 (frame coil) or 255 (frame sheet)
        #[arg(short, long, default_value = "250")]
        location: Location,

        /// Download the report into this directory
        #[arg(long, value_name = "DIR")]
        download: Option<PathBuf>,
    },

    /// Delete a database version
    Delete {
        /// Database version name
        db: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Download a report by file name or path
    Download {
        /// Report file name, e.g. report.xlsx or /download/report.xlsx
        file: String,

        /// Destination directory
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },

    /// Guided session: login, optional upload, then manage versions interactively
    Run,
}

pub struct AppContext {
    pub workflow: Workflow<GatewayClient>,
    pub output: Output,
    pub server: String,
    pub username: String,
    password: Option<Zeroizing<String>>,
}

impl AppContext {
    /// Password from the command line or environment, otherwise prompted.
    fn password(&self) -> Result<Zeroizing<String>> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        let password = prompt_required("Password: ")?;
        if password.is_empty() {
            bail!("password is empty");
        }
        Ok(password)
    }

    /// Authenticates the workflow. Returns what the server reported.
    pub async fn login(&self) -> Result<AuthNext> {
        let password = self.password()?;
        let next = self
            .workflow
            .authenticate(&self.server, &self.username, &password)
            .await?;
        Ok(next)
    }

    /// Authenticates and goes straight to version management.
    pub async fn open_versions(&self) -> Result<std::sync::Arc<VersionManager<GatewayClient>>> {
        self.login().await?;
        self.workflow.skip_upload().await?;
        let manager = self.workflow.version_manager()?;
        let notices = manager.take_notices();
        if notices.iter().any(|n| n.level == NoticeLevel::Error) {
            // the list on entry failed to load; one more try surfaces the typed error
            manager.refresh().await?;
        }
        Ok(manager)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(resolve_output_format(&cli), cli.output.clone());
    let gateway = build_client(&cli)?;

    let ctx = AppContext {
        workflow: Workflow::new(gateway, WorkflowConfig::default()),
        output,
        server: cli.server.clone(),
        username: cli.username.clone(),
        password: cli.password.clone().map(Zeroizing::new),
    };

    match cli.command {
        Commands::Health => health(&ctx).await,
        Commands::Versions => versions::list(&ctx).await,
        Commands::Restore { file } => restore::restore(&ctx, file).await,
        Commands::Process {
            db,
            location,
            download,
        } => versions::process(&ctx, &db, location, download).await,
        Commands::Delete { db, yes } => versions::delete(&ctx, &db, yes).await,
        Commands::Download { file, dir } => versions::download_file(&ctx, &file, &dir).await,
        Commands::Run => guided::run(&ctx).await,
    }
}

async fn health(ctx: &AppContext) -> Result<()> {
    let password = ctx.password()?;
    ctx.workflow
        .test_connection(&ctx.server, &ctx.username, &password)
        .await?;
    ctx.output.emit_json(&serde_json::json!({
        "connected": true,
        "url": ctx.workflow.gateway().base_url().as_str(),
        "server": ctx.server,
    }))
}

fn resolve_output_format(cli: &Cli) -> OutputFormat {
    if cli.quiet {
        OutputFormat::Quiet
    } else if cli.pretty {
        if cli.table {
            warn!("--pretty conflicts with --table. Using json pretty format");
        }
        OutputFormat::Pretty
    } else if cli.json {
        if cli.table {
            warn!("--json conflicts with --table. Using json format");
        }
        OutputFormat::Json
    } else if cli.table {
        OutputFormat::Table
    } else {
        OutputFormat::Json
    }
}

fn build_client(cli: &Cli) -> Result<GatewayClient> {
    let mut config = ClientConfig::default().timeout(cli.timeout.map(Duration::from_secs));
    if let Some(url) = &cli.url {
        config = config.base_url(url.clone());
    }
    Ok(GatewayClient::with_config(config)?)
}

/// Prints `message` to stderr and reads one trimmed line from stdin.
/// Returns `None` at end of input.
pub fn prompt(message: &str) -> Result<Option<Zeroizing<String>>> {
    eprint!("{message}");
    io::stderr().flush()?;
    Ok(read_trimmed_line(&mut io::stdin().lock())?)
}

/// Like [`prompt`], but end of input is an error.
pub fn prompt_required(message: &str) -> Result<Zeroizing<String>> {
    prompt(message)?.context("end of input")
}

fn read_trimmed_line(reader: &mut impl BufRead) -> io::Result<Option<Zeroizing<String>>> {
    let mut line = Zeroizing::new(String::new());
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(Zeroizing::new(line.trim().to_string())))
}

/// Asks a yes/no question. Anything but y/yes is no, including end of input.
pub fn confirm(message: &str) -> Result<bool> {
    let answer = prompt(&format!("{message} [y/N] "))?;
    Ok(answer.is_some_and(|a| matches!(a.to_lowercase().as_str(), "y" | "yes")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process_location() {
        let cli = Cli::try_parse_from(["steelctl", "process", "DB1", "--location", "255"]).unwrap();
        match cli.command {
            Commands::Process { db, location, .. } => {
                assert_eq!(db, "DB1");
                assert_eq!(location, Location::L255);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["steelctl", "process", "DB1", "--location", "300"]).is_err());
    }

    #[test]
    fn test_read_trimmed_line_reports_end_of_input() {
        let mut input = io::Cursor::new("  list \n\nquit");
        let lines: Vec<Option<String>> = (0..4)
            .map(|_| {
                read_trimmed_line(&mut input)
                    .unwrap()
                    .map(|line| line.to_string())
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                Some("list".to_string()),
                Some(String::new()),
                Some("quit".to_string()),
                None
            ]
        );
        let mut closed = io::empty();
        assert!(read_trimmed_line(&mut closed).unwrap().is_none());
    }

    #[test]
    fn test_output_format_precedence() {
        let cli = Cli::try_parse_from(["steelctl", "--table", "--pretty", "versions"]).unwrap();
        assert_eq!(resolve_output_format(&cli), OutputFormat::Pretty);
        let cli = Cli::try_parse_from(["steelctl", "-q", "--table", "versions"]).unwrap();
        assert_eq!(resolve_output_format(&cli), OutputFormat::Quiet);
    }
}
