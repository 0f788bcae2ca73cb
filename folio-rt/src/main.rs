//! folio-rt (Reading Tracker) - Command-line driver
//!
//! Tracks one article against a running folio-ps, taking reader events from
//! stdin one per line:
//!
//! ```text
//! scroll <offset> <viewport> <total>   scroll or initial-paint sample
//! hide | show                          visibility change
//! complete                             reader reached the end
//! status                               print the server's record
//! quit                                 stop (also on EOF or Ctrl+C)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_common::config::{load_toml, RootFolderResolver};
use folio_rt::config::{TomlConfig, CONFIG_FILE_NAME};
use folio_rt::{HttpTransport, ScrollGeometry, TrackingSession};

/// Command-line arguments for folio-rt
#[derive(Parser, Debug)]
#[command(name = "folio-rt")]
#[command(about = "Reading tracker for Folio: replays reader events against folio-ps")]
#[command(version)]
struct Args {
    /// Article to track
    #[arg(short, long)]
    article: String,

    /// Session token issued for the reader
    #[arg(short, long, env = "FOLIO_SESSION_TOKEN", hide_env_values = true)]
    token: String,

    /// Progress service URL (overrides folio-rt.toml)
    #[arg(short, long, env = "FOLIO_SERVER_URL")]
    server: Option<String>,

    /// Root folder holding folio-rt.toml
    #[arg(short, long, env = "FOLIO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,
}

/// One line of input
#[derive(Debug, PartialEq)]
enum Command {
    Scroll(ScrollGeometry),
    Visibility(bool),
    Complete,
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "scroll" => {
            let numbers = parts
                .map(|p| p.parse::<f64>().with_context(|| format!("not a number: {}", p)))
                .collect::<Result<Vec<_>>>()?;
            match numbers.as_slice() {
                [offset, viewport, total] => {
                    Command::Scroll(ScrollGeometry::new(*offset, *viewport, *total))
                }
                _ => anyhow::bail!("usage: scroll <offset> <viewport> <total>"),
            }
        }
        "hide" => Command::Visibility(false),
        "show" => Command::Visibility(true),
        "complete" => Command::Complete,
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        other => anyhow::bail!("unknown command: {}", other),
    };
    Ok(Some(command))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let root_folder = RootFolderResolver::new("reading-tracker")
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let toml_config = load_toml::<TomlConfig>(&root_folder.join(CONFIG_FILE_NAME))?
        .unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting Folio Reading Tracker (folio-rt) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = toml_config.tracker_config();
    if let Some(server) = args.server {
        config.server_url = server;
    }

    let transport = Arc::new(
        HttpTransport::new(&config.server_url, args.token, config.request_timeout)
            .context("Failed to create HTTP transport")?,
    );
    info!("Progress endpoint: {}", transport.endpoint());

    let mut session = TrackingSession::new(args.article.clone(), config, transport.clone());
    session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                None
            }
        };
        let Some(line) = line else { break };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        match command {
            Command::Scroll(geometry) => {
                let outcome = session.on_scroll(geometry).await;
                info!(?outcome, "scroll");
            }
            Command::Visibility(visible) => {
                if let Some(outcome) = session.on_visibility_change(visible).await {
                    info!(?outcome, "hide");
                }
            }
            Command::Complete => {
                let outcome = session.mark_complete().await;
                info!(?outcome, "complete");
            }
            Command::Status => match transport.fetch(&args.article).await {
                Ok(Some(record)) => println!("{}", serde_json::to_string(&record)?),
                Ok(None) => println!("null"),
                Err(e) => warn!("Status request failed: {}", e),
            },
            Command::Quit => break,
        }
    }

    // A page would drop this handle; the CLI waits so the process does not
    // exit before the final sync is delivered
    let outcome = session
        .stop()
        .await
        .context("Final sync task panicked")?;
    info!(?outcome, "Final sync");

    Ok(())
}
