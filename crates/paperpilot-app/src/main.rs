// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PaperPilot: terminal client for reviewing scanned documents
//
// Entry point. Initialises logging, resolves configuration once, wires the
// server-facing services, and dispatches the subcommand.

mod render;
mod review;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use paperpilot_core::ClientConfig;
use paperpilot_core::config::SERVER_URL_ENV;
use paperpilot_core::error::Result;
use paperpilot_core::human_errors::humanize_error;
use paperpilot_core::types::DocumentId;
use paperpilot_session::{DocumentListController, HttpDocumentApi, SseTransport};

use services::console::{self, ConsolePrompt};
use services::data_dir;

#[derive(Parser)]
#[command(name = "paperpilot")]
#[command(version)]
#[command(about = "Review scanned documents on a PaperPilot server", long_about = None)]
struct Cli {
    /// Server base URL (overrides the configuration file)
    #[arg(long, global = true, env = SERVER_URL_ENV, value_name = "URL")]
    server: Option<String>,

    /// Configuration file [default: $XDG_DATA_HOME/paperpilot/config.json]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List documents waiting for review
    #[command(alias = "ls")]
    List,

    /// Keep listing documents, printing whenever the list changes
    Watch,

    /// Review one document interactively
    Review {
        /// Document id
        #[arg(value_name = "ID")]
        id: DocumentId,
    },

    /// Delete a document after confirmation
    Delete {
        /// Document id
        #[arg(value_name = "ID")]
        id: DocumentId,
    },

    /// Download the split-sheet PDF, or print its URL
    SplitSheet {
        /// Write the PDF here instead of printing the URL
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", console::format_alert(&humanize_error(&e)));
            ExitCode::FAILURE
        }
    }
}

/// File, then environment, then `--server`.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli.config.clone().unwrap_or_else(data_dir::config_path);
    let config = ClientConfig::load(Some(&path))?;
    match &cli.server {
        Some(url) => config.with_server_url(url.clone()),
        None => Ok(config),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!(server = %config.server_url, "PaperPilot starting");

    let input = console::stdin_lines();
    let controller = DocumentListController::new(
        Arc::new(HttpDocumentApi::new(config.clone())?),
        Arc::new(SseTransport::new(config.clone())?),
        Arc::new(ConsolePrompt::new(Arc::clone(&input))),
        config.clone(),
    );

    match cli.command {
        Command::List => {
            controller.refresh().await?;
            print!("{}", render::document_table(&controller.documents()));
        }
        Command::Watch => watch(&controller).await,
        Command::Review { id } => review::run(&controller, id, &config, input).await?,
        Command::Delete { id } => {
            if controller.delete(id).await? {
                println!("deleted {id}");
            } else {
                println!("delete cancelled");
            }
        }
        Command::SplitSheet { output: Some(path) } => {
            let pdf = controller.split_sheet().await?;
            tokio::fs::write(&path, pdf).await?;
            println!("split sheet written to {}", path.display());
        }
        Command::SplitSheet { output: None } => println!("{}", controller.split_sheet_url()),
    }
    Ok(())
}

/// Poll until Ctrl-C, printing the list each time it changes.
async fn watch(controller: &DocumentListController) {
    let mut documents = controller.subscribe();
    controller.start();

    loop {
        tokio::select! {
            changed = documents.changed() => {
                if changed.is_err() {
                    break;
                }
                let table = render::document_table(&documents.borrow_and_update());
                println!("{}", chrono::Local::now().format("-- %H:%M:%S --"));
                print!("{table}");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.stop();
    info!("stopped watching");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_review_with_global_server() {
        let cli = Cli::try_parse_from([
            "paperpilot",
            "review",
            "6f2d1c9e-3b1a-4c55-9d7e-0a1b2c3d4e5f",
            "--server",
            "http://scanner.local:8000",
        ])
        .expect("parse");
        assert_eq!(cli.server.as_deref(), Some("http://scanner.local:8000"));
        assert!(matches!(cli.command, Command::Review { .. }));
    }

    #[test]
    fn rejects_malformed_document_id() {
        assert!(Cli::try_parse_from(["paperpilot", "delete", "not-a-uuid"]).is_err());
    }

    #[test]
    fn server_flag_overrides_configuration_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"server_url":"http://from-file:8000"}"#).expect("write");

        let cli = Cli {
            server: Some("http://from-flag:9000/".into()),
            config: Some(path),
            command: Command::List,
        };
        let config = load_config(&cli).expect("config");
        assert_eq!(config.server_url, "http://from-flag:9000");
    }
}
