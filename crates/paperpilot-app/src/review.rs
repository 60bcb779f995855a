// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive review of one document.
//
// Reads commands line by line and drives the selected session.  Server
// pushes keep arriving in the background; `show` prints whatever the session
// currently holds.

use tokio::sync::watch;
use tracing::debug;

use paperpilot_core::ClientConfig;
use paperpilot_core::error::Result;
use paperpilot_core::human_errors::humanize_error;
use paperpilot_core::types::DocumentId;
use paperpilot_session::reconciler::PushStats;
use paperpilot_session::{DocumentListController, DocumentSession, ExportOutcome, MutationOutcome};

use crate::render;
use crate::services::console::{self, InputLines};

const HELP: &str = "\
commands:
  show            print the document
  toggle N        cycle page N: valid -> delete -> split -> valid
  rotate N        rotate page N a quarter turn clockwise
  name TEXT       type a new filename (not saved yet)
  save [TEXT]     save the typed filename, or TEXT
  refresh         reload the document from the server
  export          export the document and leave
  quit            leave without exporting";

/// One parsed operator command.  Page numbers are 1-based as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    Show,
    Toggle(usize),
    Rotate(usize),
    Name(String),
    Save(Option<String>),
    Refresh,
    Export,
    Quit,
    Help,
}

impl ReviewCommand {
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let command = match word {
            "show" | "s" => Self::Show,
            "toggle" | "t" => Self::Toggle(page_arg(rest)?),
            "rotate" | "r" => Self::Rotate(page_arg(rest)?),
            "name" if !rest.is_empty() => Self::Name(rest.to_string()),
            "name" => return Err("name needs the new filename".into()),
            "save" => Self::Save((!rest.is_empty()).then(|| rest.to_string())),
            "refresh" => Self::Refresh,
            "export" => Self::Export,
            "quit" | "exit" | "q" => Self::Quit,
            "help" | "?" => Self::Help,
            other => return Err(format!("unknown command '{other}', type 'help'")),
        };
        Ok(Some(command))
    }
}

/// Parse a 1-based page number into a 0-based index.
fn page_arg(arg: &str) -> std::result::Result<usize, String> {
    arg.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| format!("expected a page number from 1, got '{arg}'"))
}

/// Select `id` and run the command loop until the operator quits, exports,
/// or input ends.
pub async fn run(
    controller: &DocumentListController,
    id: DocumentId,
    config: &ClientConfig,
    input: InputLines,
) -> Result<()> {
    let session = controller.select(id).await?;
    let notifier = tokio::spawn(announce_pushes(session.push_stats()));

    show(&session, config);
    println!("{HELP}");

    let result = command_loop(controller, &session, config, &input).await;

    notifier.abort();
    controller.close_active();
    result
}

async fn command_loop(
    controller: &DocumentListController,
    session: &DocumentSession,
    config: &ClientConfig,
    input: &InputLines,
) -> Result<()> {
    loop {
        console::print_inline("> ");
        let Some(line) = console::read_line(input).await? else {
            return Ok(());
        };
        let command = match ReviewCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        debug!(?command, "review command");

        match command {
            ReviewCommand::Show => show(session, config),
            ReviewCommand::Toggle(page) => report_edit(session.toggle_status(page).await, session, page),
            ReviewCommand::Rotate(page) => report_edit(session.rotate_page(page).await, session, page),
            ReviewCommand::Name(name) => report(session.set_draft_name(name)),
            ReviewCommand::Save(name) => {
                let name = name.or_else(|| session.draft_name());
                match name {
                    Some(name) => {
                        // Failures are alerted by the session.
                        if session.rename_document(name).await.is_ok() {
                            println!("saved");
                        }
                    }
                    None => println!("no new name typed, use 'name TEXT' or 'save TEXT'"),
                }
            }
            ReviewCommand::Refresh => {
                report(session.refresh().await);
                show(session, config);
            }
            ReviewCommand::Export => match controller.export_selected().await {
                Ok(ExportOutcome::Exported(id)) => {
                    println!("exported {id}");
                    return Ok(());
                }
                Ok(ExportOutcome::Declined) => println!("export cancelled"),
                // Alerted by the session; local edits are kept.
                Err(_) => {}
            },
            ReviewCommand::Quit => return Ok(()),
            ReviewCommand::Help => println!("{HELP}"),
        }
    }
}

fn show(session: &DocumentSession, config: &ClientConfig) {
    match session.document() {
        Some(doc) => print!(
            "{}",
            render::document_detail(&doc, session.draft_name().as_deref(), config)
        ),
        None => println!("no document loaded"),
    }
}

fn report(result: Result<()>) {
    if let Err(e) = result {
        eprintln!("{}", console::format_alert(&humanize_error(&e)));
    }
}

fn report_edit(result: Result<MutationOutcome>, session: &DocumentSession, page: usize) {
    match result {
        Ok(MutationOutcome::Confirmed) => {
            if let Some(p) = session.page(page) {
                println!("page {}: {} {}°", page + 1, p.status, p.rotation);
            }
        }
        Ok(MutationOutcome::Reverted { cause }) => {
            println!("the server rejected the change ({cause}); reloaded the document");
        }
        Ok(MutationOutcome::Unreconciled { cause, refresh_error }) => {
            println!(
                "the server rejected the change ({cause}) and reloading failed ({refresh_error}); \
                 run 'refresh'"
            );
        }
        Err(e) => report(Err(e)),
    }
}

/// Print a line whenever a pushed snapshot replaces the document.
async fn announce_pushes(mut stats: watch::Receiver<PushStats>) {
    let mut applied = stats.borrow().applied;
    while stats.changed().await.is_ok() {
        let now = stats.borrow_and_update().applied;
        if now > applied {
            println!("\n(document updated on the server, 'show' to see it)");
        }
        applied = now;
    }
}
