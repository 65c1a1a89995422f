//! Line-oriented editing shell.
//!
//! One task owns the service and multiplexes three event sources: lines from
//! stdin, autosave expiries from the scheduler, and connectivity edges from
//! the probe loop. Slash commands drive explicit actions; any other line is
//! appended to the draft body.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::{
    application::{
        editor::{
            CommitDue, CommitOutcome, ConnectivityMonitor, EditorService, FallbackReason,
            ReconcileOutcome, SubmitOutcome,
        },
        error::AppError,
    },
    domain::drafts::CATEGORIES,
};

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Title(&'a str),
    Content(&'a str),
    Append(&'a str),
    Category(&'a str),
    Private(bool),
    Publish,
    Draft,
    Sync,
    Status,
    Discard,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Append(line);
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name {
        "/title" => Command::Title(rest),
        "/content" => Command::Content(rest),
        "/category" => Command::Category(rest),
        "/private" => match rest {
            "on" => Command::Private(true),
            "off" => Command::Private(false),
            _ => Command::Unknown(line),
        },
        "/publish" => Command::Publish,
        "/draft" => Command::Draft,
        "/sync" => Command::Sync,
        "/status" => Command::Status,
        "/discard" => Command::Discard,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(line),
    }
}

/// Run the shell until the user quits, stdin closes, or Ctrl-C arrives.
/// Pending edits are flushed on the way out.
pub async fn run(
    service: &mut EditorService,
    fires: &mut UnboundedReceiver<CommitDue>,
    monitor: &ConnectivityMonitor,
) -> Result<(), AppError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut online_rx = monitor.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("bozza editor. /help lists commands, plain lines extend the body.");

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(input)) => {
                        let input = input.trim();
                        if input.is_empty() {
                            continue;
                        }
                        if handle_line(service, input).await? {
                            break;
                        }
                    }
                    Ok(None) => {
                        println!();
                        break;
                    }
                    Err(err) => {
                        return Err(AppError::unexpected(format!(
                            "failed to read from stdin: {err}"
                        )));
                    }
                }
            }
            due = fires.recv() => {
                if let Some(due) = due {
                    if let Some(outcome) = service.scheduler_fired(due).await {
                        report_commit(&outcome, false);
                    }
                }
            }
            changed = online_rx.changed() => {
                if changed.is_err() {
                    continue;
                }
                let online = *online_rx.borrow_and_update();
                let was_online = service.is_online();
                if let Some(outcome) = service.set_connectivity(online).await {
                    report_reconcile(&outcome);
                } else if was_online && !online {
                    println!("connection lost, edits will be kept locally");
                }
            }
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    let outcome = service.flush().await;
    report_commit(&outcome, false);
    Ok(())
}

/// Apply one input line. Returns `true` when the shell should exit.
async fn handle_line(service: &mut EditorService, input: &str) -> Result<bool, AppError> {
    match parse_command(input) {
        Command::Title(text) => {
            service.set_title(text);
        }
        Command::Content(text) => {
            service.set_content(text);
        }
        Command::Append(text) => {
            let mut content = service.session().fields.content.clone();
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(text);
            service.set_content(content);
        }
        Command::Category(name) => {
            // Same closed list the frontend offers in its dropdown.
            if CATEGORIES.contains(&name) {
                service.set_category(name);
            } else {
                println!("unknown category {name}, one of: {}", CATEGORIES.join(", "));
            }
        }
        Command::Private(private) => {
            service.set_private(private);
            println!("visibility: {}", if private { "private" } else { "public" });
        }
        Command::Publish => match service.publish().await {
            Ok(outcome) => report_submit(&outcome),
            Err(err) => eprintln!("publish failed: {err}"),
        },
        Command::Draft => match service.save_draft().await {
            Ok(outcome) => report_submit(&outcome),
            Err(err) => eprintln!("draft save failed: {err}"),
        },
        Command::Sync => {
            let outcome = service.flush().await;
            report_commit(&outcome, true);
        }
        Command::Status => print_status(service),
        Command::Discard => match service.discard_snapshot(false).await {
            Ok(()) => println!("local snapshot dropped"),
            Err(err) => eprintln!("discard failed: {err}"),
        },
        Command::Help => print_help(),
        Command::Quit => return Ok(true),
        Command::Unknown(line) => {
            println!("unrecognized command: {line} (/help lists commands)");
        }
    }
    Ok(false)
}

fn report_commit(outcome: &CommitOutcome, verbose: bool) {
    match outcome {
        CommitOutcome::Skipped => {
            if verbose {
                println!("nothing to commit");
            }
        }
        CommitOutcome::Committed { draft_id } => println!("draft synced ({draft_id})"),
        CommitOutcome::SavedLocally { reason } => match reason {
            FallbackReason::Offline => println!("offline, draft kept locally"),
            FallbackReason::Anonymous => println!("not signed in, draft kept locally"),
            FallbackReason::RemoteFailed => println!("sync failed, draft kept locally"),
        },
    }
}

fn report_reconcile(outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::NoSnapshot => println!("back online"),
        ReconcileOutcome::ClearedBlank => println!("back online, dropped a blank local snapshot"),
        ReconcileOutcome::Synced { draft_id } => {
            println!("back online, local draft synced ({draft_id})");
        }
        ReconcileOutcome::Deferred => {
            println!("back online, local draft kept (sync deferred)");
        }
        ReconcileOutcome::Offline => {}
    }
}

fn report_submit(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Published { post, notice } => println!("{notice} (id {})", post.id),
        SubmitOutcome::DraftSaved { draft, notice } => println!("{notice} (id {})", draft.id),
        SubmitOutcome::SavedLocally { notice } => println!("{notice}"),
    }
}

fn print_status(service: &EditorService) {
    match serde_json::to_string_pretty(&service.status()) {
        Ok(json) => println!("{json}"),
        Err(err) => warn!(error = %err, "could not render status"),
    }
    if let Some(snapshot) = service.peek_snapshot() {
        println!("local snapshot: {} (from {})", snapshot.title, snapshot.last_modified);
    } else {
        println!("local snapshot: none");
    }
}

fn print_help() {
    println!("  /title <text>     set the title");
    println!("  /content <text>   replace the body");
    println!("  <text>            append a line to the body");
    println!("  /category <name>  set the category");
    println!("  /private on|off   toggle publish visibility");
    println!("  /publish          publish the post");
    println!("  /draft            save to the server draft box");
    println!("  /sync             commit pending edits now");
    println!("  /status           show engine and snapshot state");
    println!("  /discard          drop the local snapshot");
    println!("  /quit             flush and exit");
}
