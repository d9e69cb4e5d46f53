//! CLI interface for the inbox client
//!
//! Command parsing, row formatting, and the interactive control loop that
//! reads stdin while background refreshes update the inbox.

use crate::error::{ClientError, Result};
use crate::inbox::ConversationSummary;
use crate::models::{Delivery, Message, MessageId, NetworkUser};
use crate::services::Messenger;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Command types for the interactive loop
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Open(i64),
    Read(i64),
    Send { to: i64, text: String },
    /// Plain text, sent to the open conversation
    Message(String),
    /// Search the network directory by name, username or company
    Search(String),
    Refresh,
    Retry,
    Discard,
    Quit,
}

fn parse_user_id(raw: &str, usage: &str) -> std::result::Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("Usage: {}", usage))
}

impl Command {
    /// Parse a command string
    pub fn parse(input: &str) -> std::result::Result<Self, String> {
        let input = input.trim();

        match input {
            "/quit" | "/exit" => return Ok(Command::Quit),
            "/list" => return Ok(Command::List),
            "/refresh" => return Ok(Command::Refresh),
            "/retry" => return Ok(Command::Retry),
            "/discard" => return Ok(Command::Discard),
            "/search" => return Ok(Command::Search(String::new())),
            _ => {}
        }

        if let Some(rest) = input.strip_prefix("/search ") {
            return Ok(Command::Search(rest.trim().to_string()));
        }

        if let Some(rest) = input.strip_prefix("/open ") {
            return parse_user_id(rest, "/open <user_id>").map(Command::Open);
        }

        if let Some(rest) = input.strip_prefix("/read ") {
            return parse_user_id(rest, "/read <user_id>").map(Command::Read);
        }

        if let Some(rest) = input.strip_prefix("/msg ") {
            let usage = "/msg <user_id> <text>";
            let (to, text) = rest
                .trim_start()
                .split_once(' ')
                .ok_or_else(|| format!("Usage: {}", usage))?;
            return Ok(Command::Send {
                to: parse_user_id(to, usage)?,
                text: text.to_string(),
            });
        }

        if input.starts_with('/') {
            return Err(format!("Unknown command: {}", input));
        }

        Ok(Command::Message(input.to_string()))
    }
}

/// Parse a command from user input
pub fn parse_command(input: &str) -> Result<Command> {
    Command::parse(input).map_err(ClientError::InvalidCommand)
}

/// Format one conversation list row
pub fn format_summary(row: &ConversationSummary) -> String {
    let mut line = format!(
        "{} (#{}) {}: {}",
        if row.unread > 0 { format!("[{}]", row.unread) } else { "   ".to_string() },
        row.counterparty.id,
        row.counterparty.name,
        row.preview
    );
    if !row.relative_time.is_empty() {
        line.push_str(&format!(" - {}", row.relative_time));
    }
    if row.has_failed_send {
        line.push_str(" !");
    }
    line
}

/// Format one thread line
pub fn format_thread_line(message: &Message, local_user_id: i64, counterparty_name: &str) -> String {
    let who = if message.is_from(local_user_id) { "you" } else { counterparty_name };
    let status = match &message.delivery {
        Delivery::Confirmed => String::new(),
        Delivery::Sending => " (sending)".to_string(),
        Delivery::Sent => " (sent)".to_string(),
        Delivery::Failed(reason) => format!(" (failed: {})", reason),
    };
    format!("<{}> {}{}", who, message.content, status)
}

/// Format one network search result
pub fn format_user(user: &NetworkUser) -> String {
    let mut line = format!("(#{}) {}", user.id, user.name);
    if let Some(username) = &user.username {
        line.push_str(&format!(" @{}", username));
    }
    if let Some(company) = &user.company {
        line.push_str(&format!(" - {}", company));
    }
    line
}

pub fn format_badge(unread: usize) -> String {
    match unread {
        0 => "No unread messages".to_string(),
        1 => "1 unread message".to_string(),
        n => format!("{} unread messages", n),
    }
}

/// Async stdin reader that yields one line at a time
///
/// # Returns
/// - `Ok(Some(line))` - User entered a line
/// - `Ok(None)` - EOF reached (Ctrl+D)
/// - `Err(e)` - I/O error
pub async fn read_line_async(reader: &mut BufReader<tokio::io::Stdin>) -> Result<Option<String>> {
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => Ok(None),
        Ok(_) => {
            let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
            Ok(Some(trimmed))
        }
        Err(e) => Err(e.into()),
    }
}

/// Read stdin on its own task; `read_line` is not cancel-safe, so it must
/// not sit directly in a `select!`.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin());
        loop {
            match read_line_async(&mut reader).await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

async fn print_list(messenger: &Messenger) {
    let rows = messenger.summaries().await;
    if rows.is_empty() {
        println!("No conversations yet");
    }
    for row in &rows {
        println!("{}", format_summary(row));
    }
    println!("{}", format_badge(messenger.unread_badge().await));
}

async fn print_thread(messenger: &Messenger, counterparty_id: i64) {
    let name = messenger
        .inbox()
        .await
        .user(counterparty_id)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| format!("#{}", counterparty_id));

    let thread = messenger.thread(counterparty_id).await;
    if thread.is_empty() {
        println!("No messages with {}", name);
    }
    for message in &thread {
        println!("{}", format_thread_line(message, messenger.local_user_id(), &name));
    }
}

async fn print_search(messenger: &Messenger, query: &str) {
    let users = messenger.search_network(query).await;
    if users.is_empty() {
        println!("No connections match \"{}\"", query);
    }
    for user in &users {
        println!("{}", format_user(user));
    }
}

async fn failed_sends(messenger: &Messenger) -> Vec<MessageId> {
    messenger
        .inbox()
        .await
        .outstanding()
        .into_iter()
        .filter(|m| matches!(m.delivery, Delivery::Failed(_)))
        .map(|m| m.id)
        .collect()
}

/// Discard the given sends, reporting but skipping any that are already
/// gone (a refresh may have reconciled them in the meantime).
///
/// Returns how many were discarded.
pub async fn discard_sends(messenger: &Messenger, ids: Vec<MessageId>) -> usize {
    let mut discarded = 0;
    for id in ids {
        match messenger.discard(id).await {
            Ok(_) => discarded += 1,
            Err(e) => println!("Discard failed: {}", e),
        }
    }
    discarded
}

/// Run the interactive loop until /quit or EOF
pub async fn run_client_loop(messenger: Arc<Messenger>) -> Result<()> {
    let mut lines = spawn_stdin_reader();
    let mut revisions = messenger.subscribe();
    let mut open: Option<i64> = None;
    let mut last_badge = messenger.unread_badge().await;

    println!(
        "Commands: /list /open <id> /read <id> /msg <id> <text> /search <text> /refresh /retry /discard /quit"
    );

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            changed = revisions.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let badge = messenger.unread_badge().await;
                if badge != last_badge {
                    println!("\n{}", format_badge(badge));
                    last_badge = badge;
                }
                continue;
            }
        };

        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Quit => return Ok(()),
            Command::List => print_list(&messenger).await,
            Command::Open(id) => {
                open = Some(id);
                print_thread(&messenger, id).await;
                let _ = messenger.mark_read(id).await;
            }
            Command::Read(id) => {
                let (flipped, _) = messenger.mark_read(id).await;
                println!("Marked {} message(s) read", flipped);
            }
            Command::Send { to, text } => {
                if let Err(e) = messenger.send(to, &text).await {
                    println!("Send failed: {}", e);
                }
            }
            Command::Message(text) => match open {
                Some(to) => {
                    if let Err(e) = messenger.send(to, &text).await {
                        println!("Send failed: {}", e);
                    }
                }
                None => println!("Open a conversation first: /open <user_id>"),
            },
            Command::Refresh => match messenger.refresh().await {
                Ok(_) => print_list(&messenger).await,
                Err(e) => println!("Refresh failed: {}", e),
            },
            Command::Retry => {
                for id in failed_sends(&messenger).await {
                    if let Err(e) = messenger.retry(id).await {
                        println!("Retry failed: {}", e);
                    }
                }
            }
            Command::Discard => {
                let ids = failed_sends(&messenger).await;
                let discarded = discard_sends(&messenger, ids).await;
                println!("Discarded {} message(s)", discarded);
            }
            Command::Search(query) => print_search(&messenger, &query).await,
        }
    }
}
