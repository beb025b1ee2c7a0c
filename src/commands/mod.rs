//! Slash commands
//!
//! Input starting with `/` is looked up in the command registry; anything else
//! is a prompt for the model.

mod registry;

pub use registry::{all_commands, find_command, Command, CommandInvocation};

use std::path::PathBuf;

use crate::core::app::App;
use crate::ui::render::render_transcript;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Nothing to do (blank input).
    Continue,
    /// Informational output for the user.
    Info(String),
    /// A command failed; the transcript is unchanged.
    Error(String),
    /// Send this text as the next user message.
    ProcessAsMessage(String),
    Quit,
}

pub fn process_input(app: &mut App, input: &str) -> CommandResult {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return CommandResult::Continue;
    }
    if !trimmed.starts_with('/') {
        return CommandResult::ProcessAsMessage(input.trim_end_matches(['\r', '\n']).to_string());
    }

    let mut parts = trimmed[1..].splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::Error("Type /help to see available commands.".to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match find_command(command_name) {
        Some(command) => {
            tracing::debug!(command = command.name, "running command");
            (command.handler)(app, CommandInvocation { args })
        }
        None => CommandResult::Error(format!(
            "Unknown command: /{command_name}. Type /help to see available commands."
        )),
    }
}

/// Strip one pair of matching quotes so paths with spaces can be pasted.
fn path_arg(args: &str) -> Option<PathBuf> {
    let args = args.trim();
    if args.is_empty() {
        return None;
    }
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| args.strip_prefix(*q).and_then(|rest| rest.strip_suffix(*q)))
        .unwrap_or(args);
    Some(PathBuf::from(unquoted))
}

pub(super) fn handle_help(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let width = all_commands()
        .iter()
        .map(|command| command.usage.len())
        .max()
        .unwrap_or(0);
    let mut help = String::from("Commands:\n");
    for command in all_commands() {
        help.push_str(&format!("  {:<width$}  {}\n", command.usage, command.help));
    }
    help.push_str("\nAnything else is sent to the model as your message.");
    CommandResult::Info(help)
}

pub(super) fn handle_model(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let current = app.session.model();
        let mut listing = String::from("Available models:\n");
        for model in app.session.catalog().iter() {
            let marker = if model == current { "*" } else { " " };
            listing.push_str(&format!("  {marker} {model}\n"));
        }
        return CommandResult::Info(listing.trim_end().to_string());
    }

    match app.session.select_model(invocation.args) {
        Ok(()) => CommandResult::Info(format!("Model set to {}", app.session.model())),
        Err(err) => CommandResult::Error(err.to_string()),
    }
}

pub(super) fn handle_file(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let Some(path) = path_arg(invocation.args) else {
        return CommandResult::Error("Usage: /file <PATH>".to_string());
    };

    match app.upload_file(&path) {
        Ok(upload) => CommandResult::Info(format!(
            "File `{}` uploaded ({} bytes). It will be sent with your next message.",
            upload.name,
            upload.content.len()
        )),
        Err(err) => CommandResult::Error(err.to_string()),
    }
}

pub(super) fn handle_image(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let Some(path) = path_arg(invocation.args) else {
        return CommandResult::Error("Usage: /image <PATH>".to_string());
    };

    match app.attach_image(&path) {
        Ok(image) => CommandResult::Info(format!(
            "Image attached: {} (shown only; not sent to the model)",
            image.summary()
        )),
        Err(err) => CommandResult::Error(err.to_string()),
    }
}

pub(super) fn handle_images(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let images = app.session.images();
    if images.is_empty() {
        return CommandResult::Info("No images attached.".to_string());
    }
    let listing: Vec<String> = images
        .iter()
        .enumerate()
        .map(|(i, image)| format!("  {}. {}", i + 1, image.summary()))
        .collect();
    CommandResult::Info(format!("Attached images:\n{}", listing.join("\n")))
}

pub(super) fn handle_history(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    if app.session.conversation().is_empty() {
        return CommandResult::Info("No messages yet.".to_string());
    }
    CommandResult::Info(
        render_transcript(app.session.messages(), app.color)
            .trim_end()
            .to_string(),
    )
}

pub(super) fn handle_log(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        return match app.log.toggle_logging() {
            Ok(message) => CommandResult::Info(message),
            Err(e) => CommandResult::Error(format!("Log error: {e}")),
        };
    }

    let Some(path) = path_arg(invocation.args) else {
        return CommandResult::Error("Usage: /log [FILE]".to_string());
    };
    match app.log.set_log_file(path.to_string_lossy().into_owned()) {
        Ok(message) => CommandResult::Info(message),
        Err(e) => CommandResult::Error(format!("Logfile error: {e}")),
    }
}

pub(super) fn handle_quit(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
