//! Transcript rendering for a line-oriented terminal
//!
//! Rendering is a pure function of the transcript: the same messages always
//! produce the same lines. The system prompt is never shown.

use std::io::{self, Write};

use colored::Colorize;

use crate::core::chat_stream::ApiError;
use crate::core::message::{Message, Role};
use crate::core::session::{StreamObserver, CURSOR_MARKER};
use crate::utils::logging::USER_PREFIX;

pub const ASSISTANT_PREFIX: &str = "Mentor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub role: Role,
    pub content: String,
}

/// The visible part of a transcript, in order.
pub fn display_messages(messages: &[Message]) -> Vec<DisplayMessage> {
    messages
        .iter()
        .filter(|message| !message.is_system())
        .map(|message| DisplayMessage {
            role: message.role,
            content: message.content.clone(),
        })
        .collect()
}

fn label(role: Role, color: bool) -> String {
    let text = match role {
        Role::User => USER_PREFIX,
        Role::Assistant => ASSISTANT_PREFIX,
        Role::System => "System",
    };
    let text = format!("{text}:");
    if !color {
        return text;
    }
    match role {
        Role::User => text.truecolor(255, 10, 120).bold().to_string(),
        Role::Assistant => text.truecolor(10, 255, 157).bold().to_string(),
        Role::System => text.dimmed().to_string(),
    }
}

pub fn format_message(message: &DisplayMessage, color: bool) -> String {
    let body = if color && message.role.is_user() {
        message.content.truecolor(255, 10, 120).to_string()
    } else {
        message.content.clone()
    };
    if message.content.contains('\n') {
        format!("{}\n{body}", label(message.role, color))
    } else {
        format!("{} {body}", label(message.role, color))
    }
}

pub fn render_transcript(messages: &[Message], color: bool) -> String {
    display_messages(messages)
        .iter()
        .map(|message| format!("{}\n", format_message(message, color)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_error(error: &dyn std::fmt::Display, color: bool) -> String {
    let text = format!("❌ Error: {error}");
    if color {
        text.red().to_string()
    } else {
        text
    }
}

/// Streams the in-progress reply to a terminal. Each update prints only the
/// text that is new since the previous update, then redraws the cursor
/// marker; the marker is erased once the reply is final.
///
/// The first write failure is kept and later writes are skipped; callers
/// collect it with [`TerminalObserver::take_error`].
pub struct TerminalObserver<W: Write> {
    out: W,
    color: bool,
    shown: usize,
    cursor_visible: bool,
    error: Option<io::Error>,
}

impl<W: Write> TerminalObserver<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            shown: 0,
            cursor_visible: false,
            error: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn emit(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!("failed to write reply to terminal: {err}");
            self.error = Some(err);
        }
    }

    fn erase_cursor(&mut self) {
        if self.cursor_visible {
            self.emit("\u{8} \u{8}");
            self.cursor_visible = false;
        }
    }
}

impl<W: Write> StreamObserver for TerminalObserver<W> {
    fn on_start(&mut self, _model: &str) {
        self.shown = 0;
        self.cursor_visible = false;
        let label = label(Role::Assistant, self.color);
        self.emit(&format!("{label} "));
    }

    fn on_update(&mut self, display: &str) {
        let buffer = display.strip_suffix(CURSOR_MARKER).unwrap_or(display);
        self.erase_cursor();
        let new_text = buffer.get(self.shown..).unwrap_or_default();
        self.emit(&format!("{new_text}{CURSOR_MARKER}"));
        self.shown = buffer.len();
        self.cursor_visible = true;
    }

    fn on_complete(&mut self, _content: &str) {
        self.erase_cursor();
        self.emit("\n\n");
    }

    fn on_error(&mut self, error: &ApiError) {
        self.erase_cursor();
        let message = format_error(error, self.color);
        self.emit(&format!("\n{message}\n\n"));
    }
}
