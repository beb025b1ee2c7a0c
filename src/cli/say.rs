//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::core::app::App;
use crate::core::chat_stream::CompletionService;
use crate::core::session::{StreamObserver, SubmitOutcome, CURSOR_MARKER};

/// Prints only the new text of each update; no labels or cursor.
struct PlainObserver<W: Write> {
    out: W,
    shown: usize,
    error: Option<io::Error>,
}

impl<W: Write> PlainObserver<W> {
    fn emit(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!("failed to write reply: {err}");
            self.error = Some(err);
        }
    }
}

impl<W: Write> StreamObserver for PlainObserver<W> {
    fn on_update(&mut self, display: &str) {
        let buffer = display.strip_suffix(CURSOR_MARKER).unwrap_or(display);
        if let Some(new_text) = buffer.get(self.shown..) {
            self.emit(new_text);
        }
        self.shown = buffer.len();
    }

    fn on_complete(&mut self, _content: &str) {
        self.emit("\n");
    }
}

pub async fn run_say_with<W: Write>(
    app: &mut App,
    service: &dyn CompletionService,
    prompt: Vec<String>,
    out: W,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: codementor say <prompt>".into());
    }

    app.add_user_message(prompt);
    let mut observer = PlainObserver {
        out,
        shown: 0,
        error: None,
    };
    match app.submit(service, &mut observer).await {
        SubmitOutcome::Completed { .. } => match observer.error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        },
        SubmitOutcome::Failed { error } => Err(error.into()),
    }
}

pub async fn run_say(
    app: &mut App,
    service: &dyn CompletionService,
    prompt: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    run_say_with(app, service, prompt, io::stdout()).await
}
