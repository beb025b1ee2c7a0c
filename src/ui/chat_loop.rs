//! Interactive chat loop
//!
//! One line of input is one interaction: it either runs a slash command or
//! becomes a user message that is submitted right away. Submissions run to
//! completion before the next line is read, so only one request is ever in
//! flight.

use std::io::{self, Write};

use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::commands::{process_input, CommandResult};
use crate::core::app::App;
use crate::core::chat_stream::CompletionService;
use crate::ui::render::{format_error, TerminalObserver};

pub const PROMPT: &str = "> ";

pub fn banner(app: &App) -> String {
    let title = format!(
        "Code Mentor v{} - {} • Logging: {}",
        env!("CARGO_PKG_VERSION"),
        app.session.model(),
        app.log.get_status_string()
    );
    let title = if app.color {
        title.truecolor(10, 255, 157).bold().to_string()
    } else {
        title
    };
    format!("{title}\nType /help for commands, /quit to leave.\n")
}

pub async fn run_chat(app: &mut App, service: &dyn CompletionService) -> io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = io::stdout();
    run_chat_with(app, service, stdin, stdout.lock()).await
}

pub async fn run_chat_with<R, W>(
    app: &mut App,
    service: &dyn CompletionService,
    input: R,
    mut out: W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "{}", banner(app))?;
    let mut lines = input.lines();

    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match process_input(app, &line) {
            CommandResult::Continue => {}
            CommandResult::Info(message) => writeln!(out, "{message}\n")?,
            CommandResult::Error(message) => {
                writeln!(out, "{}\n", format_error(&message, app.color))?
            }
            CommandResult::ProcessAsMessage(text) => {
                app.add_user_message(text);
                let mut observer = TerminalObserver::new(&mut out, app.color);
                app.submit(service, &mut observer).await;
                if let Some(err) = observer.take_error() {
                    return Err(err);
                }
            }
            CommandResult::Quit => break,
        }
    }

    tracing::debug!(messages = app.session.len(), "chat session ended");
    Ok(())
}
