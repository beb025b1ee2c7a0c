//! Plain-text transcript log
//!
//! When enabled, every user and assistant turn is appended to a file in the
//! same shape it is shown on screen. Logging can be paused and resumed
//! without losing the target path.

use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const USER_PREFIX: &str = "You";

#[derive(Debug, Default)]
pub struct TranscriptLog {
    file_path: Option<String>,
    is_active: bool,
}

impl TranscriptLog {
    /// A log given on the command line starts active.
    pub fn new(log_file: Option<String>) -> io::Result<Self> {
        let mut log = TranscriptLog::default();
        if let Some(path) = log_file {
            log.set_log_file(path)?;
        }
        Ok(log)
    }

    pub fn set_log_file(&mut self, path: String) -> io::Result<String> {
        test_file_access(&path)?;

        self.file_path = Some(path.clone());
        self.is_active = true;
        self.log_marker(&format!(
            "Logging started {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ))?;

        Ok(format!("Logging enabled to: {path}"))
    }

    pub fn toggle_logging(&mut self) -> Result<String, String> {
        match self.file_path.clone() {
            Some(path) => {
                if self.is_active {
                    self.log_marker("Logging paused")
                        .map_err(|e| format!("Failed to write to {path}: {e}"))?;
                    self.is_active = false;
                    Ok(format!("Logging paused (file: {path})"))
                } else {
                    self.is_active = true;
                    Ok(format!("Logging resumed to: {path}"))
                }
            }
            None => {
                Err("No log file specified. Use /log <filename> to enable logging first.".into())
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Append one transcript turn. System messages are not logged.
    pub fn log_message(&self, message: &Message) -> io::Result<()> {
        match message.role {
            Role::System => Ok(()),
            Role::User => self.write_block(&format!("{USER_PREFIX}: {}", message.content)),
            Role::Assistant => self.write_block(&message.content),
        }
    }

    fn log_marker(&self, text: &str) -> io::Result<()> {
        self.write_block(&format!("## {text}"))
    }

    fn write_block(&self, content: &str) -> io::Result<()> {
        let Some(file_path) = self.file_path.as_deref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between turns, matching the screen.
        writeln!(writer)?;

        writer.flush()
    }

    pub fn get_status_string(&self) -> String {
        let file_name = |path: &str| {
            Path::new(path)
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }
}

fn test_file_access(path: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()
}
