//! Interactive application state
//!
//! [`App`] bundles the conversation [`Session`] with the per-run settings the
//! front end needs (transcript log, color). It is created when the chat
//! starts and dropped when it ends.

use std::path::Path;

use crate::core::chat_stream::CompletionService;
use crate::core::config::Config;
use crate::core::message::Message;
use crate::core::session::{Session, StreamObserver, SubmitOutcome};
use crate::core::uploads::{ImageAttachment, TextUpload, UploadError};
use crate::utils::logging::TranscriptLog;

pub struct App {
    pub session: Session,
    pub log: TranscriptLog,
    pub color: bool,
}

impl App {
    pub fn new(session: Session, log: TranscriptLog, color: bool) -> Self {
        Self {
            session,
            log,
            color,
        }
    }

    pub fn from_config(config: &Config, log: TranscriptLog) -> Self {
        Self::new(Session::from_config(config), log, config.color_enabled())
    }

    fn record(&self, message: &Message) {
        if let Err(err) = self.log.log_message(message) {
            tracing::warn!("failed to write transcript log: {err}");
        }
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        let message = self.session.append_user(content).clone();
        self.record(&message);
    }

    pub fn upload_file(&mut self, path: &Path) -> Result<TextUpload, UploadError> {
        let upload = TextUpload::read(path)?;
        let message = self.session.upload_text(&upload).clone();
        self.record(&message);
        Ok(upload)
    }

    pub fn attach_image(&mut self, path: &Path) -> Result<ImageAttachment, UploadError> {
        let image = ImageAttachment::read(path)?;
        tracing::debug!(image = %image.summary(), "image attached for display");
        Ok(self.session.attach_image(image).clone())
    }

    pub async fn submit(
        &mut self,
        service: &dyn CompletionService,
        observer: &mut dyn StreamObserver,
    ) -> SubmitOutcome {
        let outcome = self.session.submit(service, observer).await;
        if outcome.is_completed() {
            if let Some(message) = self.session.messages().last().cloned() {
                self.record(&message);
            }
        }
        outcome
    }
}
