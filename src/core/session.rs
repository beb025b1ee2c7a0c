//! Conversation session
//!
//! A [`Session`] owns the transcript for one interactive user: an ordered
//! list of messages that always starts with the system prompt, the model
//! currently selected, and any images shown during the session. Nothing is
//! persisted; dropping the session discards the conversation.

use futures_util::StreamExt;
use thiserror::Error;

use crate::api::{ChatMessage, ChatRequest};
use crate::core::chat_stream::{ApiError, CompletionService};
use crate::core::config::Config;
use crate::core::message::{Message, Role};
use crate::core::models::ModelCatalog;
use crate::core::uploads::{ImageAttachment, TextUpload};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a highly skilled AI coding assistant. Your job is to:\n\
1. Provide optimized code solutions.\n\
2. Break down problems step by step.\n\
3. Offer best practices and explanations.\n\
4. Analyze uploaded code files.\n\
5. Process and analyze images (code snippets, diagrams, handwritten notes).\n\
6. Keep responses concise but informative.";

/// Shown after the partial response while fragments are still arriving.
pub const CURSOR_MARKER: char = '▌';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Unknown model '{model}'. Available models: {available}")]
    UnknownModel { model: String, available: String },
}

/// Result of one submission. A failed submission leaves the transcript as it
/// was before the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed { content: String },
    Failed { error: ApiError },
}

impl SubmitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SubmitOutcome::Completed { .. })
    }
}

/// Receives display updates while a submission streams.
pub trait StreamObserver {
    fn on_start(&mut self, _model: &str) {}

    /// Called once per fragment with the whole response so far followed by
    /// [`CURSOR_MARKER`].
    fn on_update(&mut self, display: &str);

    fn on_complete(&mut self, _content: &str) {}

    fn on_error(&mut self, _error: &ApiError) {}
}

/// Observer that discards every update.
pub struct NoopObserver;

impl StreamObserver for NoopObserver {
    fn on_update(&mut self, _display: &str) {}
}

#[derive(Debug, Clone)]
pub struct Session {
    messages: Vec<Message>,
    model: String,
    catalog: ModelCatalog,
    images: Vec<ImageAttachment>,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>, catalog: ModelCatalog) -> Self {
        let model = catalog.default_model().to_string();
        Self {
            messages: vec![Message::system(system_prompt)],
            model,
            catalog,
            images: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self::new(system_prompt, ModelCatalog::from_config(config))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn system_message(&self) -> &Message {
        &self.messages[0]
    }

    /// Messages after the system prompt, in submission order.
    pub fn conversation(&self) -> &[Message] {
        &self.messages[1..]
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let index = self.messages.len();
        self.messages.push(Message::new(role, content));
        &self.messages[index]
    }

    pub fn append_user(&mut self, content: impl Into<String>) -> &Message {
        self.append(Role::User, content)
    }

    pub fn upload_text(&mut self, upload: &TextUpload) -> &Message {
        tracing::debug!(
            file = %upload.name,
            bytes = upload.content.len(),
            "appending uploaded file"
        );
        self.append(Role::User, upload.message_content())
    }

    pub fn attach_image(&mut self, image: ImageAttachment) -> &ImageAttachment {
        let index = self.images.len();
        self.images.push(image);
        &self.images[index]
    }

    pub fn images(&self) -> &[ImageAttachment] {
        &self.images
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn select_model(&mut self, model: &str) -> Result<(), SessionError> {
        let model = model.trim();
        if !self.catalog.contains(model) {
            return Err(SessionError::UnknownModel {
                model: model.to_string(),
                available: self.catalog.iter().collect::<Vec<_>>().join(", "),
            });
        }
        if self.model != model {
            tracing::info!(from = %self.model, to = model, "model changed");
            self.model = model.to_string();
        }
        Ok(())
    }

    /// The payload for the next submission: the whole transcript and the
    /// selected model.
    pub fn completion_request(&self) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: self.messages.iter().map(ChatMessage::from).collect(),
            stream: true,
        }
    }

    /// Send the transcript and stream the reply. Fragments are concatenated in
    /// arrival order; the assistant message is appended only once the stream
    /// has ended without error.
    pub async fn submit(
        &mut self,
        service: &dyn CompletionService,
        observer: &mut dyn StreamObserver,
    ) -> SubmitOutcome {
        let request = self.completion_request();
        observer.on_start(&request.model);

        let mut fragments = match service.stream(&request).await {
            Ok(fragments) => fragments,
            Err(error) => return self.fail(error, observer),
        };

        let mut buffer = String::new();
        let mut display = String::new();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => {
                    buffer.push_str(&text);
                    display.clear();
                    display.push_str(&buffer);
                    display.push(CURSOR_MARKER);
                    observer.on_update(&display);
                }
                Err(error) => return self.fail(error, observer),
            }
        }

        tracing::debug!(
            model = %request.model,
            chars = buffer.chars().count(),
            "completion finished"
        );
        self.messages.push(Message::assistant(buffer.clone()));
        observer.on_complete(&buffer);
        SubmitOutcome::Completed { content: buffer }
    }

    fn fail(&self, error: ApiError, observer: &mut dyn StreamObserver) -> SubmitOutcome {
        tracing::warn!(model = %self.model, "completion failed: {error}");
        observer.on_error(&error);
        SubmitOutcome::Failed { error }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, ModelCatalog::builtin())
    }
}
