use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::api::ChatRequest;
use crate::core::chat_stream::{ApiError, CompletionService, FragmentStream};
use crate::core::session::StreamObserver;

type Scripted = Result<Vec<Result<String, ApiError>>, ApiError>;

/// Completion service that replays canned responses in order and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedService {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragments(self, fragments: &[&str]) -> Self {
        self.with_stream(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    pub fn with_stream(self, items: Vec<Result<String, ApiError>>) -> Self {
        self.script.lock().unwrap().push_back(Ok(items));
        self
    }

    pub fn with_error(self, error: ApiError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left");
        next.map(|items| Box::pin(stream::iter(items)) as FragmentStream)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub started: Vec<String>,
    pub updates: Vec<String>,
    pub completed: Option<String>,
    pub errors: Vec<ApiError>,
}

impl StreamObserver for RecordingObserver {
    fn on_start(&mut self, model: &str) {
        self.started.push(model.to_string());
    }

    fn on_update(&mut self, display: &str) {
        self.updates.push(display.to_string());
    }

    fn on_complete(&mut self, content: &str) {
        self.completed = Some(content.to_string());
    }

    fn on_error(&mut self, error: &ApiError) {
        self.errors.push(error.clone());
    }
}
