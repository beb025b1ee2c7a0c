//! Streaming completion client
//!
//! [`CompletionService`] is the seam between the conversation session and the
//! hosted model. A service turns one [`ChatRequest`] into a lazy, finite
//! [`FragmentStream`] of text fragments. [`OpenAiService`] implements it on top
//! of the OpenAI-compatible `chat/completions` endpoint, decoding the
//! Server-Sent Events body as it arrives.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use memchr::memchr;
use thiserror::Error;

use crate::api::{ChatRequest, ChatResponse};
use crate::core::config::ApiSettings;
use crate::utils::url::construct_api_url;

/// Any failure reported by, or on the way to, the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("OPENAI_API_KEY is not set. Export your API key to send messages:\n  export OPENAI_API_KEY=\"your-api-key-here\"")]
    MissingCredential,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("API request failed with status {status}\n{body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Stream(String),
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ApiError>> + Send>>;

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send the request and return the response as a fragment stream. Errors
    /// before the first byte are returned directly; later failures arrive as
    /// an `Err` item that ends the stream.
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ApiError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseEvent {
    Chunk(String),
    Error(String),
    Done,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str) -> Option<SseEvent> {
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map(SseEvent::Chunk),
        Err(_) => {
            if payload.trim().is_empty() {
                return None;
            }
            Some(SseEvent::Error(format_api_error(payload)))
        }
    }
}

fn process_sse_line(line: &str) -> Option<SseEvent> {
    extract_data_payload(line).and_then(handle_data_payload)
}

/// Incremental Server-Sent Events decoder. Bytes may be split anywhere,
/// including inside a multi-byte character; only complete lines are decoded.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let event = match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(line) => process_sse_line(line.trim()),
                Err(err) => Some(SseEvent::Error(format!("invalid UTF-8 in stream: {err}"))),
            };
            self.buffer.drain(..=newline_pos);

            if let Some(event) = event {
                let terminal = !matches!(event, SseEvent::Chunk(_));
                events.push(event);
                if terminal {
                    self.finished = true;
                    self.buffer.clear();
                    break;
                }
            }
        }

        events
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.finished || self.buffer.is_empty() {
            self.finished = true;
            return Vec::new();
        }
        let events = self.push(b"\n");
        self.finished = true;
        events
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an error body from the API for display in the transcript.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {summary}\n```json\n{pretty_json}\n```");
                }
            }
            return format!("API Error:\n```json\n{pretty_json}\n```");
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}

struct DecodeState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, ApiError>>,
}

impl<S> DecodeState<S> {
    fn enqueue(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Chunk(text) => self.pending.push_back(Ok(text)),
                SseEvent::Error(message) => self.pending.push_back(Err(ApiError::Stream(message))),
                SseEvent::Done => {}
            }
        }
    }
}

/// Adapt a raw SSE byte stream into a fragment stream. The result is lazy:
/// the body is only polled when the consumer asks for the next fragment.
pub fn decode_sse<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.decoder.is_finished() {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(bytes.as_ref());
                    state.enqueue(events);
                }
                Some(Err(err)) => {
                    state.decoder = SseDecoder {
                        finished: true,
                        ..SseDecoder::default()
                    };
                    state
                        .pending
                        .push_back(Err(ApiError::Transport(err.to_string())));
                }
                None => {
                    let events = state.decoder.finish();
                    state.enqueue(events);
                }
            }
        }
    }))
}

/// Completion service for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiService {
    pub fn new(settings: ApiSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(client: reqwest::Client, settings: ApiSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url,
            api_key: settings.api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionService for OpenAiService {
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ApiError> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::MissingCredential)?;
        let chat_url = construct_api_url(&self.base_url, "chat/completions");

        tracing::debug!(
            url = %chat_url,
            model = %request.model,
            messages = request.messages.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            tracing::debug!(status = status.as_u16(), "completion request rejected");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: format_api_error(&error_text),
            });
        }

        Ok(decode_sse(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatMessage;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn chunk_line(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn process_sse_line_handles_spacing_variants() {
        let variants = [
            (
                r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
                "Hello",
                "data: [DONE]",
            ),
            (
                r#"data:{"choices":[{"delta":{"content":"World"}}]}"#,
                "World",
                "data:[DONE]",
            ),
        ];

        for (chunk_line, expected_chunk, done_line) in variants {
            assert_eq!(
                process_sse_line(chunk_line),
                Some(SseEvent::Chunk(expected_chunk.to_string()))
            );
            assert_eq!(process_sse_line(done_line), Some(SseEvent::Done));
        }
    }

    #[test]
    fn process_sse_line_ignores_comments_and_role_only_deltas() {
        assert_eq!(process_sse_line(": keep-alive"), None);
        assert_eq!(process_sse_line("event: message"), None);
        assert_eq!(process_sse_line("data: "), None);
        assert_eq!(
            process_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            None
        );
        assert_eq!(process_sse_line(r#"data: {"choices":[]}"#), None);
    }

    #[test]
    fn process_sse_line_routes_stream_errors() {
        let error_line = r#"data: {"error":{"message":"internal server error"}}"#;
        let expected = r#"API Error: internal server error
```json
{
  "error": {
    "message": "internal server error"
  }
}
```"#;
        assert_eq!(
            process_sse_line(error_line),
            Some(SseEvent::Error(expected.to_string()))
        );
    }

    #[test]
    fn decoder_reassembles_split_lines_and_stops_at_done() {
        let mut decoder = SseDecoder::new();
        let full = format!(
            "{}{}data: [DONE]\n\n{}",
            chunk_line("Hel"),
            chunk_line("lo"),
            chunk_line("ignored")
        );
        let (first, second) = full.as_bytes().split_at(17);

        let mut events = decoder.push(first);
        assert!(events.is_empty());
        events.extend(decoder.push(second));

        assert_eq!(
            events,
            vec![
                SseEvent::Chunk("Hel".to_string()),
                SseEvent::Chunk("lo".to_string()),
                SseEvent::Done,
            ]
        );
        assert!(decoder.is_finished());
        assert!(decoder.push(chunk_line("late").as_bytes()).is_empty());
    }

    #[test]
    fn decoder_handles_multibyte_characters_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let line = chunk_line("héllo ▌");
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;

        let mut events = decoder.push(&bytes[..split]);
        events.extend(decoder.push(&bytes[split..]));
        assert_eq!(events, vec![SseEvent::Chunk("héllo ▌".to_string())]);
    }

    #[test]
    fn decoder_flushes_unterminated_tail() {
        let mut decoder = SseDecoder::new();
        let line = chunk_line("tail");
        assert!(decoder.push(line.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Chunk("tail".to_string())]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn decoder_stops_at_invalid_utf8() {
        let mut decoder = SseDecoder::new();
        let mut body = chunk_line("Hel").into_bytes();
        body.extend_from_slice(b"data: {\"choices\":[{\"delta\":{\"content\":\"\xFF\"}}]}\n\n");
        body.extend_from_slice(chunk_line("lo").as_bytes());
        body.extend_from_slice(b"data: [DONE]\n\n");

        let events = decoder.push(&body);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SseEvent::Chunk("Hel".to_string()));
        match &events[1] {
            SseEvent::Error(message) => assert!(message.starts_with("invalid UTF-8 in stream")),
            other => panic!("expected error, got {other:?}"),
        }
        assert!(decoder.is_finished());
        assert!(decoder.finish().is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_fails_the_submission() {
        let mut bad_line = b"data: {\"choices\":[{\"delta\":{\"content\":\"".to_vec();
        bad_line.extend_from_slice(b"\xFF\"}}]}\n\n");
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(chunk_line("Hel").into_bytes()),
            Ok(bad_line),
            Ok(chunk_line("lo").into_bytes()),
            Ok(b"data: [DONE]\n\n".to_vec()),
        ];
        let items: Vec<_> = decode_sse(stream::iter(parts)).collect().await;

        let service = crate::utils::test_utils::ScriptedService::new().with_stream(items);
        let mut session = crate::core::session::Session::default();
        session.append_user("hi");
        let mut observer = crate::utils::test_utils::RecordingObserver::default();

        let outcome = session.submit(&service, &mut observer).await;

        assert!(!outcome.is_completed());
        assert_eq!(session.len(), 2);
        assert!(observer.completed.is_none());
        assert!(matches!(observer.errors.as_slice(), [ApiError::Stream(_)]));
    }

    #[test]
    fn format_api_error_prettifies_json_with_summary() {
        let raw = r#"{"error":{"message":"model overloaded","type":"invalid_request_error"}}"#;
        let expected = r#"API Error: model overloaded
```json
{
  "error": {
    "message": "model overloaded",
    "type": "invalid_request_error"
  }
}
```"#;
        assert_eq!(format_api_error(raw), expected);
    }

    #[test]
    fn format_api_error_handles_json_without_summary() {
        let raw = r#"{"status":"failed"}"#;
        let expected = "API Error:\n```json\n{\n  \"status\": \"failed\"\n}\n```";
        assert_eq!(format_api_error(raw), expected);
    }

    #[test]
    fn format_api_error_handles_xml_plaintext_and_empty() {
        assert_eq!(
            format_api_error("<error>bad</error>"),
            "API Error:\n```xml\n<error>bad</error>\n```"
        );
        assert_eq!(
            format_api_error("api failure"),
            "API Error:\n```\napi failure\n```"
        );
        assert_eq!(format_api_error("  \n"), "API Error:\n```\n<empty>\n```");
    }

    #[tokio::test]
    async fn decode_sse_is_lazy_and_reports_transport_errors() {
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(chunk_line("partial").into_bytes()),
            Err("connection reset".to_string()),
            Ok(chunk_line("never").into_bytes()),
        ];
        let mut fragments = decode_sse(stream::iter(parts));

        assert_eq!(fragments.next().await, Some(Ok("partial".to_string())));
        assert_eq!(
            fragments.next().await,
            Some(Err(ApiError::Transport("connection reset".to_string())))
        );
        assert_eq!(fragments.next().await, None);
    }

    fn request(model: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: true,
        }
    }

    /// Serve a single canned HTTP response and hand back the raw request.
    async fn serve_once(status_line: &str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let status_line = status_line.to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{status_line}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
            );
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (format!("http://{addr}/v1"), handle)
    }

    fn settings(base_url: String, api_key: Option<&str>) -> ApiSettings {
        ApiSettings {
            api_key: api_key.map(str::to_string),
            base_url,
        }
    }

    #[tokio::test]
    async fn openai_service_streams_fragments_and_sends_bearer_auth() {
        let body = format!("{}{}data: [DONE]\n\n", chunk_line("Hel"), chunk_line("lo"));
        let (base_url, server) = serve_once("HTTP/1.1 200 OK", body).await;
        let service = OpenAiService::new(settings(base_url, Some("sk-test")));

        let stream = service.stream(&request("gpt-4o")).await.expect("stream");
        let fragments: Vec<_> = stream.collect().await;
        assert_eq!(fragments, vec![Ok("Hel".to_string()), Ok("lo".to_string())]);

        let raw_request = server.await.expect("server task");
        assert!(raw_request.starts_with("POST /v1/chat/completions "));
        assert!(raw_request
            .to_ascii_lowercase()
            .contains("authorization: bearer sk-test"));
        assert!(raw_request.contains(r#""model":"gpt-4o""#));
        assert!(raw_request.contains(r#""stream":true"#));
    }

    #[tokio::test]
    async fn openai_service_maps_error_status() {
        let body = r#"{"error":{"message":"Incorrect API key provided"}}"#.to_string();
        let (base_url, server) = serve_once("HTTP/1.1 401 Unauthorized", body).await;
        let service = OpenAiService::new(settings(base_url, Some("bad")));

        let err = match service.stream(&request("gpt-4o")).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        match &err {
            ApiError::Status { status, body } => {
                assert_eq!(*status, 401);
                assert!(body.starts_with("API Error: Incorrect API key provided"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("status 401"));
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn openai_service_without_key_fails_before_sending() {
        let service = OpenAiService::new(settings("http://127.0.0.1:9/v1".to_string(), None));
        let result = service.stream(&request("gpt-4o")).await;
        assert!(matches!(result, Err(ApiError::MissingCredential)));
    }
}
