//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing `/chat/completions` in the
//! same shape (OpenRouter, Ollama, vLLM, LiteLLM proxies).
//!
//! Streaming responses are decoded from SSE into [`StreamChunk`]s that carry
//! the tool-call deltas exactly as received. Reassembling calls is left to
//! the agent.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use nanocode_config::AppConfig;
use nanocode_core::error::ProviderError;
use nanocode_core::message::{Message, Role};
use nanocode_core::provider::{
    ChunkStream, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallDelta,
    ToolDefinition, Usage,
};
use nanocode_core::tool::ToolCall;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Provider for the configured endpoint. Fails when no API key is set.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured(
                    "no API key: set NANOCODE_API_KEY or OPENAI_API_KEY, or api_key in config.toml".into(),
                )
            })?;
        Self::new("openai", config.base_url.clone(), api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }

    /// Convert our Message types to the chat-completions wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Vec<ApiToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect();
                ApiMessage {
                    role: match m.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                        Role::Tool => "tool".into(),
                    },
                    // An assistant turn that only calls tools sends null content.
                    content: if m.content.is_empty() && !tool_calls.is_empty() {
                        None
                    } else {
                        Some(m.content.clone())
                    },
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: m.tool_call_id.clone(),
                    name: m.tool_name.clone(),
                }
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    async fn send(&self, body: &serde_json::Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body);
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        } else {
            builder = builder.timeout(REQUEST_TIMEOUT);
        }
        let response = builder.send().await.map_err(transport_error)?;
        check_status(response).await
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        429 => {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(5);
            Err(ProviderError::RateLimited { retry_after_secs })
        }
        401 | 403 => Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        )),
        code => {
            let body = response.text().await.unwrap_or_default();
            warn!(status = code, body = %body, "Provider returned error");
            Err(ProviderError::ApiError {
                status_code: code,
                message: body,
            })
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let body = Self::request_body(&request, false);
        let response = self.send(&body, false).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ProviderResponse {
            message: Message::assistant_with_calls(choice.message.content.unwrap_or_default(), tool_calls),
            usage: api_response.usage.map(Into::into),
            model: api_response.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        debug!(provider = %self.name, model = %request.model, tools = request.tools.len(), "Sending streaming request");
        let body = Self::request_body(&request, true);
        let response = self.send(&body, true).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider = self.name.clone();

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(next) = bytes.next().await {
                let events = match next {
                    Ok(b) => decoder.push(&b),
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };
                for event in events {
                    if !forward(&tx, &provider, event).await {
                        return;
                    }
                }
            }
            for event in decoder.finish() {
                if !forward(&tx, &provider, event).await {
                    return;
                }
            }

            // Connection closed without [DONE].
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status().is_success())
    }
}

/// Send one decoded event downstream. Returns false when the stream is over,
/// either because it ended or because the receiver went away.
async fn forward(
    tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    provider: &str,
    event: SseEvent,
) -> bool {
    let item = match event {
        SseEvent::Done => {
            let _ = tx.send(Ok(StreamChunk::done())).await;
            return false;
        }
        SseEvent::Data(data) => match parse_data(&data) {
            Ok(Some(chunk)) => Ok(chunk),
            Ok(None) => return true,
            Err(ChunkError::Server(message)) => Err(ProviderError::StreamInterrupted(message)),
            Err(ChunkError::Malformed(e)) => {
                trace!(provider = %provider, data = %data, error = %e, "Ignoring unparseable SSE chunk");
                return true;
            }
        },
    };
    let fatal = item.is_err();
    tx.send(item).await.is_ok() && !fatal
}

// --- SSE decoding ---

#[derive(Debug, Clone, PartialEq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into SSE `data:` payloads. Bytes are buffered until
/// a full line is present, so multi-byte characters split across network
/// reads decode intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            events.extend(Self::decode_line(&line));
        }
        events
    }

    /// Flush a trailing line that never got its newline.
    fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line).into_iter().collect()
    }

    fn decode_line(line: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\n', '\r']);
        let data = line.strip_prefix("data:")?.trim();
        match data {
            "" => None,
            "[DONE]" => Some(SseEvent::Done),
            payload => Some(SseEvent::Data(payload.to_string())),
        }
    }
}

#[derive(Debug)]
enum ChunkError {
    Server(String),
    Malformed(serde_json::Error),
}

/// Turn one `data:` payload into a frame. Payloads with nothing for the
/// agent (role-only deltas, bare finish markers) yield `None`.
fn parse_data(data: &str) -> Result<Option<StreamChunk>, ChunkError> {
    let response: StreamResponse = serde_json::from_str(data).map_err(ChunkError::Malformed)?;
    if let Some(error) = response.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ChunkError::Server(message));
    }

    let mut chunk = StreamChunk {
        usage: response.usage.map(Into::into),
        ..StreamChunk::default()
    };
    if let Some(choice) = response.choices.into_iter().next() {
        chunk.content = choice.delta.content.filter(|c| !c.is_empty());
        chunk.tool_calls = choice
            .delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|d| {
                let (name, arguments) = d
                    .function
                    .map(|f| (f.name.unwrap_or_default(), f.arguments.unwrap_or_default()))
                    .unwrap_or_default();
                ToolCallDelta {
                    id: d.id.unwrap_or_default(),
                    name,
                    arguments,
                }
            })
            .collect();
    }

    Ok((chunk != StreamChunk::default()).then_some(chunk))
}

// --- Wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// A single SSE `data: {...}` payload from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tools: Vec<ToolDefinition>) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            temperature: 0.2,
            max_tokens: Some(512),
            tools,
            stream: true,
        }
    }

    #[test]
    fn base_url_is_normalized() {
        let provider = OpenAiCompatProvider::new("local", "http://localhost:11434/v1/", "k").unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(provider.name(), "local");
    }

    #[test]
    fn from_config_requires_api_key() {
        let mut config = AppConfig::default();
        config.api_key = None;
        assert!(matches!(
            OpenAiCompatProvider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));

        config.api_key = Some("sk-test".into());
        let provider = OpenAiCompatProvider::from_config(&config).unwrap();
        assert!(provider.endpoint().starts_with(&config.base_url));
    }

    #[test]
    fn streaming_body_has_tools_and_usage_option() {
        let tools = vec![ToolDefinition {
            name: "bash".into(),
            description: "Run a shell command".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let body = OpenAiCompatProvider::request_body(&request(tools), true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "bash");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn plain_body_omits_stream_options_and_empty_tools() {
        let body = OpenAiCompatProvider::request_body(&request(vec![]), false);
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn assistant_calls_and_tool_results_use_wire_shape() {
        let messages = vec![
            Message::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "list".into(),
                    arguments: r#"{"path":"."}"#.into(),
                }],
            ),
            Message::tool_result("call_1", "list", "2 files"),
        ];
        let json = serde_json::to_value(OpenAiCompatProvider::to_api_messages(&messages)).unwrap();

        assert!(json[0]["content"].is_null());
        assert_eq!(json[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(json[0]["tool_calls"][0]["type"], "function");
        assert_eq!(json[0]["tool_calls"][0]["function"]["arguments"], r#"{"path":"."}"#);

        assert_eq!(json[1]["role"], "tool");
        assert_eq!(json[1]["tool_call_id"], "call_1");
        assert_eq!(json[1]["name"], "list");
        assert_eq!(json[1]["content"], "2 files");
    }

    #[test]
    fn plain_messages_skip_tool_fields() {
        let json = serde_json::to_value(OpenAiCompatProvider::to_api_messages(&[Message::user("hello")])).unwrap();
        assert_eq!(json[0], serde_json::json!({"role": "user", "content": "hello"}));
    }

    // --- SSE decoding ---

    #[test]
    fn decoder_joins_lines_split_across_reads() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"choi").is_empty());
        let events = decoder.push(b"ces\":[]}\r\n\r\n: keep-alive\n");
        assert_eq!(events, vec![SseEvent::Data(r#"{"choices":[]}"#.into())]);
    }

    #[test]
    fn decoder_keeps_multibyte_characters_intact() {
        let line = "data: {\"x\":\"héllo\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(
            decoder.push(&line[split..]),
            vec![SseEvent::Data("{\"x\":\"héllo\"}".into())]
        );
    }

    #[test]
    fn decoder_recognizes_done_and_trailing_line() {
        let mut decoder = SseDecoder::default();
        assert_eq!(decoder.push(b"data: [DONE]\n"), vec![SseEvent::Done]);
        assert!(decoder.push(b"data: {}").is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Data("{}".into())]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn parse_content_delta() {
        let chunk = parse_data(r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.content.as_deref(), Some("Hello"));
        assert!(chunk.tool_calls.is_empty());
        assert!(!chunk.done);
    }

    #[test]
    fn parse_tool_call_deltas_are_passed_through_raw() {
        let first = parse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"bash","arguments":""}}]}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(first.tool_calls, vec![ToolCallDelta::start("call_abc", "bash", "")]);

        let next = parse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"command\""}}]}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(next.tool_calls, vec![ToolCallDelta::more("{\"command\"")]);
    }

    #[test]
    fn parse_usage_only_chunk() {
        let chunk = parse_data(r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.usage.unwrap().total_tokens, 15);
        assert!(!chunk.done);
    }

    #[test]
    fn parse_empty_delta_is_skipped() {
        assert!(parse_data(r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#)
            .unwrap()
            .is_none());
        assert!(parse_data(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn parse_server_error_payload() {
        let err = parse_data(r#"{"error":{"message":"overloaded","type":"server_error"}}"#).unwrap_err();
        assert!(matches!(err, ChunkError::Server(m) if m == "overloaded"));
        assert!(matches!(parse_data("not json"), Err(ChunkError::Malformed(_))));
    }

    #[tokio::test]
    async fn forward_stops_on_done_and_on_server_error() {
        let (tx, mut rx) = mpsc::channel(4);
        assert!(forward(&tx, "t", SseEvent::Data(r#"{"choices":[{"delta":{"content":"a"}}]}"#.into())).await);
        assert!(!forward(&tx, "t", SseEvent::Data(r#"{"error":{"message":"boom"}}"#.into())).await);
        assert!(!forward(&tx, "t", SseEvent::Done).await);

        assert_eq!(rx.recv().await.unwrap().unwrap().content.as_deref(), Some("a"));
        assert!(matches!(rx.recv().await.unwrap(), Err(ProviderError::StreamInterrupted(_))));
        assert!(rx.recv().await.unwrap().unwrap().done);
    }
}
