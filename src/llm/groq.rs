//! Groq chat-completions client
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol, with and
//! without streaming. Uses a long-lived reqwest::Client for connection pooling.

use crate::config::{Credential, Settings};
use crate::error::AgentError;
use crate::llm::sse::{SseDecoder, SseEvent};
use crate::llm::{
    ChatCompletion, ChatRequest, CompletionStream, LanguageModel, StreamDelta, ToolCallDelta,
};
use crate::models::{Message, ToolCall, ToolDefinition};
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info};

/// Reusable Groq client (connection-pooled)
pub struct GroqModel {
    client: Client,
    credential: Credential,
    model_id: String,
    base_url: String,
}

impl GroqModel {
    pub fn new(
        model_id: impl Into<String>,
        credential: Credential,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            credential,
            model_id: model_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.model_id.clone(),
            settings.credential.clone(),
            settings.groq_base_url.clone(),
            settings.http_timeout,
        )
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = GroqRequest {
            model: &request.model,
            messages: &request.messages,
            tools: &request.tools,
            tool_choice: (!request.tools.is_empty()).then_some("auto"),
            stream,
        };

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            stream,
            "Calling Groq API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Groq API request failed: {}", e);
                AgentError::LlmError(format!("Groq API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Groq API error response: {}", error_text);
            return Err(AgentError::LlmError(format!(
                "Groq API returned {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for GroqModel {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let response = self.send(request, false).await?;

        let groq_response: GroqResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Groq response: {}", e);
            AgentError::LlmError(format!("Groq parse error: {}", e))
        })?;

        let choice = groq_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::LlmError("No choices in Groq response".to_string()))?;

        info!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            tool_calls = choice.message.tool_calls.len(),
            "Groq response received"
        );

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice.message.tool_calls,
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<CompletionStream> {
        let response = self.send(request, true).await?;
        let bytes: BoxStream<'static, reqwest::Result<Vec<u8>>> = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(decode_event_stream(bytes))
    }
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamDelta>>,
    done: bool,
}

/// Turn a raw SSE byte stream into deltas, preserving arrival order.
fn decode_event_stream<S>(bytes: S) -> CompletionStream
where
    S: futures::Stream<Item = reqwest::Result<Vec<u8>>> + Unpin + Send + 'static,
{
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            let events = match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.feed(&chunk),
                Some(Err(e)) => {
                    state.done = true;
                    state
                        .pending
                        .push_back(Err(AgentError::LlmError(format!("Groq stream interrupted: {}", e))));
                    continue;
                }
                None => {
                    state.done = true;
                    state.decoder.finish().into_iter().collect()
                }
            };

            for event in events {
                match event {
                    SseEvent::Done => {
                        state.done = true;
                        break;
                    }
                    SseEvent::Data(data) => state.pending.extend(parse_stream_chunk(&data)),
                }
            }
        }
    })
    .boxed()
}

fn parse_stream_chunk(data: &str) -> Vec<Result<StreamDelta>> {
    let chunk: GroqStreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![Err(AgentError::LlmError(format!(
                "Groq stream parse error: {} | raw={}",
                e, data
            )))]
        }
    };

    if let Some(err) = chunk.error {
        return vec![Err(AgentError::LlmError(format!("Groq stream error: {}", err.message)))];
    }

    let mut deltas = Vec::new();
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            deltas.push(Ok(StreamDelta::Content(content)));
        }
        for call in choice.delta.tool_calls {
            deltas.push(Ok(StreamDelta::ToolCall(ToolCallDelta {
                index: call.index,
                id: call.id,
                name: call.function.as_ref().and_then(|f| f.name.clone()),
                arguments: call
                    .function
                    .and_then(|f| f.arguments)
                    .unwrap_or_default(),
            })));
        }
    }
    deltas
}

#[derive(Debug, Serialize)]
struct GroqRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "is_empty_slice")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    stream: bool,
}

fn is_empty_slice<T>(slice: &&[T]) -> bool {
    slice.is_empty()
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct GroqStreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamMessageDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamMessageDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<StreamToolCall>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use futures::TryStreamExt;

    fn byte_stream(chunks: Vec<&'static str>) -> BoxStream<'static, reqwest::Result<Vec<u8>>> {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec()))).boxed()
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![Message::system("You are a financial analyst"), Message::user("NVDA?")];
        let request = GroqRequest {
            model: "llama-3.3-70b-versatile",
            messages: &messages,
            tools: &[],
            tool_choice: None,
            stream: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama-3.3-70b-versatile");
        assert_eq!(json["stream"], true);
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert_eq!(json["messages"][1]["content"], "NVDA?");
    }

    #[test]
    fn test_response_with_tool_calls() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_current_stock_price", "arguments": "{\"symbol\":\"NVDA\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let response: GroqResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.choices[0].message.tool_calls.len(), 1);
        assert!(response.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn test_decode_event_stream_in_order() {
        let bytes = byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"NVDA \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"is up\"}}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]);

        let deltas: Vec<StreamDelta> = decode_event_stream(bytes).try_collect().await.unwrap();
        assert_eq!(
            deltas,
            vec![
                StreamDelta::Content("NVDA ".into()),
                StreamDelta::Content("is up".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_multibyte_text_split_at_every_byte() {
        let text = "NVDA \u{2014} **\u{20ac}142** \u{2022} up 3%";
        let raw = format!(
            "data: {}\n\ndata: [DONE]\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        );
        let bytes: BoxStream<'static, reqwest::Result<Vec<u8>>> =
            stream::iter(raw.into_bytes().into_iter().map(|b| Ok(vec![b]))).boxed();

        let deltas: Vec<StreamDelta> = decode_event_stream(bytes).try_collect().await.unwrap();
        assert_eq!(deltas, vec![StreamDelta::Content(text.into())]);
    }

    #[tokio::test]
    async fn test_decode_tool_call_fragments() {
        let bytes = byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"duckduckgo_search\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"query\\\":\\\"nvidia\\\"}\"}}]}}]}\n\n",
            "data: [DONE]\n\n",
        ]);

        let deltas: Vec<StreamDelta> = decode_event_stream(bytes).try_collect().await.unwrap();
        assert_eq!(deltas.len(), 2);
        match &deltas[1] {
            StreamDelta::ToolCall(delta) => {
                assert_eq!(delta.index, 0);
                assert_eq!(delta.arguments, "{\"query\":\"nvidia\"}");
            }
            other => panic!("unexpected delta {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_malformed_chunk_is_error() {
        let bytes = byte_stream(vec!["data: {not json}\n\n"]);
        let result: Result<Vec<StreamDelta>> = decode_event_stream(bytes).try_collect().await;
        assert!(matches!(result, Err(AgentError::LlmError(_))));
    }
}
