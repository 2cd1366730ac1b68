//! Deterministic in-process model for development & testing
//!
//! Keeps the agents functional without a provider account. A responder
//! closure decides each turn; every request is recorded so the transcript
//! can be inspected afterwards.

use crate::llm::{
    ChatCompletion, ChatRequest, CompletionStream, LanguageModel, StreamDelta, ToolCallDelta,
};
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

type Responder = dyn Fn(&ChatRequest) -> Result<ChatCompletion> + Send + Sync;

pub struct ScriptedModel {
    id: String,
    responder: Box<Responder>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new<F>(id: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<ChatCompletion> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text and never calls tools.
    pub fn constant(id: impl Into<String>, answer: impl Into<String>) -> Self {
        let answer = answer.into();
        Self::new(id, move |_| Ok(ChatCompletion::text(answer.clone())))
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn respond(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        self.requests.lock().await.push(request.clone());
        (self.responder)(request)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        self.respond(request).await
    }

    async fn stream(&self, request: &ChatRequest) -> Result<CompletionStream> {
        let completion = self.respond(request).await?;
        let deltas = fragment(completion);
        Ok(stream::iter(deltas.into_iter().map(Ok)).boxed())
    }
}

/// Split a completion into the word-sized fragments a provider would send.
fn fragment(completion: ChatCompletion) -> Vec<StreamDelta> {
    let mut deltas: Vec<StreamDelta> = completion
        .content
        .split_inclusive(' ')
        .map(|word| StreamDelta::Content(word.to_string()))
        .collect();

    for (index, call) in completion.tool_calls.into_iter().enumerate() {
        let args: Vec<char> = call.function.arguments.chars().collect();
        let (head, tail) = args.split_at(args.len() / 2);

        deltas.push(StreamDelta::ToolCall(ToolCallDelta {
            index,
            id: Some(call.id),
            name: Some(call.function.name),
            arguments: head.iter().collect(),
        }));
        deltas.push(StreamDelta::ToolCall(ToolCallDelta {
            index,
            arguments: tail.iter().collect(),
            ..Default::default()
        }));
    }

    deltas
}
