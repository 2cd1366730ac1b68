//! Model handle abstraction
//!
//! A `LanguageModel` is the remote endpoint every agent talks to. One handle
//! is built per run and shared read-only by all agents.

use crate::models::{Message, ToolCall, ToolDefinition};
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;

pub mod groq;
pub mod mock;
pub mod sse;

pub use groq::GroqModel;
pub use mock::ScriptedModel;

/// Shared, read-only reference to a remote model.
pub type ModelHandle = Arc<dyn LanguageModel>;

/// Incremental model output, in arrival order.
pub type CompletionStream = BoxStream<'static, Result<StreamDelta>>;

/// Trait for a chat-completion endpoint (LLM controlled)
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier sent with every request
    fn id(&self) -> &str;

    /// Send the transcript and wait for the whole completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;

    /// Send the transcript and receive the completion as it is produced
    async fn stream(&self, request: &ChatRequest) -> Result<CompletionStream>;
}

/// Everything sent to the model for one turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ChatRequest {
    /// All message text, for transcript assertions.
    pub fn transcript_text(&self) -> String {
        self.messages
            .iter()
            .filter_map(|m| m.content.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A finished model turn: text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    /// A fragment of answer text
    Content(String),
    /// A fragment of a tool call; fragments sharing `index` are concatenated
    ToolCall(ToolCallDelta),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

/// Folds tool-call fragments back into complete calls.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: Vec<ToolCallDelta>,
}

impl ToolCallAccumulator {
    pub fn push(&mut self, delta: ToolCallDelta) {
        match self.calls.iter_mut().find(|c| c.index == delta.index) {
            Some(existing) => {
                if delta.id.is_some() {
                    existing.id = delta.id;
                }
                if let Some(name) = delta.name {
                    existing.name.get_or_insert_with(String::new).push_str(&name);
                }
                existing.arguments.push_str(&delta.arguments);
            }
            None => self.calls.push(delta),
        }
    }

    pub fn finish(mut self) -> Vec<ToolCall> {
        self.calls.sort_by_key(|c| c.index);
        self.calls
            .into_iter()
            .map(|c| {
                ToolCall::new(
                    c.id.unwrap_or_else(|| format!("call_{}", c.index)),
                    c.name.unwrap_or_default(),
                    c.arguments,
                )
            })
            .collect()
    }
}
