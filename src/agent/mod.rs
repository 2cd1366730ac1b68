//! Agent - a model, its tools and its instructions
//!
//! QUERY → MODEL → TOOL CALLS? → EXECUTE → FEED BACK → ... → ANSWER
//!
//! An agent owns no conversation state: every call to `answer` starts a
//! fresh transcript, so one instance can be reused or rebuilt freely.

use crate::config::DEFAULT_MAX_TOOL_ROUNDS;
use crate::error::AgentError;
use crate::llm::{ChatCompletion, ChatRequest, ModelHandle, StreamDelta, ToolCallAccumulator};
use crate::models::{
    format_arguments, Message, Query, Response, ToolCall, ToolCallRecord, ToolInput, ToolOutput,
};
use crate::render::{NullSink, ResponseSink};
use crate::tools::{ToolAdapter, ToolRegistry};
use crate::Result;
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod prompts;
mod team;

use team::DelegateTool;

/// Output preferences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputMode {
    /// Echo each tool call (`Running: - name(args)`) into the answer
    pub show_tool_calls: bool,
    /// Ask the model to format with markdown
    pub markdown: bool,
}

pub struct Agent {
    name: String,
    role: Option<String>,
    description: Option<String>,
    instructions: Vec<String>,
    model: ModelHandle,
    team: Vec<Arc<Agent>>,
    registry: ToolRegistry,
    output: OutputMode,
    max_tool_rounds: u32,
}

impl Agent {
    pub fn builder(name: impl Into<String>, model: ModelHandle) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            model,
            role: None,
            description: None,
            instructions: Vec::new(),
            tools: Vec::new(),
            team: Vec::new(),
            output: OutputMode::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn team(&self) -> &[Arc<Agent>] {
        &self.team
    }

    pub fn output(&self) -> OutputMode {
        self.output
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Names of every function advertised to the model.
    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.list()
    }

    pub fn system_prompt(&self) -> String {
        prompts::system_prompt(self)
    }

    /// Answer without a sink; the text is only in the returned response.
    pub async fn run(&self, text: &str) -> Result<Response> {
        self.answer(&Query::new(text, false), &mut NullSink).await
    }

    /// Answer a query, letting the model call tools as it sees fit.
    ///
    /// With `stream` set, text reaches `sink` fragment by fragment as the
    /// model produces it; otherwise the whole answer is delivered once at
    /// the end. Both modes yield the same `Response::content`.
    pub async fn answer(&self, query: &Query, sink: &mut dyn ResponseSink) -> Result<Response> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        info!(
            %run_id,
            agent = %self.name,
            stream = query.stream,
            "Agent: starting run"
        );

        let tools = self.registry.definitions();
        let mut messages = vec![
            Message::system(self.system_prompt()),
            Message::user(query.text.clone()),
        ];
        let mut content = String::new();
        let mut records = Vec::new();
        let mut rounds = 0;

        loop {
            let request = ChatRequest {
                model: self.model.id().to_string(),
                messages: messages.clone(),
                tools: tools.clone(),
            };

            let turn = if query.stream {
                self.stream_turn(&request, sink).await?
            } else {
                self.model.complete(&request).await?
            };
            content.push_str(&turn.content);

            if turn.tool_calls.is_empty() {
                if !query.stream && !content.is_empty() {
                    sink.chunk(&content)?;
                }

                info!(
                    %run_id,
                    agent = %self.name,
                    tool_calls = records.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Agent: run complete"
                );

                return Ok(Response {
                    run_id,
                    agent: self.name.clone(),
                    model: self.model.id().to_string(),
                    content,
                    tool_calls: records,
                    created_at: Utc::now(),
                });
            }

            rounds += 1;
            if rounds > self.max_tool_rounds {
                warn!(%run_id, agent = %self.name, rounds, "Tool round limit reached");
                return Err(AgentError::MaxToolRoundsExceeded(format!(
                    "{} requested tools more than {} times",
                    self.name, self.max_tool_rounds
                )));
            }

            if self.output.show_tool_calls {
                let trace = tool_call_trace(&turn.tool_calls);
                if query.stream {
                    sink.chunk(&trace)?;
                }
                content.push_str(&trace);
            }

            let assistant_text = Some(turn.content).filter(|c| !c.is_empty());
            messages.push(Message::assistant(assistant_text, turn.tool_calls.clone()));

            for call in &turn.tool_calls {
                let record = self.execute_tool_call(call).await?;
                messages.push(Message::tool_result(
                    record.call_id.clone(),
                    record.output.to_model_content(),
                ));
                records.push(record);
            }
        }
    }

    /// One streamed model turn; text is forwarded as it arrives.
    async fn stream_turn(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<ChatCompletion> {
        let mut stream = self.model.stream(request).await?;
        let mut content = String::new();
        let mut calls = ToolCallAccumulator::default();

        while let Some(delta) = stream.next().await {
            match delta? {
                StreamDelta::Content(text) => {
                    sink.chunk(&text)?;
                    content.push_str(&text);
                }
                StreamDelta::ToolCall(fragment) => calls.push(fragment),
            }
        }

        Ok(ChatCompletion {
            content,
            tool_calls: calls.finish(),
        })
    }

    /// Run one requested tool. Bad arguments and unknown names go back to
    /// the model as failed outputs; provider failures abort the run.
    async fn execute_tool_call(&self, call: &ToolCall) -> Result<ToolCallRecord> {
        let start = Instant::now();
        let name = call.function.name.as_str();

        debug!(agent = %self.name, tool = %name, "Processing tool call");

        let (arguments, output) = match parse_arguments(&call.function.arguments) {
            Err(e) => {
                warn!(tool = %name, error = %e, "Malformed tool arguments");
                (Value::Null, ToolOutput::failed(e.to_string()))
            }
            Ok(arguments) => {
                let output = match self.registry.get(name) {
                    Some(tool) => {
                        let input = ToolInput {
                            tool_name: name.to_string(),
                            parameters: arguments.clone(),
                        };
                        match tool.execute(&input).await {
                            Ok(output) => output,
                            Err(e) if e.is_recoverable_tool_error() => {
                                warn!(tool = %name, error = %e, "Tool rejected input");
                                ToolOutput::failed(e.to_string())
                            }
                            Err(e) => {
                                warn!(tool = %name, error = %e, "Tool execution failed");
                                return Err(e);
                            }
                        }
                    }
                    None => {
                        warn!(tool = %name, "Tool not registered");
                        ToolOutput::failed(AgentError::ToolNotFound(name.to_string()).to_string())
                    }
                };
                (arguments, output)
            }
        };

        Ok(ToolCallRecord {
            call_id: call.id.clone(),
            tool_name: name.to_string(),
            arguments,
            output,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| AgentError::InvalidToolInput(format!("arguments are not valid JSON: {}", e)))
}

/// `Running:\n - name(k=v)\n\n`
fn tool_call_trace(calls: &[ToolCall]) -> String {
    let mut trace = String::from("Running:\n");
    for call in calls {
        let args = match serde_json::from_str::<Value>(&call.function.arguments) {
            Ok(value) => format_arguments(&value),
            Err(_) => call.function.arguments.clone(),
        };
        trace.push_str(&format!(" - {}({})\n", call.function.name, args));
    }
    trace.push('\n');
    trace
}

pub struct AgentBuilder {
    name: String,
    model: ModelHandle,
    role: Option<String>,
    description: Option<String>,
    instructions: Vec<String>,
    tools: Vec<ToolAdapter>,
    team: Vec<Agent>,
    output: OutputMode,
    max_tool_rounds: u32,
}

impl AgentBuilder {
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions.extend(instructions.into_iter().map(Into::into));
        self
    }

    pub fn tool(mut self, adapter: impl Into<ToolAdapter>) -> Self {
        self.tools.push(adapter.into());
        self
    }

    /// Members must already be built; they become delegation tools.
    pub fn team(mut self, members: Vec<Agent>) -> Self {
        self.team.extend(members);
        self
    }

    pub fn show_tool_calls(mut self, show: bool) -> Self {
        self.output.show_tool_calls = show;
        self
    }

    pub fn markdown(mut self, markdown: bool) -> Self {
        self.output.markdown = markdown;
        self
    }

    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Assemble the agent. No I/O happens here.
    pub fn build(self) -> Result<Agent> {
        if let Some(nested) = self.team.iter().find(|m| !m.team.is_empty()) {
            return Err(AgentError::InvalidTeam(format!(
                "{} leads its own team; delegation is limited to one level below {}",
                nested.name, self.name
            )));
        }

        let mut registry = ToolRegistry::new();
        for adapter in &self.tools {
            for function in adapter.functions() {
                registry.register(function)?;
            }
        }

        let team: Vec<Arc<Agent>> = self.team.into_iter().map(Arc::new).collect();
        for member in &team {
            registry
                .register(Arc::new(DelegateTool::new(member.clone())))
                .map_err(|e| {
                    AgentError::InvalidTeam(format!("{} in team of {}", e, self.name))
                })?;
        }

        debug!(
            agent = %self.name,
            tools = ?registry.list(),
            team_size = team.len(),
            "Agent built"
        );

        Ok(Agent {
            name: self.name,
            role: self.role,
            description: self.description,
            instructions: self.instructions,
            model: self.model,
            team,
            registry,
            output: self.output,
            max_tool_rounds: self.max_tool_rounds,
        })
    }
}

/// Produces fresh agents, so no state survives from one query to the next
pub trait AgentFactory: Send + Sync {
    fn build(&self) -> Result<Agent>;
}

impl<F> AgentFactory for F
where
    F: Fn() -> Result<Agent> + Send + Sync,
{
    fn build(&self) -> Result<Agent> {
        self()
    }
}
