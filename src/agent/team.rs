//! Team members exposed as tools
//!
//! Invoking `transfer_task_to_<member>` runs the member agent on a sub-query
//! derived from the leader's reasoning and returns the member's answer.

use crate::agent::Agent;
use crate::models::{ToolInput, ToolOutput};
use crate::tools::{require_str, Tool};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub(crate) struct DelegateTool {
    member: Arc<Agent>,
    name: String,
    description: String,
}

impl DelegateTool {
    pub(crate) fn new(member: Arc<Agent>) -> Self {
        let name = format!("transfer_task_to_{}", snake_case(member.name()));
        let description = format!(
            "Use this function to transfer a task to {}. \
             You must provide a clear and concise description of the task the agent should achieve AND the expected output.",
            member.name()
        );
        Self {
            member,
            name,
            description,
        }
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_description": {
                    "type": "string",
                    "description": "A clear and concise description of the task the agent should achieve."
                },
                "expected_output": {
                    "type": "string",
                    "description": "The expected output from the agent."
                },
                "additional_information": {
                    "type": "string",
                    "description": "Additional information that will help the agent complete the task."
                }
            },
            "required": ["task_description"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let task = require_str(input, "task_description")?;
        let mut prompt = task;

        if let Some(expected) = optional_text(&input.parameters, "expected_output") {
            prompt.push_str(&format!("\n\nThe expected output is: {}", expected));
        }
        if let Some(extra) = optional_text(&input.parameters, "additional_information") {
            prompt.push_str(&format!("\n\nAdditional information: {}", extra));
        }

        info!(member = %self.member.name(), "Delegating task to team member");

        let response = self.member.run(&prompt).await?;
        Ok(ToolOutput::ok(Value::String(response.content)))
    }
}

fn optional_text<'a>(parameters: &'a Value, key: &str) -> Option<&'a str> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `Finance AI Agent` → `finance_ai_agent`
pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("Finance AI Agent"), "finance_ai_agent");
        assert_eq!(snake_case("  Web Search -- Agent! "), "web_search_agent");
        assert_eq!(snake_case("agent2"), "agent2");
    }
}
