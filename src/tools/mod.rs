//! Tool trait, registry and adapters
//!
//! Tools are the capabilities a model may invoke mid-conversation. Each
//! adapter expands its enabled capability flags into concrete tools; every
//! invocation is delegated to an external provider.

use crate::error::AgentError;
use crate::models::{FunctionDefinition, ToolDefinition, ToolInput, ToolOutput};
use crate::Result;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub mod finance;
pub mod search;

pub use finance::{FinanceCapabilities, FinanceTools, MarketDataProvider, YahooFinance};
pub use search::{DuckDuckGo, SearchCapabilities, SearchHit, SearchProvider, WebSearchTools};

/// Trait for a single callable tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

/// Tool registry for looking up and executing tools, in registration order
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        if self.get(tool.name()).is_some() {
            return Err(AgentError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The closed set of tool integrations an agent can carry.
#[derive(Clone)]
pub enum ToolAdapter {
    WebSearch(WebSearchTools),
    Finance(FinanceTools),
}

impl ToolAdapter {
    /// Concrete tools for every enabled capability.
    pub fn functions(&self) -> Vec<Arc<dyn Tool>> {
        match self {
            ToolAdapter::WebSearch(tools) => tools.functions(),
            ToolAdapter::Finance(tools) => tools.functions(),
        }
    }
}

impl From<WebSearchTools> for ToolAdapter {
    fn from(tools: WebSearchTools) -> Self {
        ToolAdapter::WebSearch(tools)
    }
}

impl From<FinanceTools> for ToolAdapter {
    fn from(tools: FinanceTools) -> Self {
        ToolAdapter::Finance(tools)
    }
}

/// Pooled HTTP client shared by provider implementations.
pub(crate) fn provider_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .timeout(timeout)
        .user_agent(concat!("financial-agent-team/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GET a JSON document, mapping every failure to a provider error.
pub(crate) async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| AgentError::ProviderError(format!("Request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::ProviderError(format!(
            "{} returned {}: {}",
            url, status, body
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| AgentError::ProviderError(format!("Invalid JSON from {}: {}", url, e)))
}

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() {
        Ok(())
    } else {
        Err(AgentError::InvalidToolInput(format!(
            "{}: arguments must be a JSON object",
            input.tool_name
        )))
    }
}

pub(crate) fn require_str(input: &ToolInput, key: &str) -> Result<String> {
    ensure_object_parameters(input)?;
    input
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AgentError::InvalidToolInput(format!(
                "{}: expected non-empty '{}'",
                input.tool_name, key
            ))
        })
}

pub(crate) fn optional_usize(input: &ToolInput, key: &str) -> Option<usize> {
    match input.parameters.get(key)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
