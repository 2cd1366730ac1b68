//! Web search tools backed by the DuckDuckGo Instant Answer API

use crate::config::Settings;
use crate::models::{ToolInput, ToolOutput};
use crate::tools::{get_json, optional_usize, provider_client, require_str, Tool};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_RESULTS: usize = 5;

/// One ranked search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// External search engine
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    /// News-oriented search; engines without a news vertical bias the query.
    async fn news(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.search(&format!("{} latest news", query), max_results).await
    }
}

pub struct DuckDuckGo {
    client: Client,
    base_url: String,
}

impl DuckDuckGo {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: provider_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.duckduckgo_base_url.clone(), settings.http_timeout)
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}/", self.base_url);
        let body = get_json(
            &self.client,
            &url,
            &[
                ("q", query.to_string()),
                ("format", "json".to_string()),
                ("no_html", "1".to_string()),
                ("skip_disambig", "1".to_string()),
            ],
        )
        .await?;

        Ok(parse_instant_answer(&body, max_results))
    }
}

/// Abstract first, then direct results, then related topics (flattened).
fn parse_instant_answer(body: &Value, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = str_field(body, "AbstractText");
    let abstract_url = str_field(body, "AbstractURL");
    if let (Some(snippet), Some(url)) = (abstract_text, abstract_url) {
        hits.push(SearchHit {
            title: str_field(body, "Heading").unwrap_or_else(|| url.clone()),
            url,
            snippet,
        });
    }

    for key in ["Results", "RelatedTopics"] {
        if let Some(topics) = body.get(key).and_then(Value::as_array) {
            collect_topics(topics, &mut hits);
        }
    }

    hits.truncate(max_results);
    hits
}

fn collect_topics(topics: &[Value], hits: &mut Vec<SearchHit>) {
    for topic in topics {
        if let Some(nested) = topic.get("Topics").and_then(Value::as_array) {
            collect_topics(nested, hits);
            continue;
        }
        if let (Some(text), Some(url)) = (str_field(topic, "Text"), str_field(topic, "FirstURL")) {
            let title = text
                .split(" - ")
                .next()
                .unwrap_or(text.as_str())
                .to_string();
            hits.push(SearchHit {
                title,
                url,
                snippet: text,
            });
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

//
// ================= Tools =================
//

/// Which search functions an agent may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCapabilities {
    pub search: bool,
    pub news: bool,
}

impl Default for SearchCapabilities {
    fn default() -> Self {
        Self {
            search: true,
            news: true,
        }
    }
}

/// Web search adapter: a provider, enabled capabilities and query shaping
#[derive(Clone)]
pub struct WebSearchTools {
    provider: Arc<dyn SearchProvider>,
    capabilities: SearchCapabilities,
    fixed_max_results: Option<usize>,
    modifier: Option<String>,
}

impl WebSearchTools {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            capabilities: SearchCapabilities::default(),
            fixed_max_results: None,
            modifier: None,
        }
    }

    pub fn capabilities(mut self, capabilities: SearchCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Ignore the model's `max_results` and always use this many.
    pub fn fixed_max_results(mut self, max_results: usize) -> Self {
        self.fixed_max_results = Some(max_results);
        self
    }

    /// Text prepended to every query, e.g. `site:reuters.com`.
    pub fn modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    pub(crate) fn functions(&self) -> Vec<Arc<dyn Tool>> {
        [
            (self.capabilities.search, SearchFunction::Search),
            (self.capabilities.news, SearchFunction::News),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, function)| {
            Arc::new(SearchTool {
                function,
                tools: self.clone(),
            }) as Arc<dyn Tool>
        })
        .collect()
    }

    fn shape_query(&self, query: &str) -> String {
        match &self.modifier {
            Some(modifier) => format!("{} {}", modifier, query),
            None => query.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchFunction {
    Search,
    News,
}

struct SearchTool {
    function: SearchFunction,
    tools: WebSearchTools,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        match self.function {
            SearchFunction::Search => "duckduckgo_search",
            SearchFunction::News => "duckduckgo_news",
        }
    }

    fn description(&self) -> &str {
        match self.function {
            SearchFunction::Search => "Search the web with DuckDuckGo and return ranked results.",
            SearchFunction::News => "Search DuckDuckGo for the latest news on a topic.",
        }
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The query to search for"},
                "max_results": {"type": "integer", "description": "Number of results to return (default 5)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let query = self.tools.shape_query(&require_str(input, "query")?);
        let max_results = self
            .tools
            .fixed_max_results
            .or_else(|| optional_usize(input, "max_results"))
            .unwrap_or(DEFAULT_MAX_RESULTS);

        debug!(tool = self.name(), %query, max_results, "Searching the web");

        let hits = match self.function {
            SearchFunction::Search => self.tools.provider.search(&query, max_results).await?,
            SearchFunction::News => self.tools.provider.news(&query, max_results).await?,
        };

        Ok(ToolOutput::ok(serde_json::to_value(hits)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticSearch;

    fn input(parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: "duckduckgo_search".into(),
            parameters,
        }
    }

    #[test]
    fn test_parse_instant_answer_order_and_nesting() {
        let body = json!({
            "Heading": "Nvidia",
            "AbstractText": "Nvidia Corporation is an American technology company.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Nvidia",
            "Results": [{"Text": "Official site - nvidia.com", "FirstURL": "https://www.nvidia.com"}],
            "RelatedTopics": [
                {"Text": "GeForce - graphics processors", "FirstURL": "https://duckduckgo.com/GeForce"},
                {"Name": "Products", "Topics": [
                    {"Text": "CUDA - parallel computing platform", "FirstURL": "https://duckduckgo.com/CUDA"}
                ]},
                {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
            ]
        });

        let hits = parse_instant_answer(&body, 10);
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Nvidia", "Official site", "GeForce", "CUDA"]);

        assert_eq!(parse_instant_answer(&body, 2).len(), 2);
    }

    #[test]
    fn test_parse_empty_answer() {
        assert!(parse_instant_answer(&json!({"AbstractText": ""}), 5).is_empty());
    }

    #[tokio::test]
    async fn test_modifier_and_fixed_max_results() {
        let provider = Arc::new(StaticSearch::nvda());
        let tools = WebSearchTools::new(provider.clone())
            .capabilities(SearchCapabilities { search: true, news: false })
            .modifier("site:reuters.com")
            .fixed_max_results(1);

        let functions = tools.functions();
        assert_eq!(functions.len(), 1);

        let output = functions[0]
            .execute(&input(json!({"query": "nvidia earnings", "max_results": 9})))
            .await
            .unwrap();

        assert_eq!(output.data.as_array().unwrap().len(), 1);
        assert_eq!(
            provider.queries().await,
            vec!["site:reuters.com nvidia earnings".to_string()]
        );
    }

    #[tokio::test]
    async fn test_news_default_biases_query() {
        let provider = Arc::new(StaticSearch::nvda());
        let tools = WebSearchTools::new(provider.clone());
        let news = tools
            .functions()
            .into_iter()
            .find(|t| t.name() == "duckduckgo_news")
            .unwrap();

        news.execute(&input(json!({"query": "NVIDIA"}))).await.unwrap();
        assert_eq!(provider.queries().await, vec!["NVIDIA latest news".to_string()]);
    }
}
