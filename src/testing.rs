//! Deterministic providers shared by unit tests

use crate::error::AgentError;
use crate::llm::{ChatCompletion, ChatRequest};
use crate::models::{Role, ToolCall};
use crate::tools::finance::{CompanyInfo, Fundamentals, NewsItem, Quote, RecommendationTrend};
use crate::tools::{MarketDataProvider, SearchHit, SearchProvider};
use crate::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

pub const NVDA_PRICE: f64 = 142.5;
pub const NVDA_HEADLINE: &str = "Nvidia unveils Blackwell Ultra at GTC";
pub const NVDA_SEARCH_TITLE: &str = "Nvidia expands sovereign AI partnerships";

pub struct StaticMarketData {
    quote: Quote,
    news: Vec<NewsItem>,
}

impl StaticMarketData {
    pub fn nvda() -> Self {
        Self {
            quote: Quote {
                symbol: "NVDA".into(),
                currency: Some("USD".into()),
                price: NVDA_PRICE,
                previous_close: Some(140.0),
                change_percent: Some(1.79),
            },
            news: vec![
                NewsItem {
                    title: NVDA_HEADLINE.into(),
                    publisher: Some("Reuters".into()),
                    link: Some("https://example.com/gtc".into()),
                    published_at: None,
                },
                NewsItem {
                    title: "Nvidia data center revenue climbs".into(),
                    publisher: Some("Bloomberg".into()),
                    link: None,
                    published_at: None,
                },
            ],
        }
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn stock_price(&self, symbol: &str) -> Result<Quote> {
        Ok(Quote {
            symbol: symbol.to_string(),
            ..self.quote.clone()
        })
    }

    async fn company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        Ok(CompanyInfo {
            symbol: symbol.to_string(),
            name: Some("NVIDIA Corporation".into()),
            sector: Some("Technology".into()),
            ..Default::default()
        })
    }

    async fn analyst_recommendations(&self, _symbol: &str) -> Result<Vec<RecommendationTrend>> {
        Ok(vec![RecommendationTrend {
            period: "0m".into(),
            strong_buy: 12,
            buy: 40,
            hold: 5,
            sell: 0,
            strong_sell: 1,
        }])
    }

    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        Ok(Fundamentals {
            symbol: symbol.to_string(),
            market_cap: Some(3.4e12),
            trailing_pe: Some(55.1),
            ..Default::default()
        })
    }

    async fn company_news(&self, _symbol: &str, limit: usize) -> Result<Vec<NewsItem>> {
        Ok(self.news.iter().take(limit).cloned().collect())
    }
}

/// Every call fails as an unreachable upstream would.
pub struct FailingMarketData;

#[async_trait]
impl MarketDataProvider for FailingMarketData {
    async fn stock_price(&self, _symbol: &str) -> Result<Quote> {
        Err(unavailable())
    }

    async fn company_info(&self, _symbol: &str) -> Result<CompanyInfo> {
        Err(unavailable())
    }

    async fn analyst_recommendations(&self, _symbol: &str) -> Result<Vec<RecommendationTrend>> {
        Err(unavailable())
    }

    async fn fundamentals(&self, _symbol: &str) -> Result<Fundamentals> {
        Err(unavailable())
    }

    async fn company_news(&self, _symbol: &str, _limit: usize) -> Result<Vec<NewsItem>> {
        Err(unavailable())
    }
}

fn unavailable() -> AgentError {
    AgentError::ProviderError("market data service unavailable".into())
}

pub struct StaticSearch {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn nvda() -> Self {
        Self {
            hits: vec![
                SearchHit {
                    title: NVDA_SEARCH_TITLE.into(),
                    url: "https://example.com/sovereign-ai".into(),
                    snippet: "Nvidia signed new national AI infrastructure deals.".into(),
                },
                SearchHit {
                    title: "Nvidia supply chain update".into(),
                    url: "https://example.com/supply".into(),
                    snippet: "CoWoS capacity continues to grow.".into(),
                },
            ],
            queries: Mutex::new(Vec::new()),
        }
    }

    pub async fn queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().await.push(query.to_string());
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// Scripted policy for the analyst team: the leader delegates to both
/// members, members call their tools once, and every agent answers by
/// quoting the tool results it received.
pub fn team_responder(request: &ChatRequest) -> Result<ChatCompletion> {
    let tools: Vec<&str> = request
        .tools
        .iter()
        .map(|t| t.function.name.as_str())
        .collect();
    let results: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.content.as_deref())
        .collect();

    let is_leader = tools.contains(&"transfer_task_to_finance_ai_agent");
    let is_finance = tools.contains(&"get_current_stock_price");

    if !results.is_empty() {
        let heading = if is_leader {
            "## NVDA team report"
        } else if is_finance {
            "Finance findings:"
        } else {
            "Web findings:"
        };
        return Ok(ChatCompletion::text(format!("{}\n{}", heading, results.join("\n"))));
    }

    let calls = if is_leader {
        vec![
            ToolCall::new(
                "call_finance",
                "transfer_task_to_finance_ai_agent",
                r#"{"task_description":"Report NVDA price and latest news","expected_output":"A table of key metrics"}"#,
            ),
            ToolCall::new(
                "call_web",
                "transfer_task_to_web_search_agent",
                r#"{"task_description":"Find recent NVIDIA developments"}"#,
            ),
        ]
    } else if is_finance {
        vec![
            ToolCall::new("call_price", "get_current_stock_price", r#"{"symbol":"NVDA"}"#),
            ToolCall::new("call_news", "get_company_news", r#"{"symbol":"NVDA","num_stories":1}"#),
        ]
    } else if tools.contains(&"duckduckgo_search") {
        vec![ToolCall::new("call_search", "duckduckgo_search", r#"{"query":"NVIDIA"}"#)]
    } else {
        return Ok(ChatCompletion::text("No tools available."));
    };

    Ok(ChatCompletion::tool_calls(calls))
}
