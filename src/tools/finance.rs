//! Market-data tools
//!
//! Price, company profile, analyst ratings, fundamentals and news for a
//! ticker symbol. The HTTP-backed provider talks to Yahoo Finance.

use crate::config::Settings;
use crate::error::AgentError;
use crate::models::{ToolInput, ToolOutput};
use crate::tools::{get_json, optional_usize, provider_client, require_str, Tool};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_NUM_STORIES: usize = 3;

//
// ================= Data =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub currency: Option<String>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompanyInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub employees: Option<u64>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationTrend {
    pub period: String,
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    pub symbol: String,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub total_revenue: Option<f64>,
    pub profit_margins: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub publisher: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

//
// ================= Provider =================
//

/// External market-data source
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn stock_price(&self, symbol: &str) -> Result<Quote>;
    async fn company_info(&self, symbol: &str) -> Result<CompanyInfo>;
    async fn analyst_recommendations(&self, symbol: &str) -> Result<Vec<RecommendationTrend>>;
    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals>;
    async fn company_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>>;
}

pub struct YahooFinance {
    client: Client,
    base_url: String,
}

impl YahooFinance {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: provider_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.yahoo_finance_base_url.clone(), settings.http_timeout)
    }

    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Value> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);
        let body = get_json(&self.client, &url, &[("modules", modules.to_string())]).await?;
        first_result(&body, "quoteSummary")
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinance {
    async fn stock_price(&self, symbol: &str) -> Result<Quote> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let body = get_json(
            &self.client,
            &url,
            &[("range", "1d".to_string()), ("interval", "1d".to_string())],
        )
        .await?;
        parse_quote(symbol, &first_result(&body, "chart")?)
    }

    async fn company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        let result = self.quote_summary(symbol, "assetProfile,price").await?;
        Ok(parse_company_info(symbol, &result))
    }

    async fn analyst_recommendations(&self, symbol: &str) -> Result<Vec<RecommendationTrend>> {
        let result = self.quote_summary(symbol, "recommendationTrend").await?;
        Ok(parse_recommendations(&result))
    }

    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        let result = self
            .quote_summary(symbol, "summaryDetail,defaultKeyStatistics,financialData")
            .await?;
        Ok(parse_fundamentals(symbol, &result))
    }

    async fn company_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let body = get_json(
            &self.client,
            &url,
            &[
                ("q", symbol.to_string()),
                ("newsCount", limit.to_string()),
                ("quotesCount", "0".to_string()),
            ],
        )
        .await?;
        Ok(parse_news(&body, limit))
    }
}

/// `{root: {result: [first], error}}` → first, or the provider's error.
fn first_result(body: &Value, root: &str) -> Result<Value> {
    let envelope = body.get(root).ok_or_else(|| {
        AgentError::ProviderError(format!("Yahoo Finance response missing '{}'", root))
    })?;

    if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
        let description = err
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(AgentError::ProviderError(format!("Yahoo Finance: {}", description)));
    }

    envelope
        .get("result")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .cloned()
        .ok_or_else(|| AgentError::ProviderError("Yahoo Finance returned no result".to_string()))
}

/// Numeric field that may be a bare number or a `{raw, fmt}` pair.
fn raw_f64(value: &Value, path: &[&str]) -> Option<f64> {
    let node = path.iter().try_fold(value, |v, key| v.get(*key))?;
    node.get("raw").unwrap_or(node).as_f64()
}

fn text(value: &Value, path: &[&str]) -> Option<String> {
    let node = path.iter().try_fold(value, |v, key| v.get(*key))?;
    node.get("fmt")
        .unwrap_or(node)
        .as_str()
        .map(str::to_string)
}

fn parse_quote(symbol: &str, result: &Value) -> Result<Quote> {
    let meta = result
        .get("meta")
        .ok_or_else(|| AgentError::ProviderError("Yahoo chart result missing meta".to_string()))?;

    let price = raw_f64(meta, &["regularMarketPrice"]).ok_or_else(|| {
        AgentError::ProviderError(format!("No market price available for {}", symbol))
    })?;
    let previous_close =
        raw_f64(meta, &["chartPreviousClose"]).or_else(|| raw_f64(meta, &["previousClose"]));
    let change_percent = previous_close
        .filter(|p| *p != 0.0)
        .map(|p| ((price - p) / p * 10_000.0).round() / 100.0);

    Ok(Quote {
        symbol: text(meta, &["symbol"]).unwrap_or_else(|| symbol.to_string()),
        currency: text(meta, &["currency"]),
        price,
        previous_close,
        change_percent,
    })
}

fn parse_company_info(symbol: &str, result: &Value) -> CompanyInfo {
    CompanyInfo {
        symbol: symbol.to_string(),
        name: text(result, &["price", "longName"]).or_else(|| text(result, &["price", "shortName"])),
        sector: text(result, &["assetProfile", "sector"]),
        industry: text(result, &["assetProfile", "industry"]),
        website: text(result, &["assetProfile", "website"]),
        employees: raw_f64(result, &["assetProfile", "fullTimeEmployees"]).map(|n| n as u64),
        summary: text(result, &["assetProfile", "longBusinessSummary"]),
    }
}

fn parse_recommendations(result: &Value) -> Vec<RecommendationTrend> {
    let count = |entry: &Value, key: &str| raw_f64(entry, &[key]).unwrap_or(0.0) as u32;

    result
        .get("recommendationTrend")
        .and_then(|r| r.get("trend"))
        .and_then(Value::as_array)
        .map(|trend| {
            trend
                .iter()
                .map(|entry| RecommendationTrend {
                    period: text(entry, &["period"]).unwrap_or_default(),
                    strong_buy: count(entry, "strongBuy"),
                    buy: count(entry, "buy"),
                    hold: count(entry, "hold"),
                    sell: count(entry, "sell"),
                    strong_sell: count(entry, "strongSell"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_fundamentals(symbol: &str, result: &Value) -> Fundamentals {
    Fundamentals {
        symbol: symbol.to_string(),
        market_cap: raw_f64(result, &["summaryDetail", "marketCap"]),
        trailing_pe: raw_f64(result, &["summaryDetail", "trailingPE"]),
        forward_pe: raw_f64(result, &["summaryDetail", "forwardPE"]),
        trailing_eps: raw_f64(result, &["defaultKeyStatistics", "trailingEps"]),
        dividend_yield: raw_f64(result, &["summaryDetail", "dividendYield"]),
        beta: raw_f64(result, &["summaryDetail", "beta"]),
        fifty_two_week_high: raw_f64(result, &["summaryDetail", "fiftyTwoWeekHigh"]),
        fifty_two_week_low: raw_f64(result, &["summaryDetail", "fiftyTwoWeekLow"]),
        total_revenue: raw_f64(result, &["financialData", "totalRevenue"]),
        profit_margins: raw_f64(result, &["financialData", "profitMargins"]),
        revenue_growth: raw_f64(result, &["financialData", "revenueGrowth"]),
        target_mean_price: raw_f64(result, &["financialData", "targetMeanPrice"]),
        recommendation: text(result, &["financialData", "recommendationKey"]),
    }
}

fn parse_news(body: &Value, limit: usize) -> Vec<NewsItem> {
    body.get("news")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(NewsItem {
                        title: text(item, &["title"])?,
                        publisher: text(item, &["publisher"]),
                        link: text(item, &["link"]),
                        published_at: item
                            .get("providerPublishTime")
                            .and_then(Value::as_i64)
                            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
                    })
                })
                .take(limit)
                .collect()
        })
        .unwrap_or_default()
}

//
// ================= Tools =================
//

/// Which finance functions an agent may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinanceCapabilities {
    pub stock_price: bool,
    pub company_info: bool,
    pub analyst_recommendations: bool,
    pub stock_fundamentals: bool,
    pub company_news: bool,
}

impl FinanceCapabilities {
    pub fn all() -> Self {
        Self {
            stock_price: true,
            company_info: true,
            analyst_recommendations: true,
            stock_fundamentals: true,
            company_news: true,
        }
    }
}

impl Default for FinanceCapabilities {
    fn default() -> Self {
        Self {
            stock_price: true,
            company_info: false,
            analyst_recommendations: false,
            stock_fundamentals: false,
            company_news: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinanceFunction {
    StockPrice,
    CompanyInfo,
    AnalystRecommendations,
    StockFundamentals,
    CompanyNews,
}

impl FinanceFunction {
    fn name(self) -> &'static str {
        match self {
            FinanceFunction::StockPrice => "get_current_stock_price",
            FinanceFunction::CompanyInfo => "get_company_info",
            FinanceFunction::AnalystRecommendations => "get_analyst_recommendations",
            FinanceFunction::StockFundamentals => "get_stock_fundamentals",
            FinanceFunction::CompanyNews => "get_company_news",
        }
    }

    fn description(self) -> &'static str {
        match self {
            FinanceFunction::StockPrice => "Get the current stock price for a given ticker symbol.",
            FinanceFunction::CompanyInfo => {
                "Get the company profile and overview for a given ticker symbol."
            }
            FinanceFunction::AnalystRecommendations => {
                "Get analyst recommendations (strong buy to strong sell counts) for a given ticker symbol."
            }
            FinanceFunction::StockFundamentals => {
                "Get fundamental data such as market cap, P/E, EPS and margins for a given ticker symbol."
            }
            FinanceFunction::CompanyNews => "Get the latest news headlines for a given ticker symbol.",
        }
    }
}

/// Finance adapter: a provider plus enabled capabilities
#[derive(Clone)]
pub struct FinanceTools {
    provider: Arc<dyn MarketDataProvider>,
    capabilities: FinanceCapabilities,
}

impl FinanceTools {
    pub fn new(provider: Arc<dyn MarketDataProvider>, capabilities: FinanceCapabilities) -> Self {
        Self {
            provider,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> FinanceCapabilities {
        self.capabilities
    }

    pub(crate) fn functions(&self) -> Vec<Arc<dyn Tool>> {
        let caps = self.capabilities;
        [
            (caps.stock_price, FinanceFunction::StockPrice),
            (caps.company_info, FinanceFunction::CompanyInfo),
            (caps.analyst_recommendations, FinanceFunction::AnalystRecommendations),
            (caps.stock_fundamentals, FinanceFunction::StockFundamentals),
            (caps.company_news, FinanceFunction::CompanyNews),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, function)| {
            Arc::new(FinanceTool {
                function,
                provider: self.provider.clone(),
            }) as Arc<dyn Tool>
        })
        .collect()
    }
}

/// Tickers go into URL paths, so only Yahoo's symbol alphabet is accepted
/// (`NVDA`, `BRK-B`, `^GSPC`, `EURUSD=X`, `7203.T`).
fn ticker_symbol(input: &ToolInput) -> Result<String> {
    let symbol = require_str(input, "symbol")?.to_uppercase();
    let valid = symbol.len() <= 16
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-'));
    if !valid {
        return Err(AgentError::InvalidToolInput(format!(
            "{}: '{}' is not a ticker symbol",
            input.tool_name, symbol
        )));
    }
    Ok(symbol)
}

struct FinanceTool {
    function: FinanceFunction,
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for FinanceTool {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn description(&self) -> &str {
        self.function.description()
    }

    fn parameters(&self) -> Value {
        let mut properties = json!({
            "symbol": {
                "type": "string",
                "description": "The stock ticker symbol, e.g. NVDA"
            }
        });
        if self.function == FinanceFunction::CompanyNews {
            properties["num_stories"] = json!({
                "type": "integer",
                "description": "Number of stories to return (default 3)"
            });
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": ["symbol"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let symbol = ticker_symbol(input)?;

        debug!(tool = self.function.name(), %symbol, "Fetching market data");

        let data = match self.function {
            FinanceFunction::StockPrice => {
                serde_json::to_value(self.provider.stock_price(&symbol).await?)?
            }
            FinanceFunction::CompanyInfo => {
                serde_json::to_value(self.provider.company_info(&symbol).await?)?
            }
            FinanceFunction::AnalystRecommendations => {
                serde_json::to_value(self.provider.analyst_recommendations(&symbol).await?)?
            }
            FinanceFunction::StockFundamentals => {
                serde_json::to_value(self.provider.fundamentals(&symbol).await?)?
            }
            FinanceFunction::CompanyNews => {
                let limit = optional_usize(input, "num_stories").unwrap_or(DEFAULT_NUM_STORIES);
                serde_json::to_value(self.provider.company_news(&symbol, limit).await?)?
            }
        };

        Ok(ToolOutput::ok(data))
    }
}
