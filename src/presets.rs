//! The financial analyst team
//!
//! Two specialists (web search, market data) under one leader that merges
//! their answers. `FinancialTeam` is also the factory the driver uses to get
//! fresh agents for every query.

use crate::agent::{Agent, AgentFactory};
use crate::config::{Settings, DEFAULT_MAX_TOOL_ROUNDS};
use crate::llm::{GroqModel, ModelHandle};
use crate::tools::{
    DuckDuckGo, FinanceCapabilities, FinanceTools, MarketDataProvider, SearchProvider,
    WebSearchTools, YahooFinance,
};
use crate::Result;
use std::sync::Arc;

pub const WEB_SEARCH_AGENT_NAME: &str = "Web Search Agent";
pub const FINANCE_AGENT_NAME: &str = "Finance AI Agent";
pub const TEAM_LEADER_NAME: &str = "Multi AI Agent";

pub const NVDA_ANALYSIS_QUERY: &str = concat!(
    "Provide a comprehensive analysis of NVIDIA (NVDA), including:",
    " 1) Current stock price and recent performance, ",
    " 2) Latest analyst recommendations, ",
    " 3) Recent company news and developments, ",
    " 4) Key financial fundamentals"
);

/// Shared handles every agent in the team is built from
#[derive(Clone)]
pub struct FinancialTeam {
    model: ModelHandle,
    search: Arc<dyn SearchProvider>,
    market: Arc<dyn MarketDataProvider>,
    max_tool_rounds: u32,
}

impl FinancialTeam {
    pub fn new(
        model: ModelHandle,
        search: Arc<dyn SearchProvider>,
        market: Arc<dyn MarketDataProvider>,
    ) -> Self {
        Self {
            model,
            search,
            market,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Groq model, DuckDuckGo and Yahoo Finance, all from settings.
    /// Builds clients only; nothing is sent until a query runs.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let model: ModelHandle = Arc::new(GroqModel::from_settings(settings)?);
        let search: Arc<dyn SearchProvider> = Arc::new(DuckDuckGo::from_settings(settings)?);
        let market: Arc<dyn MarketDataProvider> = Arc::new(YahooFinance::from_settings(settings)?);

        Ok(Self::new(model, search, market).max_tool_rounds(settings.max_tool_rounds))
    }

    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn web_search_agent(&self) -> Result<Agent> {
        Agent::builder(WEB_SEARCH_AGENT_NAME, self.model.clone())
            .role("Search for additional context about the company")
            .tool(WebSearchTools::new(self.search.clone()))
            .instructions([
                "Provide recent news and background information",
                "Focus on recent developments",
                "Include credible sources",
            ])
            .show_tool_calls(true)
            .markdown(true)
            .max_tool_rounds(self.max_tool_rounds)
            .build()
    }

    pub fn finance_agent(&self) -> Result<Agent> {
        let capabilities = FinanceCapabilities {
            stock_price: true,
            company_info: false,
            analyst_recommendations: true,
            stock_fundamentals: true,
            company_news: true,
        };

        Agent::builder(FINANCE_AGENT_NAME, self.model.clone())
            .tool(FinanceTools::new(self.market.clone(), capabilities))
            .instructions([
                "Provide comprehensive financial analysis",
                "Use clear and structured reporting",
                "Focus on key financial metrics",
                "Present data in a tabular format",
            ])
            .show_tool_calls(true)
            .markdown(true)
            .max_tool_rounds(self.max_tool_rounds)
            .build()
    }

    /// Leader whose only tools are the two specialists.
    pub fn team_leader(&self) -> Result<Agent> {
        let finance = self.finance_agent()?;
        let web_search = self.web_search_agent()?;

        Agent::builder(TEAM_LEADER_NAME, self.model.clone())
            .team(vec![finance, web_search])
            .instructions([
                "Combine financial data with recent news",
                "Provide a comprehensive and nuanced analysis",
                "Ensure information is current and relevant",
                "Use markdown for clear formatting",
            ])
            .show_tool_calls(true)
            .markdown(true)
            .max_tool_rounds(self.max_tool_rounds)
            .build()
    }
}

impl AgentFactory for FinancialTeam {
    fn build(&self) -> Result<Agent> {
        self.team_leader()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::API_KEY_VAR;
    use crate::error::AgentError;
    use crate::llm::ScriptedModel;
    use crate::models::Query;
    use crate::testing::{
        team_responder, StaticMarketData, StaticSearch, NVDA_HEADLINE, NVDA_SEARCH_TITLE,
    };

    fn team(model: Arc<ScriptedModel>) -> FinancialTeam {
        FinancialTeam::new(
            model,
            Arc::new(StaticSearch::nvda()),
            Arc::new(StaticMarketData::nvda()),
        )
    }

    #[test]
    fn test_query_text() {
        assert!(NVDA_ANALYSIS_QUERY.starts_with("Provide a comprehensive analysis of NVIDIA (NVDA)"));
        assert!(NVDA_ANALYSIS_QUERY.ends_with("4) Key financial fundamentals"));
    }

    #[tokio::test]
    async fn test_team_construction_is_offline() {
        let model = Arc::new(ScriptedModel::new("scripted", team_responder));
        let leader = team(model.clone()).build().unwrap();

        assert_eq!(leader.team().len(), 2);
        assert_eq!(
            leader.tool_names(),
            vec!["transfer_task_to_finance_ai_agent", "transfer_task_to_web_search_agent"]
        );
        assert_eq!(
            leader.team()[0].tool_names(),
            vec![
                "get_current_stock_price",
                "get_analyst_recommendations",
                "get_stock_fundamentals",
                "get_company_news"
            ]
        );
        assert_eq!(
            leader.team()[1].tool_names(),
            vec!["duckduckgo_search", "duckduckgo_news"]
        );
        assert_eq!(model.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_composite_answer_traces_both_members() {
        let model = Arc::new(ScriptedModel::new("scripted", team_responder));
        let leader = team(model.clone()).build().unwrap();

        let mut chunks: Vec<String> = Vec::new();
        let response = leader
            .answer(&Query::new(NVDA_ANALYSIS_QUERY, true), &mut chunks)
            .await
            .unwrap();

        assert!(response.content.contains("142.5"));
        assert!(response.content.contains(NVDA_HEADLINE));
        assert!(response.content.contains(NVDA_SEARCH_TITLE));
        assert_eq!(chunks.concat(), response.content);
        assert_eq!(response.tool_calls.len(), 2);
    }

    #[tokio::test]
    async fn test_composite_stream_matches_atomic() {
        let streamed_model = Arc::new(ScriptedModel::new("scripted", team_responder));
        let mut chunks: Vec<String> = Vec::new();
        team(streamed_model)
            .build()
            .unwrap()
            .answer(&Query::new(NVDA_ANALYSIS_QUERY, true), &mut chunks)
            .await
            .unwrap();

        let atomic_model = Arc::new(ScriptedModel::new("scripted", team_responder));
        let mut whole: Vec<String> = Vec::new();
        team(atomic_model)
            .build()
            .unwrap()
            .answer(&Query::new(NVDA_ANALYSIS_QUERY, false), &mut whole)
            .await
            .unwrap();

        assert_eq!(whole.len(), 1);
        assert_eq!(chunks.concat(), whole[0]);
    }

    #[test]
    fn test_missing_credential_stops_before_any_agent() {
        let mut built = false;
        let result = Settings::from_lookup(|_| None).and_then(|settings| {
            built = true;
            FinancialTeam::from_settings(&settings)
        });

        assert!(matches!(result, Err(AgentError::ConfigurationError(_))));
        assert!(!built);
    }

    #[test]
    fn test_from_settings_builds_offline() {
        let settings = Settings::from_lookup(|key| {
            (key == API_KEY_VAR).then(|| "gsk_test".to_string())
        })
        .unwrap();

        let team = FinancialTeam::from_settings(&settings).unwrap();
        let leader = team.build().unwrap();
        assert_eq!(leader.model().id(), "llama-3.3-70b-versatile");
        assert_eq!(leader.name(), TEAM_LEADER_NAME);
    }
}
