//! Financial Agent Team
//!
//! A small multi-agent setup over a remote LLM:
//! - A web search agent (DuckDuckGo) for news and background
//! - A finance agent (Yahoo Finance) for prices, ratings, fundamentals and news
//! - A team leader that delegates to both and merges their answers
//!
//! DRIVER → SETTINGS → MODEL → TOOLS → AGENTS → TEAM → ANSWER (streamed)

pub mod agent;
pub mod config;
pub mod driver;
pub mod error;
pub mod llm;
pub mod models;
pub mod presets;
pub mod render;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AgentError, Result};

// Re-export common types
pub use agent::{Agent, AgentBuilder, AgentFactory, OutputMode};
pub use models::*;
