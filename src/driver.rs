//! Query driver
//!
//! Issues queries one after another, each against freshly built agents,
//! printing every answer before moving on. A failed query is reported and
//! the run continues.

use crate::agent::AgentFactory;
use crate::error::AgentError;
use crate::models::{Query, Response};
use crate::render::ConsoleSink;
use crate::Result;
use std::io::Write;
use tracing::{info, warn};

pub struct QueryOutcome {
    pub query: Query,
    pub result: Result<Response>,
}

impl QueryOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Driver<F: AgentFactory> {
    factory: F,
}

impl<F: AgentFactory> Driver<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Run every query in order, writing answers and errors to `out`.
    pub async fn run<W: Write + Send>(&self, queries: &[Query], out: &mut W) -> Vec<QueryOutcome> {
        let mut outcomes = Vec::with_capacity(queries.len());

        for (index, query) in queries.iter().enumerate() {
            info!(index, stream = query.stream, "Driver: issuing query");

            let result = self.run_one(query, out).await;

            match &result {
                Ok(response) => info!(
                    index,
                    run_id = %response.run_id,
                    tool_calls = response.tool_calls.len(),
                    "Driver: query complete"
                ),
                Err(e) => {
                    warn!(index, error = %e, "Driver: query failed");
                    report_error(out, e);
                }
            }

            outcomes.push(QueryOutcome {
                query: query.clone(),
                result,
            });
        }

        outcomes
    }

    async fn run_one<W: Write + Send>(&self, query: &Query, out: &mut W) -> Result<Response> {
        let agent = self.factory.build()?;
        let response = {
            let mut sink = ConsoleSink::new(&mut *out);
            agent.answer(query, &mut sink).await?
        };
        writeln!(out)?;
        Ok(response)
    }
}

fn report_error<W: Write>(out: &mut W, error: &AgentError) {
    if let Err(io) = writeln!(out, "\nAn error occurred: {}", error) {
        warn!(error = %io, "Could not write error report");
    }
}
