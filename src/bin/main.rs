use financial_agent_team::{
    config::Settings,
    driver::Driver,
    models::Query,
    presets::{FinancialTeam, NVDA_ANALYSIS_QUERY},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing on stderr; stdout carries the answer
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Missing credential is fatal
    let settings = Settings::from_env()?;

    info!(model = %settings.model_id, "Financial agent team starting");

    let team = FinancialTeam::from_settings(&settings)?;
    let driver = Driver::new(team);

    let queries = [Query::new(NVDA_ANALYSIS_QUERY, true)];
    let mut stdout = std::io::stdout();
    let outcomes = driver.run(&queries, &mut stdout).await;

    info!(
        completed = outcomes.iter().filter(|o| o.is_ok()).count(),
        total = outcomes.len(),
        "Financial agent team finished"
    );

    Ok(())
}
