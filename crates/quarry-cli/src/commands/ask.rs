//! `quarry ask` command implementation.

use super::Startup;
use anyhow::Result;
use quarry_core::QuarryConfig;

pub async fn run(config: &QuarryConfig, question: &str, is_database_query: bool) -> Result<()> {
    if !is_database_query {
        tracing::info!("not a database question, empty context");
        return Ok(());
    }

    let startup = Startup::connect(config).await?;
    let context = startup.orchestrator(config).answer(question, true).await;
    println!("{}", context.trim_end());
    Ok(())
}
