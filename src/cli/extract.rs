//! Extract command implementation

use crate::config::Config;
use crate::extract::Extractor;
use clap::Args;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Listing URL
    pub url: String,
}

impl ExtractArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let extractor = Extractor::from_config(&config.scrape)?;
        tracing::info!(strategies = ?extractor.strategy_names(), "Running extraction chain");
        let snapshot = extractor.extract(&self.url).await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }
}
