//! Add command implementation

use crate::app::App;
use crate::config::Config;
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Listing URL
    pub url: String,

    /// Highest amount you are willing to bid
    #[arg(short, long)]
    pub max_price: Decimal,
}

impl AddArgs {
    /// Extract the listing and print it as it would be tracked
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (app, _events) = App::new(config)?;
        let listing = app.add_listing(&self.url, self.max_price).await?;
        println!("{}", serde_json::to_string_pretty(&listing)?);
        Ok(())
    }
}
