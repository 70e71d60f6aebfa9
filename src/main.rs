use bid_sniper::cli::{Cli, Commands};
use bid_sniper::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _telemetry = bid_sniper::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Watch(args) => {
            tracing::info!("Starting snipe watch");
            args.execute(&config).await?;
        }
        Commands::Add(args) => {
            args.execute(&config).await?;
        }
        Commands::Extract(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            let mut shown = config.clone();
            if shown.scrape.api_key.is_some() {
                shown.scrape.api_key = Some("<redacted>".to_string());
            }
            println!("# Effective configuration");
            print!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}
