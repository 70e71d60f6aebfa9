//! CLI interface for bid-sniper
//!
//! Provides subcommands for:
//! - `watch`: Track listings and snipe them as they close
//! - `add`: Extract one listing and show how it would be tracked
//! - `extract`: Run the extraction chain on a URL
//! - `config`: Show the effective configuration

mod add;
mod extract;
mod watch;

pub use add::AddArgs;
pub use extract::ExtractArgs;
pub use watch::{load_watchlist, parse_listing_arg, WatchArgs, WatchEntry};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bid-sniper")]
#[command(about = "Last-second bid sniper for online auction listings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Track listings and snipe them as they close
    Watch(WatchArgs),
    /// Extract a listing and print it as it would be tracked
    Add(AddArgs),
    /// Run the extraction chain on a URL
    Extract(ExtractArgs),
    /// Show the effective configuration
    Config,
}
