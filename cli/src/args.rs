use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "formatrank")]
#[command(about = "Rank and select media formats")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Ranking config file (default: <config dir>/formatrank/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a format list ordered worst to best
    Rank(RankArgs),

    /// Pick formats from a list with a format spec
    Select(SelectArgs),

    /// Extract formats from a URL and pick among them
    Resolve(ResolveArgs),

    /// Ranking configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RankArgs {
    /// JSON file with a format list, or - for stdin
    pub input: String,

    /// Comma-separated sort fields replacing the default order
    /// Example: height,tbr,format_id
    #[arg(long)]
    pub field_preference: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct SelectArgs {
    /// JSON file with a format list, or - for stdin
    pub input: String,

    /// Format spec (best, worst, bestvideo+bestaudio, 22/18, best[height<=720], ...)
    #[arg(short, long, default_value = "best")]
    pub format: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Media URL
    pub url: String,

    /// Format spec
    #[arg(short, long, default_value = "best")]
    pub format: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print where the config file is looked up
    Path,
}
