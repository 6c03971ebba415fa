mod args;
mod ui;

use anyhow::{Context, Result};
use args::{Cli, Commands};
use clap::Parser;
use colored::*;
use formatrank_core::*;
use std::io::Read;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    let config = RankConfig::load(cli.config.as_deref())
        .context("Failed to load ranking configuration")?;
    let engine = FormatEngine::with_config(config);

    match cli.command {
        Commands::Rank(args) => {
            rank_formats(&engine, args)?;
        }

        Commands::Select(args) => {
            select_formats(&engine, args)?;
        }

        Commands::Resolve(args) => {
            resolve_url(&engine, args).await?;
        }

        Commands::Config(args) => {
            handle_config(&engine, args)?;
        }
    }

    Ok(())
}

fn rank_formats(engine: &FormatEngine, args: args::RankArgs) -> Result<()> {
    let formats = load_formats(&args.input)?;

    let ranked = match &args.field_preference {
        Some(list) => {
            let fields = SortField::parse_list(list)?;
            debug!("Ranking by {:?}", fields);
            engine.rank_by(formats, &fields)
        }
        None => engine.rank(formats),
    };

    ui::display_formats(&ranked, args.json)
}

fn select_formats(engine: &FormatEngine, args: args::SelectArgs) -> Result<()> {
    let formats = load_formats(&args.input)?;
    let chosen = engine
        .choose(formats, &args.format)
        .map_err(explain_select_error)?;

    ui::display_selection(&chosen, args.json)
}

async fn resolve_url(engine: &FormatEngine, args: args::ResolveArgs) -> Result<()> {
    let registry = ExtractorRegistry::with_defaults();
    let mut session = SessionContext::new();

    match registry.resolve(&args.url, &mut session).await? {
        Resolved::Video(info) => {
            if !args.json {
                ui::display_video_info(&info);
            }
            let chosen = engine
                .choose_for(&info, &args.format)
                .map_err(explain_select_error)?;
            ui::display_selection(&chosen, args.json)?;
        }
        Resolved::Playlist { title, entries } => {
            println!(
                "{} {}",
                "Playlist:".cyan().bold(),
                title.as_deref().unwrap_or("untitled").green()
            );
            for entry in entries {
                match entry {
                    Ok(info) => match engine.choose_for(&info, &args.format) {
                        Ok(chosen) => {
                            ui::display_video_info(&info);
                            ui::display_selection(&chosen, args.json)?;
                        }
                        Err(e) => warn!("{}: {}", info.id, explain_select_error(e)),
                    },
                    Err(e) => println!("{} {}", "Skipped:".red(), e),
                }
            }
        }
    }

    Ok(())
}

fn handle_config(engine: &FormatEngine, args: args::ConfigArgs) -> Result<()> {
    match args.action {
        args::ConfigAction::Show => {
            ui::display_config(engine.config())?;
        }
        args::ConfigAction::Path => match RankConfig::default_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("No config directory on this platform"),
        },
    }
    Ok(())
}

// Helper functions
fn read_input(input: &str) -> Result<serde_json::Value> {
    let text = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };

    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", input))
}

fn load_formats(input: &str) -> Result<Vec<FormatRecord>> {
    let value = read_input(input)?;
    let intake = records_from_json(&value)?;

    if !intake.rejected.is_empty() {
        warn!("Skipped {} unreadable format(s)", intake.rejected.len());
    }
    Ok(intake.records)
}

fn explain_select_error(error: SelectError) -> anyhow::Error {
    match error {
        SelectError::FormatNotFound { available, .. } => anyhow::anyhow!(
            "requested format not available, available formats are: {}",
            available.join(", ")
        ),
        other => other.into(),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}
