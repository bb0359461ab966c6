//! Curator binary - composition root.
//!
//! 1. Start logging and load configuration from TOML
//! 2. Build the scoring and embedding collaborators for the configured providers
//! 3. Read candidate items as JSON
//! 4. Run the ranking pipeline and write the digest as JSON

mod cli;

use std::path::Path;

use clap::Parser;
use curator_core::config::{CuratorConfig, GeneralConfig};
use curator_core::error::CuratorError;
use curator_core::types::{Item, RankingResult, TrendContext};
use curator_llm::{build_embedding_client, build_scoring_client};
use curator_rank::RankingPipeline;
use serde_json::Value;

use cli::{CliArgs, Command, RankArgs};

/// Parse items from a JSON array or an `{"items": [...]}` object.
fn parse_items(content: &str) -> Result<Vec<Item>, CuratorError> {
    let value: Value = serde_json::from_str(content)?;
    let list = match value {
        Value::Array(list) => Value::Array(list),
        Value::Object(mut map) => map.remove("items").ok_or_else(|| {
            CuratorError::InvalidItem("expected an array or an object with \"items\"".to_string())
        })?,
        _ => {
            return Err(CuratorError::InvalidItem(
                "expected an array of items".to_string(),
            ))
        }
    };
    let mut items: Vec<Item> = serde_json::from_value(list)?;
    for item in &mut items {
        item.ensure_id();
    }
    Ok(items)
}

fn read_items(path: &Path) -> Result<Vec<Item>, CuratorError> {
    let content = std::fs::read_to_string(path)?;
    parse_items(&content)
}

fn read_trends(path: &Path) -> Result<TrendContext, CuratorError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_result(result: &RankingResult, output: Option<&Path>) -> Result<(), CuratorError> {
    let json = serde_json::to_string_pretty(result)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)?;
            tracing::info!(path = %path.display(), items = result.items.len(), "Digest written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Apply command-line overrides on top of the file configuration.
fn apply_overrides(config: &mut CuratorConfig, args: &RankArgs) -> Result<(), CuratorError> {
    if let Some(top_n) = args.top_n {
        config.ranking.top_n = top_n;
    }
    if args.no_dedup {
        config.ranking.deduplicate = false;
    }
    config.ranking.validate()
}

async fn rank(mut config: CuratorConfig, args: RankArgs) -> Result<(), CuratorError> {
    apply_overrides(&mut config, &args)?;

    let scoring = build_scoring_client(&config.scoring)?;
    let embedding = build_embedding_client(&config.embedding)?;
    let pipeline = RankingPipeline::new(scoring, embedding, config.ranking.clone())?;

    let items = read_items(&args.input)?;
    tracing::info!(path = %args.input.display(), items = items.len(), "Items loaded");

    let trends = args.trends.as_deref().map(read_trends).transpose()?;

    let result = pipeline.run(items, trends.as_ref()).await?;
    write_result(&result, args.output.as_deref())
}

fn init_config(path: &Path, force: bool) -> Result<(), CuratorError> {
    if path.exists() && !force {
        return Err(CuratorError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    CuratorConfig::default().save(path)
}

/// Read the config file if present; a missing file means defaults.
fn load_config(path: &Path) -> Result<CuratorConfig, CuratorError> {
    if path.exists() {
        CuratorConfig::load(path)
    } else {
        Ok(CuratorConfig::default())
    }
}

async fn run(args: CliArgs) -> Result<(), CuratorError> {
    let config_file = args.resolve_config_path();
    let startup_level = args.resolve_log_level(&GeneralConfig::default().log_level);

    match &args.command {
        Command::InitConfig { force } => {
            curator_core::logging::init(&startup_level);
            tracing::info!("Starting curator v{}", env!("CARGO_PKG_VERSION"));
            init_config(&config_file, *force)
        }
        Command::Rank(rank_args) => {
            // Config is read before the global subscriber exists.
            let config =
                curator_core::logging::scoped(&startup_level, || load_config(&config_file))?;

            // Tracing.
            curator_core::logging::init(&args.resolve_log_level(&config.general.log_level));
            tracing::info!("Starting curator v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!(
                path = %config_file.display(),
                found = config_file.exists(),
                "Configuration resolved"
            );

            rank(config, rank_args.clone()).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CuratorError> {
    run(CliArgs::parse()).await
}
