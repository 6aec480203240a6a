//! gridcfg: render a grid definition against request input.
//!
//! Usage:
//!   gridcfg users.yml --input request.json --sort=-created --page 2
//!   gridcfg users.yml --format sql

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use grid_configurator::config::Config;
use grid_configurator::{DataProvider, DataProviderOverrides, GridDefinition, GridOverrides};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Grid configuration with the rendered SQL.
    Json,
    /// Rendered SELECT and COUNT statements only.
    Sql,
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Grid definition file (YAML, or JSON with a .json extension).
    definition: PathBuf,

    /// Request input as a JSON file: `{form_name: {attribute: value}}`.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Sort parameter, e.g. `-created,name`.
    #[arg(long)]
    sort: Option<String>,

    /// Page to render.
    #[arg(long, default_value = "1")]
    page: u32,

    #[arg(long, value_enum, default_value = "json")]
    format: Format,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let definition = GridDefinition::from_path(&args.definition)
        .with_context(|| format!("failed to load {}", args.definition.display()))?;
    let input = read_input(args.input.as_ref())?;

    let mut builder = definition.builder().context("invalid grid definition")?;
    if definition.form_name.is_none() {
        builder = builder.form_name(config.form_name.clone());
    }
    if definition.pagination.is_none() {
        builder = builder.pagination(config.pagination());
    }
    let configurator = builder
        .input(input)
        .init()
        .context("failed to configure grid")?;

    info!(
        columns = configurator.columns().len(),
        errors = configurator.filter_model().errors().len(),
        "grid configured"
    );

    let mut provider = DataProvider::new(configurator.data_provider_config(DataProviderOverrides::new()))
        .with_page(args.page);
    if let Some(sort) = args.sort {
        provider = provider.with_sort_param(sort);
    }
    let (sql, count_sql) = (provider.sql(), provider.count_sql());

    match args.format {
        Format::Sql => {
            println!("{sql};");
            println!("{count_sql};");
        }
        Format::Json => {
            let grid = configurator.grid_config(GridOverrides::new().data_provider(provider));
            let mut output = serde_json::to_value(&grid).context("failed to serialize grid")?;
            if let Value::Object(map) = &mut output {
                map.insert("sql".to_string(), json!(sql));
                map.insert("count_sql".to_string(), json!(count_sql));
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("failed to serialize grid")?
            );
        }
    }
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(json!({}));
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
