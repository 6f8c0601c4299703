// ElkLens CLI - process-boundary entry point for the analysis pipeline

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use elklens_core::{write_json, BatchId, Config, ElkLens, PipelineError, RawLogRecord};
use serde_json::{json, Map, Value};
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the JSON result only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(provider) = cli.provider {
        config.provider.name = provider;
    }

    let lens = ElkLens::from_config(config).await?;
    info!("Configured reasoning provider: {}", lens.provider_name());

    match cli.command {
        Commands::Analyze {
            prompt,
            context,
            output,
        } => {
            let context = context.as_deref().map(parse_context).transpose()?;
            let report = lens.analyze_prompt(&prompt, context).await?;
            write_json(&report, output.as_deref())?;
        }
        Commands::GetAnalysis { batch_id, output } => {
            let report = lens.get_analysis(&BatchId::from(batch_id)).await?;
            write_json(&report, output.as_deref())?;
        }
        Commands::GetResults { batch_id, output } => {
            let results = lens.get_results(&BatchId::from(batch_id)).await?;
            write_json(&results, output.as_deref())?;
        }
        Commands::Ingest {
            file,
            no_analyze,
            prompt,
            output,
        } => {
            let records = read_records(file.as_deref())?;
            info!("Read {} records", records.len());
            if no_analyze {
                let batch = lens.ingest(&records).await?;
                let summary = json!({
                    "batch_id": batch.batch_id(),
                    "entries": batch.len(),
                });
                write_json(&summary, output.as_deref())?;
            } else {
                let report = match prompt {
                    Some(prompt) => lens.analyze_prompt_with_logs(&prompt, &records).await?,
                    None => lens.ingest_and_analyze(&records).await?,
                };
                write_json(&report, output.as_deref())?;
            }
        }
        Commands::Rerun { batch_id, output } => {
            let report = lens.rerun(&BatchId::from(batch_id)).await?;
            write_json(&report, output.as_deref())?;
        }
    }

    Ok(())
}

fn parse_context(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PipelineError::validation("--context must be a JSON object").into()),
        Err(e) => Err(PipelineError::validation(format!("--context is not valid JSON: {}", e)).into()),
    }
}

/// Accepts an array of hits, a single hit, or a full search response
/// (`{"hits": {"hits": [...]}}`).
fn read_records(path: Option<&Path>) -> Result<Vec<RawLogRecord>> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let value: Value = serde_json::from_str(&text)
        .map_err(|e| PipelineError::validation(format!("input is not valid JSON: {}", e)))?;
    records_from_value(value)
}

fn records_from_value(value: Value) -> Result<Vec<RawLogRecord>> {
    let hits = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.get_mut("hits").and_then(|h| h.get_mut("hits")).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(map)],
        },
        _ => {
            return Err(PipelineError::validation("input must be a JSON array or object").into());
        }
    };

    hits.into_iter()
        .enumerate()
        .map(|(i, hit)| {
            serde_json::from_value(hit).map_err(|e| {
                anyhow::Error::from(PipelineError::validation(format!("record {}: {}", i, e)))
            })
        })
        .collect()
}

/// Exit status for a failed run; pipeline errors map to their kind's code.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map(|e| e.kind().exit_code() as u8)
        .unwrap_or(1)
}
