use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::config::{resolve_config, resolve_query};
use crate::cli::flags::{Cli, Command};
use crate::core::engine::Engine;
use crate::core::profile::load_profile;
use crate::core::types::OutputFormat;
use crate::pipeline::reporter::{render_report, write_report};

pub async fn run(cli: Cli) -> Result<()> {
    let cfg = resolve_config(&cli)?;
    let engine = Engine::new(cfg)?;

    match cli.command {
        Command::Scan {
            profile,
            query,
            format,
            output,
            backends,
            ..
        } => {
            run_scan(
                &engine,
                &profile,
                query.as_deref(),
                format.into(),
                output.as_deref(),
                backends.as_deref(),
            )
            .await
        }
        Command::Search { query, backends } => run_search(&engine, &query, backends.as_deref()).await,
    }
}

async fn run_scan(
    engine: &Engine,
    profile_path: &Path,
    query: Option<&str>,
    format: OutputFormat,
    output: Option<&Path>,
    backends: Option<&[String]>,
) -> Result<()> {
    let profile = load_profile(profile_path)
        .with_context(|| format!("loading brand profile {}", profile_path.display()))?;
    let query = resolve_query(query, &profile);
    tracing::info!(company = %profile.company_name, query = %query, "starting scan");

    let report = engine.scan(&profile, &query, backends).await?;
    match output {
        Some(path) => {
            write_report(&report, format, path)?;
            tracing::info!("report written to {}", path.display());
        }
        None => print!("{}", render_report(&report, format)?),
    }
    Ok(())
}

async fn run_search(engine: &Engine, query: &str, backends: Option<&[String]>) -> Result<()> {
    let results = engine.search(query, backends).await;
    for failure in &results.errors {
        tracing::warn!(backend = %failure.backend, "{}", failure.error);
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
