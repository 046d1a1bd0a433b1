use anyhow::{anyhow, Result};

use crate::cli::flags::{Cli, Command};
use crate::config::{load_config, AppConfig};
use crate::core::profile::BrandProfile;

/// Config file values with the subcommand's overrides applied.
pub fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Command::Scan {
        threshold,
        no_structural,
        ..
    } = &cli.command
    {
        if let Some(threshold) = threshold {
            if *threshold > 100 {
                return Err(anyhow!("--threshold must be within 0..=100"));
            }
            cfg.similarity_threshold = *threshold;
        }
        if *no_structural {
            cfg.enable_structural_check = false;
        }
    }
    Ok(cfg)
}

pub fn resolve_query(explicit: Option<&str>, profile: &BrandProfile) -> String {
    match explicit.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => q.to_string(),
        None => format!("{} login", profile.company_name),
    }
}
