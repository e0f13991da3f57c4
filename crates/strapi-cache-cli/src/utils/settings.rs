//! Configuration resolution for the CLI.

use anyhow::{Context, Result};
use std::path::PathBuf;
use strapi_cache_core::{Config, FileStore};

use crate::cli::Cli;

/// Resolve configuration: file, then `STRAPI_*` environment, then flags.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply_env()?;
    apply_flags(&mut config, cli);
    Ok(config)
}

fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.url {
        config.url.clone_from(url);
    }
    if let Some(token) = &cli.token {
        config.token.clone_from(token);
    }
    if let Some(kind) = cli.cache_type {
        config.cache_type = kind.to_string();
    }
    if cli.full_urls {
        config.full_urls = true;
    }
    if cli.debug {
        config.debug = true;
    }
}

/// Directory the file cache lives in.
pub fn cache_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.cache_dir {
        Some(dir) => Ok(dir.clone()),
        None => FileStore::default_root().context("No cache directory; pass --cache-dir"),
    }
}
