//! Parsing of query, filter and payload arguments.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use std::time::Duration;
use strapi_cache_core::{Filter, QueryParams, RequestOptions};

use crate::cli::QueryArgs;

/// Build query parameters from `--param` and `--filter` values.
pub fn query_params(args: &QueryArgs) -> Result<QueryParams> {
    let mut params = QueryParams::new();
    for raw in &args.params {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --param '{raw}': expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid --param '{raw}': empty key");
        }
        params.insert_path(key, value);
    }
    for raw in &args.filters {
        params = params.with_filter(parse_filter(raw)?);
    }
    Ok(params)
}

/// Per-call options from the read arguments.
pub fn request_options(args: &QueryArgs, full_urls: bool) -> RequestOptions {
    let options = RequestOptions::new().full_urls(full_urls);
    match args.cache_time {
        Some(secs) => options.cache_time(Duration::from_secs(secs)),
        None => options,
    }
}

fn parse_filter(raw: &str) -> Result<Filter> {
    let (target, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid --filter '{raw}': expected FIELD=VALUE or FIELD:$OP=VALUE"))?;
    match target.split_once(':') {
        Some((field, op)) if !field.is_empty() && op.starts_with('$') => {
            Ok(Filter::new(field, op, value))
        },
        Some(_) => bail!("Invalid --filter '{raw}': operators look like $eq, $contains, ..."),
        None if target.is_empty() => bail!("Invalid --filter '{raw}': empty field"),
        None => Ok(Filter::eq(target, value)),
    }
}

/// Parse a `--data` argument: inline JSON, or `@path` to a JSON file.
pub fn json_payload(raw: &str) -> Result<Value> {
    let (text, source) = match raw.strip_prefix('@') {
        Some(path) => (
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?,
            path,
        ),
        None => (raw.to_string(), "--data"),
    };
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {source}"))
}
