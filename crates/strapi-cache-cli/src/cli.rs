//! # CLI Structure and Argument Parsing
//!
//! `strapi-cache` exposes the client operations from the shell. Global options
//! override configuration (file, then `STRAPI_*` environment, then flags);
//! subcommands map one-to-one onto client operations.
//!
//! ```bash
//! # Read a collection with the configured defaults
//! strapi-cache --url https://cms.example.com/api collection articles
//!
//! # Nested query parameters use bracket notation
//! strapi-cache collection articles -p 'populate[0]=cover' -p 'pagination[limit]=5'
//!
//! # Filters: `field=value` for equality, `field:$op=value` otherwise
//! strapi-cache collection articles --filter 'slug=hello' --filter 'views:$gte=10'
//!
//! # Uncached writes
//! strapi-cache create articles --data '{"title":"Hello"}'
//! strapi-cache update articles 7 --data @patch.json
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use strapi_cache_core::CacheKind;

/// Main CLI structure for the `strapi-cache` command.
#[derive(Parser, Clone, Debug)]
#[command(name = "strapi-cache")]
#[command(version)]
#[command(about = "Cached reads from a Strapi CMS", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "STRAPI_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Strapi API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// API token
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Caching strategy for reads
    #[arg(long, global = true, value_name = "TYPE", value_parser = parse_cache_kind)]
    pub cache_type: Option<CacheKind>,

    /// Rewrite relative asset URLs to absolute ones
    #[arg(long, global = true)]
    pub full_urls: bool,

    /// Directory for cached responses
    #[arg(long, global = true, env = "STRAPI_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log every request sent to Strapi
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Fetch a collection type
    Collection {
        /// Collection name, e.g. `articles`
        name: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Count entries of a collection type
    Count {
        /// Collection name
        name: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Fetch one entry of a collection type
    Entry {
        /// Collection name
        name: String,

        /// Entry id
        id: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Fetch a single type
    Single {
        /// Single type name, e.g. `homepage`
        name: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Create an entry (never cached)
    Create {
        /// Collection name
        name: String,

        /// Entry fields as JSON, or `@path` to read them from a file
        #[arg(long, value_name = "JSON")]
        data: String,
    },

    /// Update an entry (never cached)
    Update {
        /// Collection name
        name: String,

        /// Entry id
        id: String,

        /// Changed fields as JSON, or `@path` to read them from a file
        #[arg(long, value_name = "JSON")]
        data: String,
    },

    /// Drop the cached response for a request
    Forget {
        /// Endpoint as passed to a read, e.g. `articles` or `articles/7`
        endpoint: String,

        /// Apply collection default sort and pagination before computing the key
        #[arg(long)]
        collection: bool,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show the resolved configuration
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },
}

/// Query options shared by the read commands.
#[derive(Args, Clone, Debug, Default)]
pub struct QueryArgs {
    /// Query parameter as `key=value`; keys may use brackets (`populate[0]=cover`)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Filter as `field=value` or `field:$op=value`
    #[arg(long = "filter", value_name = "FILTER")]
    pub filters: Vec<String>,

    /// TTL in seconds for the normal strategy
    #[arg(long, value_name = "SECS")]
    pub cache_time: Option<u64>,
}

fn parse_cache_kind(value: &str) -> Result<CacheKind, String> {
    value.parse().map_err(|e: strapi_cache_core::Error| e.to_string())
}
