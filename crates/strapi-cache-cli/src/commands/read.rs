//! Cached read commands: collection, count, entry, single.

use anyhow::Result;

use super::{Session, print_json};
use crate::cli::QueryArgs;
use crate::utils::params::{query_params, request_options};

/// What a read command fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    /// A collection type.
    Collection(String),
    /// Number of entries in a collection type.
    Count(String),
    /// One entry of a collection type.
    Entry(String, String),
    /// A single type.
    Single(String),
}

/// Execute a read and print the response.
pub async fn execute(session: &Session, target: &ReadTarget, args: &QueryArgs) -> Result<()> {
    let client = session.client();
    let params = query_params(args)?;
    let options = request_options(args, client.config().full_urls);

    let value = match target {
        ReadTarget::Collection(name) => client.collection(name, &params, options).await?,
        ReadTarget::Count(name) => client.collection_count(name, &params, options).await?,
        ReadTarget::Entry(name, id) => client.entry(name, id, &params, options).await?,
        ReadTarget::Single(name) => client.single(name, &params, options).await?,
    };
    print_json(&value)
}
