//! Explicit cache invalidation.

use anyhow::Result;

use super::Session;
use crate::cli::QueryArgs;
use crate::utils::params::query_params;

/// Forget the cached response for a request and report whether one existed.
pub async fn execute(
    session: &Session,
    endpoint: &str,
    collection: bool,
    args: &QueryArgs,
) -> Result<()> {
    let client = session.client();
    let mut params = query_params(args)?;
    if collection {
        params = client.collection_params(&params);
    }

    let removed = client
        .forget(endpoint, &params, client.config().full_urls)
        .await?;
    if removed {
        println!("Forgot cached response for {endpoint}");
    } else {
        println!("Nothing cached for {endpoint}");
    }
    Ok(())
}
