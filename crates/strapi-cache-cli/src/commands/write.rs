//! Uncached write commands.

use anyhow::Result;

use super::{Session, print_json};
use crate::utils::params::json_payload;

/// Create an entry and print the CMS response.
pub async fn execute_create(session: &Session, name: &str, data: &str) -> Result<()> {
    let payload = json_payload(data)?;
    let created = session.client().create(name, payload).await?;
    print_json(&created)
}

/// Update an entry and print the CMS response.
pub async fn execute_update(session: &Session, name: &str, id: &str, data: &str) -> Result<()> {
    let payload = json_payload(data)?;
    let updated = session.client().update(name, id, payload).await?;
    print_json(&updated)
}
