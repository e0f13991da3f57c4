//! Command implementations for the strapi-cache CLI
//!
//! Each command lives in its own module. Commands that talk to Strapi share
//! a [`Session`], which owns the client and any in-process refresh worker.

mod config;
mod forget;
mod read;
mod session;
mod write;

pub use config::execute as show_config;
pub use forget::execute as forget;
pub use read::{ReadTarget, execute as read};
pub use session::Session;
pub use write::{execute_create as create, execute_update as update};

use anyhow::Result;
use serde_json::Value;

/// Print a response as pretty JSON on stdout.
fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
