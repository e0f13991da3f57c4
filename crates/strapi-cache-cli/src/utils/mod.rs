//! Shared helpers for the CLI commands.

pub mod logging;
pub mod params;
pub mod settings;

pub use logging::initialize_logging;
