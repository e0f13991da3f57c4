//! Show the resolved configuration.

use anyhow::Result;
use strapi_cache_core::Config;

const REDACTED: &str = "<redacted>";

/// Print the resolved configuration as TOML, or the config file path.
pub fn execute(config: &Config, show_path: bool) -> Result<()> {
    if show_path {
        println!("{}", Config::default_path()?.display());
        return Ok(());
    }
    print!("{}", render(config)?);
    Ok(())
}

fn render(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    if !shown.token.is_empty() {
        shown.token = REDACTED.to_string();
    }
    Ok(toml::to_string_pretty(&shown)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() -> Result<()> {
        let mut config = Config::new("https://cms.test");
        config.token = "super-secret".into();

        let rendered = render(&config)?;
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains(REDACTED));
        assert!(rendered.contains("url = \"https://cms.test\""));
        Ok(())
    }
}
