use std::path::Path;

use chairside_core::BridgeConfig;
use dotenvy::dotenv;
use eyre::{Result, eyre};

pub fn load_env() -> Result<()> {
    dotenv().ok();
    Ok(())
}

/// Bridge configuration with the usual precedence: explicit `--url`, then
/// environment, then the config file, then defaults.
pub fn resolve_config(url: Option<&str>, path: Option<&Path>) -> Result<BridgeConfig> {
    let config = match path {
        Some(path) => BridgeConfig::load_from(path)
            .map_err(|e| eyre!("Failed to load config: {}", e))?
            .apply_env(),
        None => BridgeConfig::load().map_err(|e| eyre!("Failed to load config: {}", e))?,
    };

    Ok(match url {
        Some(url) if !url.trim().is_empty() => config.with_ws_url(url),
        _ => config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ws_url = \"ws://file:1/ws\"\nmax_log_entries = 7\n").unwrap();

        let config = resolve_config(Some("ws://flag:2/ws"), Some(&path)).unwrap();

        assert_eq!(config.ws_url, "ws://flag:2/ws");
        assert_eq!(config.max_log_entries, 7);
    }

    #[test]
    fn broken_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ws_url = [").unwrap();

        assert!(resolve_config(None, Some(&path)).is_err());
    }
}
