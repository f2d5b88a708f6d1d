mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: EngineConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./framedex.toml", "~/.config/framedex/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(EngineConfig::default())
}

/// Validate configuration
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    if config.threads == 0 || config.threads > MAX_THREADS {
        tracing::warn!(
            "threads = {} is outside 1..={}; using {}",
            config.threads,
            MAX_THREADS,
            config.decoder_threads()
        );
    }

    if config.index.max_records == Some(0) {
        anyhow::bail!("index.max_records must be at least 1");
    }

    Ok(())
}
