//! Config file loading

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tally_core::EngineConfig;

/// Read an engine config from a TOML file, or use defaults when no file is given
pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse(&text).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn parse(text: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}
