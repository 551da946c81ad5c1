// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cli;
pub mod logger;

use crate::cli_shared::cli::Config;
use anyhow::Context as _;
use std::path::Path;

pub fn read_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    match config_path {
        Some(path) => {
            // Read from config file
            let toml = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            // Parse and return the configuration file
            read_toml(&toml).with_context(|| format!("invalid config file {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

pub fn read_toml<S>(toml_string: &str) -> anyhow::Result<S>
where
    for<'de> S: serde::de::Deserialize<'de>,
{
    let new_struct: S = toml::from_str(toml_string)?;
    Ok(new_struct)
}
