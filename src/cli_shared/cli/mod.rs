// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config;

pub use self::config::*;

use crate::cli_shared::read_config;
use clap::Args;
use libp2p::Multiaddr;
use std::net::SocketAddr;
use std::path::PathBuf;

/// CLI options
#[derive(Default, Debug, Args)]
pub struct CliOpts {
    /// A TOML file containing relevant configurations
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Addresses to listen on, replacing the configured ones
    #[arg(long)]
    pub listen: Vec<Multiaddr>,
    /// Directory for hourly rotated log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long)]
    pub log_json: bool,
    /// Address to serve Prometheus metrics on
    #[arg(long)]
    pub metrics_address: Option<SocketAddr>,
}

impl CliOpts {
    pub fn to_config(&self) -> anyhow::Result<Config> {
        let mut cfg = read_config(self.config.as_deref())?;
        if !self.listen.is_empty() {
            cfg.network.listen_addresses = self.listen.clone();
        }
        Ok(cfg)
    }
}
