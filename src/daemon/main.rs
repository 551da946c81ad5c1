// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::cli_shared::{cli::CliOpts, logger};
use anyhow::Context as _;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Builder as RuntimeBuilder;
use tracing::info;

/// CLI structure generated when interacting with the miniswap binary
#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), author = env!("CARGO_PKG_AUTHORS"), version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[clap(flatten)]
    pub opts: CliOpts,
    /// Files to serve, each stored as a single raw block
    #[arg(long)]
    pub import: Vec<PathBuf>,
}

pub fn main<ArgT>(args: impl IntoIterator<Item = ArgT>) -> anyhow::Result<()>
where
    ArgT: Into<OsString> + Clone,
{
    // Capture Cli inputs
    let Cli { opts, import } = Cli::parse_from(args);

    let cfg = opts.to_config().context("Error parsing config")?;

    logger::setup_logger(&opts);

    let rt = RuntimeBuilder::new_multi_thread().enable_all().build()?;
    let ret = rt.block_on(super::start(opts, cfg, import));
    info!("Shutting down tokio...");
    rt.shutdown_timeout(Duration::from_secs_f32(0.5));
    info!("miniswap finish shutdown");
    ret
}
