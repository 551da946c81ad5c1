// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod bitswap;
mod cli_shared;
mod daemon;
pub mod db;
pub mod libp2p;
pub mod metrics;
#[cfg(test)]
mod test_utils;

pub use cli_shared::cli::{CliOpts, Config};
pub use daemon::main::main as miniswapd_main;
