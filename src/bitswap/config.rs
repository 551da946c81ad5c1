// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};

use super::message::MAX_MESSAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BitswapConfig {
    /// Number of store lookups a single peer's queue may run at once.
    pub resolve_concurrency: usize,
    /// Largest inbound frame accepted before the stream is dropped.
    pub max_inbound_frame_size: usize,
}

impl Default for BitswapConfig {
    fn default() -> Self {
        Self {
            resolve_concurrency: 10,
            max_inbound_frame_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl BitswapConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.resolve_concurrency > 0,
            "bitswap.resolve_concurrency must be positive"
        );
        anyhow::ensure!(
            self.max_inbound_frame_size >= MAX_MESSAGE_SIZE,
            "bitswap.max_inbound_frame_size must be at least {MAX_MESSAGE_SIZE}, got {}",
            self.max_inbound_frame_size
        );
        Ok(())
    }
}
