// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::bitswap::BitswapConfig;
use crate::libp2p::Libp2pConfig;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub network: Libp2pConfig,
    pub bitswap: BitswapConfig,
}
