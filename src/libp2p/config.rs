// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::net::Ipv4Addr;
use std::time::Duration;

use libp2p::{Multiaddr, multiaddr::Protocol};
use serde::{Deserialize, Serialize};

/// Libp2p config for the bitswap node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Libp2pConfig {
    /// Local addresses to listen on.
    pub listen_addresses: Vec<Multiaddr>,
    /// Seconds a connection without open streams is kept alive.
    pub idle_connection_timeout_secs: u64,
}

impl Default for Libp2pConfig {
    fn default() -> Self {
        Self {
            listen_addresses: vec![
                Multiaddr::empty()
                    .with(Protocol::Ip4(Ipv4Addr::UNSPECIFIED))
                    .with(Protocol::Tcp(0)),
            ],
            idle_connection_timeout_secs: 60,
        }
    }
}

impl Libp2pConfig {
    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_timeout_secs)
    }
}
