// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config;
mod service;

pub use self::config::Libp2pConfig;
pub use self::service::*;

// Re-export some libp2p types
pub use libp2p::{Multiaddr, PeerId, identity::Keypair};
