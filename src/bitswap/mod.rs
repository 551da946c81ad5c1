// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! A minimal responder for the libp2p
//! bitswap([protocol](https://github.com/ipfs/specs/blob/main/BITSWAP.md))
//! protocol, version 1.2.0.
//!
//! ## Features
//!
//! - Answers `want-block` and `want-have` entries from a local store
//! - Honors cancels, including for lookups already in flight
//! - Keeps every outbound message under the 4 MiB ceiling
//! - Prometheus metrics
//!
//! ## Usage
//!
//! Hand every inbound stream for [`BITSWAP_PROTOCOL`] to
//! [`Miniswap::handle_stream`], together with a [`BitswapConnection`] that can
//! open outbound streams back to the same peer. Answers never travel on the
//! inbound stream.

use libp2p::StreamProtocol;

mod internals;

mod config;
pub use config::*;

mod handler;
pub use handler::*;

mod message;
pub use message::*;

pub mod metrics;

mod prefix;
pub use prefix::*;

mod queue;
pub use queue::*;

mod resolver;
pub use resolver::*;

mod store;
pub use store::*;

mod transport;
pub use transport::*;

pub const BITSWAP_PROTOCOL: StreamProtocol = StreamProtocol::new("/ipfs/bitswap/1.2.0");
