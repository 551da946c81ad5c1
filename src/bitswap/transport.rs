// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use async_trait::async_trait;
use libp2p::PeerId;
use tokio::io::AsyncWrite;

/// A connection to one remote peer that outbound response streams can be
/// opened on.
#[async_trait]
pub trait BitswapConnection: Clone + Send + Sync + 'static {
    type Stream: AsyncWrite + Send + Unpin + 'static;

    fn remote_peer(&self) -> PeerId;

    /// Opens a new stream for [`super::BITSWAP_PROTOCOL`] to the remote peer.
    async fn new_stream(&self) -> anyhow::Result<Self::Stream>;
}
