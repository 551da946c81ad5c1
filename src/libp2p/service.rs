// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::future::Future;

use anyhow::Context as _;
use async_trait::async_trait;
use futures::StreamExt as _;
use libp2p::{
    Multiaddr, PeerId, Swarm, SwarmBuilder, identity::Keypair, noise, swarm::SwarmEvent, tcp,
    yamux,
};
use tokio_util::compat::{Compat, FuturesAsyncReadCompatExt as _, FuturesAsyncWriteCompatExt as _};
use tracing::{debug, error, info};

use super::Libp2pConfig;
use crate::bitswap::{BITSWAP_PROTOCOL, BitswapConnection, BitswapStoreRead, Miniswap};

pub type BitswapSwarm = Swarm<libp2p_stream::Behaviour>;

/// Builds a TCP + noise + yamux swarm whose only behaviour hands out raw
/// protocol streams.
pub fn build_swarm(keypair: Keypair, config: &Libp2pConfig) -> anyhow::Result<BitswapSwarm> {
    let idle_connection_timeout = config.idle_connection_timeout();
    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default().nodelay(true),
            noise::Config::new,
            yamux::Config::default,
        )?
        .with_behaviour(|_| libp2p_stream::Behaviour::new())?
        .with_swarm_config(|config| config.with_idle_connection_timeout(idle_connection_timeout))
        .build();
    Ok(swarm)
}

/// Starts listening on `addrs` and waits until each listener reports its
/// address. Fails if none of them could be opened.
pub async fn start_listening(
    swarm: &mut BitswapSwarm,
    addrs: &[Multiaddr],
) -> anyhow::Result<Vec<Multiaddr>> {
    let mut listening = vec![];
    for addr in addrs {
        match swarm.listen_on(addr.clone()) {
            Ok(id) => loop {
                if let SwarmEvent::NewListenAddr {
                    address,
                    listener_id,
                } = swarm.select_next_some().await
                {
                    if id == listener_id {
                        info!("p2p peer is now listening on: {address}");
                        listening.push(address);
                        break;
                    }
                }
            },
            Err(err) => error!("Fail to listen on {addr}: {err}"),
        }
    }
    if listening.is_empty() {
        anyhow::bail!("p2p peer failed to listen on any network endpoints");
    }
    Ok(listening)
}

/// Drives the swarm until `shutdown` resolves.
pub async fn run_swarm(mut swarm: BitswapSwarm, shutdown: impl Future<Output = ()>) {
    let mut shutdown = std::pin::pin!(shutdown);
    loop {
        tokio::select! {
            event = swarm.select_next_some() => match event {
                SwarmEvent::NewListenAddr { address, .. } => {
                    info!("p2p peer is now listening on: {address}");
                }
                SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                    debug!(peer = %peer_id, "connection established");
                }
                SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
                    debug!(peer = %peer_id, ?cause, "connection closed");
                }
                SwarmEvent::IncomingConnectionError { error, .. } => {
                    debug!("incoming connection failed: {error}");
                }
                _ => {}
            },
            _ = &mut shutdown => break,
        }
    }
}

/// A peer reachable through a [`libp2p_stream::Control`].
#[derive(Clone)]
pub struct StreamConnection {
    control: libp2p_stream::Control,
    peer: PeerId,
}

impl StreamConnection {
    pub fn new(control: libp2p_stream::Control, peer: PeerId) -> Self {
        Self { control, peer }
    }
}

#[async_trait]
impl BitswapConnection for StreamConnection {
    type Stream = Compat<libp2p::Stream>;

    fn remote_peer(&self) -> PeerId {
        self.peer
    }

    async fn new_stream(&self) -> anyhow::Result<Self::Stream> {
        let stream = self
            .control
            .clone()
            .open_stream(self.peer, BITSWAP_PROTOCOL)
            .await
            .with_context(|| format!("failed to open bitswap stream to {}", self.peer))?;
        Ok(stream.compat_write())
    }
}

/// Accepts every inbound [`BITSWAP_PROTOCOL`] stream and hands it to
/// `miniswap`, one task per stream.
pub async fn serve<S>(
    miniswap: Miniswap<S, StreamConnection>,
    mut control: libp2p_stream::Control,
) -> anyhow::Result<()>
where
    S: BitswapStoreRead,
{
    let mut incoming = control
        .accept(BITSWAP_PROTOCOL)
        .context("bitswap protocol is already being served")?;
    while let Some((peer, stream)) = incoming.next().await {
        debug!(%peer, "accepted bitswap stream");
        let miniswap = miniswap.clone();
        let connection = StreamConnection::new(control.clone(), peer);
        tokio::spawn(async move {
            if let Err(e) = miniswap.handle_stream(connection, stream.compat()).await {
                debug!(%peer, "bitswap stream closed: {e:#}");
            }
        });
    }
    Ok(())
}
