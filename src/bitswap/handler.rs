// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use ahash::HashMap;
use anyhow::Context as _;
use futures::TryStreamExt as _;
use libp2p::PeerId;
use parking_lot::RwLock;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use super::config::BitswapConfig;
use super::internals::codec::frame_reader;
use super::message::Message;
use super::metrics;
use super::queue::WantQueue;
use super::store::BitswapStoreRead;
use super::transport::BitswapConnection;

type QueueRegistry<S, C> = Arc<RwLock<HashMap<PeerId, Arc<WantQueue<S, C>>>>>;

/// Answers the wants of every peer that opens a bitswap stream to us.
///
/// Each peer gets its own [`WantQueue`], created on first contact and
/// forgotten once the peer has neither open inbound streams nor unanswered
/// wants, or as soon as one of its streams fails. The peer's other streams
/// then move over to a fresh queue on their next wantlist.
pub struct Miniswap<S, C> {
    store: Arc<S>,
    config: BitswapConfig,
    queues: QueueRegistry<S, C>,
}

impl<S, C> Clone for Miniswap<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            queues: self.queues.clone(),
        }
    }
}

impl<S, C> Miniswap<S, C>
where
    S: BitswapStoreRead,
    C: BitswapConnection,
{
    pub fn new(store: Arc<S>, config: BitswapConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid bitswap configuration")?;
        Ok(Self {
            store,
            config,
            queues: Default::default(),
        })
    }

    /// Reads wants from an inbound stream until it ends, answering them over
    /// new outbound streams on `connection`. A failing stream drops the peer's
    /// queue along with every want it still holds.
    pub async fn handle_stream<R>(&self, connection: C, inbound: R) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let peer = connection.remote_peer();
        let mut queue = self.queue_for(connection.clone());
        match self.read_wants(&connection, &mut queue, inbound).await {
            Ok(()) => {
                queue.stream_closed();
                self.evict_if_idle(&peer);
                Ok(())
            }
            Err(e) => {
                warn!(%peer, "bitswap inbound stream failed: {e:#}");
                queue.abort();
                queue.stream_closed();
                self.remove_queue(&peer, &queue);
                Err(e)
            }
        }
    }

    async fn read_wants<R>(
        &self,
        connection: &C,
        queue: &mut Arc<WantQueue<S, C>>,
        inbound: R,
    ) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut frames = frame_reader(inbound, self.config.max_inbound_frame_size);
        while let Some(frame) = frames
            .try_next()
            .await
            .context("failed to read bitswap frame")?
        {
            metrics::INBOUND_BYTES.inc_by(frame.len() as u64);
            let message = Message::from_bytes(&frame).context("malformed bitswap message")?;
            let entries = message.wantlist.entries;
            debug!(peer = %queue.peer(), entries = entries.len(), "received bitswap wantlist");
            if entries.is_empty() {
                continue;
            }
            self.follow_registered(connection, queue);
            queue.append(entries);
            self.spawn_process(queue.clone());
        }
        Ok(())
    }

    fn spawn_process(&self, queue: Arc<WantQueue<S, C>>) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = queue.process().await {
                warn!(peer = %queue.peer(), "failed to answer bitswap wants: {e:#}");
            }
            this.evict_if_idle(&queue.peer());
        });
    }

    fn queue_for(&self, connection: C) -> Arc<WantQueue<S, C>> {
        let mut queues = self.queues.write();
        let queue = queues
            .entry(connection.remote_peer())
            .or_insert_with(|| {
                metrics::PEER_QUEUES.inc();
                Arc::new(WantQueue::new(
                    connection.clone(),
                    self.store.clone(),
                    self.config.resolve_concurrency,
                ))
            })
            .clone();
        queue.stream_opened(connection);
        queue
    }

    /// Re-points a stream at the peer's registered queue when the one it was
    /// feeding has been removed.
    fn follow_registered(&self, connection: &C, queue: &mut Arc<WantQueue<S, C>>) {
        let registered = self
            .queues
            .read()
            .get(&queue.peer())
            .is_some_and(|registered| Arc::ptr_eq(registered, queue));
        if !registered {
            queue.stream_closed();
            *queue = self.queue_for(connection.clone());
        }
    }

    fn evict_if_idle(&self, peer: &PeerId) {
        let mut queues = self.queues.write();
        let idle = queues
            .get(peer)
            .is_some_and(|queue| queue.inbound_streams() == 0 && queue.is_idle());
        if idle {
            queues.remove(peer);
            metrics::PEER_QUEUES.dec();
            debug!(%peer, "evicted idle bitswap queue");
        }
    }

    fn remove_queue(&self, peer: &PeerId, queue: &Arc<WantQueue<S, C>>) {
        let mut queues = self.queues.write();
        if queues
            .get(peer)
            .is_some_and(|registered| Arc::ptr_eq(registered, queue))
        {
            queues.remove(peer);
            metrics::PEER_QUEUES.dec();
        }
    }

    pub fn queue(&self, peer: &PeerId) -> Option<Arc<WantQueue<S, C>>> {
        self.queues.read().get(peer).cloned()
    }

    pub fn peer_count(&self) -> usize {
        self.queues.read().len()
    }
}
