// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::Poll;

use anyhow::Context as _;
use bytes::Bytes;
use futures::{SinkExt as _, TryStreamExt as _, stream};
use libp2p::PeerId;
use parking_lot::Mutex;
use tracing::debug;

use super::internals::codec::frame_writer;
use super::message::{BlockPresenceType, Entry, Message, WantType};
use super::metrics::{self, values};
use super::resolver::{WantRequest, resolve_and_pack};
use super::store::BitswapStoreRead;
use super::transport::BitswapConnection;

/// Wants received from one peer that are yet to be answered.
///
/// Wants are appended as they arrive on the peer's inbound streams and
/// answered by [`WantQueue::process`], which runs at most one drain cycle at
/// a time. A drain cycle hands pending wants to the resolver one by one,
/// tracking them as in flight until the cycle ends, and writes the answers
/// to a single outbound stream.
pub struct WantQueue<S, C> {
    peer: PeerId,
    store: Arc<S>,
    resolve_concurrency: usize,
    connection: Mutex<C>,
    inbound_streams: AtomicUsize,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<WantRequest>,
    in_flight: Vec<WantRequest>,
    draining: bool,
}

impl QueueState {
    fn cancel_matching(&mut self, cancel: &Entry) {
        for want in &self.in_flight {
            if want.entry.same_target(cancel) {
                want.cancel.cancel();
            }
        }
        self.pending.retain(|want| {
            let matched = want.entry.same_target(cancel);
            if matched {
                want.cancel.cancel();
            }
            !matched
        });
    }

    fn cancel_all(&mut self) {
        for want in self.pending.drain(..).chain(self.in_flight.drain(..)) {
            want.cancel.cancel();
        }
    }
}

impl<S, C> WantQueue<S, C>
where
    S: BitswapStoreRead,
    C: BitswapConnection,
{
    pub fn new(connection: C, store: Arc<S>, resolve_concurrency: usize) -> Self {
        Self {
            peer: connection.remote_peer(),
            store,
            resolve_concurrency,
            connection: Mutex::new(connection),
            inbound_streams: AtomicUsize::new(0),
            state: Default::default(),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Queues wants and applies cancels. A cancel stops every pending or in
    /// flight want for the same hash digest and want type.
    pub fn append(&self, entries: impl IntoIterator<Item = Entry>) {
        let mut state = self.state.lock();
        for entry in entries {
            let kind = match (entry.cancel, entry.want_type) {
                (true, _) => values::INBOUND_CANCEL,
                (false, WantType::Block) => values::INBOUND_WANT_BLOCK,
                (false, WantType::Have) => values::INBOUND_WANT_HAVE,
            };
            metrics::MESSAGE_COUNTER.get_or_create(&kind).inc();
            if entry.cancel {
                state.cancel_matching(&entry);
            } else {
                state.pending.push_back(WantRequest::new(entry));
            }
        }
    }

    /// Answers pending wants until none are left. Returns immediately when
    /// another call is already draining the queue.
    ///
    /// On failure every pending and in flight want is discarded. Messages
    /// already written stay written.
    pub async fn process(&self) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock();
            if state.draining {
                return Ok(());
            }
            state.draining = true;
        }
        // the future may be dropped mid-cycle
        let guard = scopeguard::guard((), |()| {
            let mut state = self.state.lock();
            for want in state.in_flight.drain(..) {
                want.cancel.cancel();
            }
            state.draining = false;
        });

        loop {
            if let Err(e) = self.drain_cycle().await {
                scopeguard::ScopeGuard::into_inner(guard);
                let mut state = self.state.lock();
                state.cancel_all();
                state.draining = false;
                metrics::DRAIN_FAILURES.inc();
                return Err(e);
            }
            let done = {
                let mut state = self.state.lock();
                state.in_flight.clear();
                if state.pending.is_empty() {
                    state.draining = false;
                    true
                } else {
                    false
                }
            };
            if done {
                scopeguard::ScopeGuard::into_inner(guard);
                return Ok(());
            }
        }
    }

    async fn drain_cycle(&self) -> anyhow::Result<()> {
        let wants = stream::poll_fn(|_| Poll::Ready(self.next_want()));
        let mut messages = std::pin::pin!(resolve_and_pack(
            self.store.clone(),
            wants,
            self.resolve_concurrency
        ));
        let Some(first) = messages.try_next().await? else {
            return Ok(());
        };

        let connection = self.connection.lock().clone();
        let stream = connection
            .new_stream()
            .await
            .context("failed to open outbound bitswap stream")?;
        let mut sink = frame_writer(stream);
        let sent = async {
            let mut next = Some(first);
            while let Some(message) = next {
                let bytes = Bytes::from(message.to_bytes()?);
                let len = bytes.len();
                debug!(
                    peer = %self.peer,
                    blocks = message.blocks().len(),
                    presences = message.block_presences().len(),
                    len,
                    "sending bitswap message"
                );
                sink.send(bytes)
                    .await
                    .context("failed to write bitswap message")?;
                record_sent(&message, len);
                next = messages.try_next().await?;
            }
            anyhow::Ok(())
        }
        .await;
        // closed whether or not every message made it out
        let closed = sink
            .close()
            .await
            .context("failed to close outbound bitswap stream");
        sent.and(closed)
    }

    fn next_want(&self) -> Option<WantRequest> {
        let mut state = self.state.lock();
        let want = state.pending.pop_front()?;
        state.in_flight.push(want.clone());
        Some(want)
    }

    /// Cancels and forgets every pending and in flight want.
    pub fn abort(&self) {
        self.state.lock().cancel_all();
    }

    /// Whether no drain cycle is running and nothing is pending.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        !state.draining && state.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Registers an inbound stream feeding this queue. Answers go out over
    /// the connection of the most recent one.
    pub fn stream_opened(&self, connection: C) {
        *self.connection.lock() = connection;
        self.inbound_streams.fetch_add(1, Ordering::SeqCst);
    }

    pub fn stream_closed(&self) {
        self.inbound_streams.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn inbound_streams(&self) -> usize {
        self.inbound_streams.load(Ordering::SeqCst)
    }
}

fn record_sent(message: &Message, len: usize) {
    metrics::OUTBOUND_MESSAGES.inc();
    metrics::OUTBOUND_BYTES.inc_by(len as u64);
    metrics::MESSAGE_COUNTER
        .get_or_create(&values::OUTBOUND_BLOCK)
        .inc_by(message.blocks().len() as u64);
    for presence in message.block_presences() {
        let kind = match presence.ty {
            BlockPresenceType::Have => values::OUTBOUND_HAVE,
            BlockPresenceType::DontHave => values::OUTBOUND_DONT_HAVE,
        };
        metrics::MESSAGE_COUNTER.get_or_create(&kind).inc();
    }
}
