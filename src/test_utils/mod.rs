// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use ahash::{HashMap, HashSet};
use async_trait::async_trait;
use cid::Cid;
use libp2p::PeerId;
use multihash_codetable::{Code, MultihashDigest as _};
use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::bitswap::{BitswapConnection, BitswapStoreRead, Entry, Message, Wantlist};

pub const RAW: u64 = 0x55;
pub const DAG_CBOR: u64 = 0x71;

pub fn raw_cid(data: &[u8]) -> Cid {
    Cid::new_v1(RAW, Code::Sha2_256.digest(data))
}

pub fn wants(entries: Vec<Entry>) -> Message {
    Message::with_wantlist(Wantlist {
        entries,
        full: false,
    })
}

/// Length-prefixes every message the way a remote peer would.
pub fn encode_frames(messages: &[Message]) -> Vec<u8> {
    let mut out = vec![];
    for message in messages {
        let bytes = message.to_bytes().unwrap();
        let mut len_buf = unsigned_varint::encode::usize_buffer();
        out.extend_from_slice(unsigned_varint::encode::usize(bytes.len(), &mut len_buf));
        out.extend_from_slice(&bytes);
    }
    out
}

pub fn decode_frames(mut bytes: &[u8]) -> Vec<Message> {
    let mut messages = vec![];
    while !bytes.is_empty() {
        let (len, rest) = unsigned_varint::decode::usize(bytes).unwrap();
        messages.push(Message::from_bytes(&rest[..len]).unwrap());
        bytes = &rest[len..];
    }
    messages
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Connection whose outbound streams write into memory.
#[derive(Clone)]
pub struct CaptureConnection {
    peer: PeerId,
    inner: Arc<CaptureInner>,
}

#[derive(Default)]
struct CaptureInner {
    streams: Mutex<Vec<Arc<Mutex<Vec<u8>>>>>,
    fail_open: AtomicBool,
    fail_write: AtomicBool,
    closed: AtomicUsize,
}

impl CaptureConnection {
    pub fn new() -> Self {
        Self {
            peer: PeerId::random(),
            inner: Default::default(),
        }
    }

    /// Number of outbound streams opened so far.
    pub fn opened(&self) -> usize {
        self.inner.streams.lock().len()
    }

    /// Number of outbound streams shut down so far.
    pub fn closed(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.inner.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Messages written so far, per stream in opening order.
    pub fn messages_per_stream(&self) -> Vec<Vec<Message>> {
        self.inner
            .streams
            .lock()
            .iter()
            .map(|buf| decode_frames(&buf.lock()))
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<Message> {
        self.messages_per_stream().into_iter().flatten().collect()
    }
}

#[async_trait]
impl BitswapConnection for CaptureConnection {
    type Stream = CaptureStream;

    fn remote_peer(&self) -> PeerId {
        self.peer
    }

    async fn new_stream(&self) -> anyhow::Result<Self::Stream> {
        anyhow::ensure!(
            !self.inner.fail_open.load(Ordering::SeqCst),
            "stream refused"
        );
        let buf = Arc::new(Mutex::new(vec![]));
        self.inner.streams.lock().push(buf.clone());
        Ok(CaptureStream {
            buf,
            fail: self.inner.fail_write.load(Ordering::SeqCst),
            connection: self.inner.clone(),
        })
    }
}

pub struct CaptureStream {
    buf: Arc<Mutex<Vec<u8>>>,
    fail: bool,
    connection: Arc<CaptureInner>,
}

impl AsyncWrite for CaptureStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        self.buf.lock().extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.connection.closed.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// In-memory store with scriptable failures, stalls and latency, counting
/// the lookups made against it.
#[derive(Default)]
pub struct ScriptedStore {
    blocks: Mutex<HashMap<Cid, Vec<u8>>>,
    stalled: Mutex<HashSet<Cid>>,
    failing: Mutex<HashSet<Cid>>,
    latency: Option<Duration>,
    lookups: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    /// Notified when a lookup of a stalled CID starts waiting.
    pub stall_started: Notify,
}

impl ScriptedStore {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    pub fn insert(&self, data: &[u8]) -> Cid {
        let cid = raw_cid(data);
        self.blocks.lock().insert(cid, data.to_vec());
        cid
    }

    /// `get` of `cid` waits for its cancellation, then fails.
    pub fn stall(&self, cid: Cid) {
        self.stalled.lock().insert(cid);
    }

    pub fn fail(&self, cid: Cid) {
        self.failing.lock().insert(cid);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Highest number of lookups observed running at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn enter(&self, cid: &Cid) -> anyhow::Result<ActiveLookup<'_>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let probe = ActiveLookup(&self.active);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let failing = self.failing.lock().contains(cid);
        anyhow::ensure!(!failing, "scripted failure for {cid}");
        Ok(probe)
    }
}

struct ActiveLookup<'a>(&'a AtomicUsize);

impl Drop for ActiveLookup<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BitswapStoreRead for ScriptedStore {
    async fn contains(&self, cid: &Cid) -> anyhow::Result<bool> {
        let _probe = self.enter(cid).await?;
        Ok(self.blocks.lock().contains_key(cid))
    }

    async fn get(
        &self,
        cid: &Cid,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let _probe = self.enter(cid).await?;
        let stalled = self.stalled.lock().contains(cid);
        if stalled {
            self.stall_started.notify_one();
            cancel.cancelled().await;
            anyhow::bail!("lookup of {cid} aborted");
        }
        Ok(self.blocks.lock().get(cid).cloned())
    }
}
