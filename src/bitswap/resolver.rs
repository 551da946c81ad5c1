// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use futures::{Stream, StreamExt as _, TryStreamExt as _, future, stream};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::message::{
    Block, BlockOrPresence, BlockPresence, BlockPresenceType, Entry, Message, WantType,
};
use super::metrics::{self, values};
use super::store::BitswapStoreRead;

/// A queued want together with the token that cancels it.
#[derive(Clone, Debug)]
pub struct WantRequest {
    pub entry: Entry,
    pub cancel: CancellationToken,
}

impl WantRequest {
    pub fn new(entry: Entry) -> Self {
        Self {
            entry,
            cancel: CancellationToken::new(),
        }
    }
}

/// Looks up every non-cancel want against `store`, at most `concurrency` at
/// a time, yielding answers in completion order.
pub fn resolve_wants<S>(
    store: Arc<S>,
    wants: impl Stream<Item = WantRequest>,
    concurrency: usize,
) -> impl Stream<Item = anyhow::Result<BlockOrPresence>>
where
    S: BitswapStoreRead,
{
    wants
        .filter(|want| future::ready(!want.entry.cancel))
        .map(move |want| {
            let store = store.clone();
            async move { resolve_want(store.as_ref(), want).await }
        })
        .buffer_unordered(concurrency)
        .try_filter_map(future::ok)
}

async fn resolve_want<S: BitswapStoreRead>(
    store: &S,
    want: WantRequest,
) -> anyhow::Result<Option<BlockOrPresence>> {
    let WantRequest { entry, cancel } = want;
    if cancel.is_cancelled() {
        return Ok(None);
    }
    let lookup = async {
        match entry.want_type {
            WantType::Have => {
                let ty = if store.contains(&entry.cid).await? {
                    BlockPresenceType::Have
                } else {
                    BlockPresenceType::DontHave
                };
                anyhow::Ok(Some(BlockOrPresence::Presence(BlockPresence::new(
                    entry.cid, ty,
                ))))
            }
            WantType::Block => match store.get(&entry.cid, &cancel).await? {
                Some(data) => Ok(Some(BlockOrPresence::Block(Block::new(&entry.cid, data)))),
                None if entry.send_dont_have => Ok(Some(BlockOrPresence::Presence(
                    BlockPresence::dont_have(entry.cid),
                ))),
                None => Ok(None),
            },
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        // a failure caused by the cancellation is not a failure
        result = lookup => {
            if cancel.is_cancelled() { Ok(None) } else { result }
        }
    }
}

/// Greedily packs answers into messages under the size ceiling, flushing
/// whenever the next answer does not fit. Never yields an empty message and
/// stops at the first error.
pub fn pack_messages<St>(results: St) -> impl Stream<Item = anyhow::Result<Message>>
where
    St: Stream<Item = anyhow::Result<BlockOrPresence>>,
{
    stream::unfold(
        (Box::pin(results), Some(Message::new())),
        |(mut results, current)| async move {
            let mut message = current?;
            loop {
                match results.next().await {
                    Some(Ok(item)) => {
                        let Err(item) = message.add(item) else {
                            continue;
                        };
                        if message.is_empty() {
                            drop_oversized(&item);
                            continue;
                        }
                        let mut next = Message::new();
                        match next.add(item) {
                            Ok(()) => return Some((Ok(message), (results, Some(next)))),
                            Err(item) => drop_oversized(&item),
                        }
                    }
                    Some(Err(e)) => return Some((Err(e), (results, None))),
                    None if message.is_empty() => return None,
                    None => return Some((Ok(message), (results, None))),
                }
            }
        },
    )
}

fn drop_oversized(item: &BlockOrPresence) {
    metrics::MESSAGE_COUNTER
        .get_or_create(&values::DROPPED_OVERSIZED)
        .inc();
    match item {
        BlockOrPresence::Block(block) => warn!(
            size = block.data.len(),
            "dropping block that cannot fit in a bitswap message"
        ),
        BlockOrPresence::Presence(presence) => warn!(
            cid = %presence.cid,
            "dropping presence that cannot fit in a bitswap message"
        ),
    }
}

/// [`resolve_wants`] followed by [`pack_messages`].
pub fn resolve_and_pack<S>(
    store: Arc<S>,
    wants: impl Stream<Item = WantRequest>,
    concurrency: usize,
) -> impl Stream<Item = anyhow::Result<Message>>
where
    S: BitswapStoreRead,
{
    pack_messages(resolve_wants(store, wants, concurrency))
}
