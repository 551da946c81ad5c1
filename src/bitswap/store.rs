// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use async_trait::async_trait;
use cid::Cid;
use tokio_util::sync::CancellationToken;

/// Read access to the local content store that wants are answered from.
#[async_trait]
pub trait BitswapStoreRead: Send + Sync + 'static {
    /// A have query needs to know if the store contains the block.
    async fn contains(&self, cid: &Cid) -> anyhow::Result<bool>;

    /// A block query needs to retrieve the block from the store. `cancel`
    /// fires once the requester no longer wants the block, implementations
    /// may give up early when it does.
    async fn get(
        &self,
        cid: &Cid,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Vec<u8>>>;
}
