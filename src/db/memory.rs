// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::bitswap::BitswapStoreRead;
use ahash::HashMap;
use async_trait::async_trait;
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest as _};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Multicodec code of raw binary blocks.
pub const IPLD_RAW: u64 = 0x55;

#[derive(Debug, Default)]
pub struct MemoryDB {
    blocks: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl MemoryDB {
    pub fn put_keyed(&self, k: &Cid, block: &[u8]) -> anyhow::Result<()> {
        self.blocks.write().insert(*k, block.to_vec());
        Ok(())
    }

    /// Stores `data` as a raw block under its CIDv1 (sha2-256) and returns
    /// that CID.
    pub fn put_raw(&self, data: &[u8]) -> anyhow::Result<Cid> {
        let cid = Cid::new_v1(IPLD_RAW, Code::Sha2_256.digest(data));
        self.put_keyed(&cid, data)?;
        Ok(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

#[async_trait]
impl BitswapStoreRead for MemoryDB {
    async fn contains(&self, cid: &Cid) -> anyhow::Result<bool> {
        Ok(self.blocks.read().contains_key(cid))
    }

    async fn get(
        &self,
        cid: &Cid,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blocks.read().get(cid).cloned())
    }
}
