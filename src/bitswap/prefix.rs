// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::{Cid, Version};
use multihash_codetable::{Code, MultihashDigest as _};

/// Byte length of an encoded [`Prefix`].
pub const PREFIX_LEN: usize = 4;

/// Compact summary of a [`Cid`] that travels with block data instead of the
/// full CID: version, low byte of the codec, and the first two bytes of the
/// multihash (hash code and digest size for single-byte varints).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Prefix {
    pub version: u8,
    pub codec: u8,
    pub mh_code: u8,
    pub mh_size: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum PrefixError {
    #[error("invalid prefix length {0}, expected {PREFIX_LEN}")]
    InvalidLength(usize),
    #[error("unsupported multihash code {0:#x}")]
    UnsupportedHash(u8),
    #[error("digest size mismatch: prefix says {expected}, hasher produced {actual}")]
    DigestSize { expected: u8, actual: u8 },
    #[error(transparent)]
    Cid(#[from] cid::Error),
}

impl Prefix {
    pub fn new(bytes: &[u8]) -> Result<Self, PrefixError> {
        let [version, codec, mh_code, mh_size] =
            <[u8; PREFIX_LEN]>::try_from(bytes).map_err(|_| PrefixError::InvalidLength(bytes.len()))?;
        Ok(Self {
            version,
            codec,
            mh_code,
            mh_size,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        vec![self.version, self.codec, self.mh_code, self.mh_size]
    }

    /// Rebuilds the CID of `data` by hashing it with the hash function the
    /// prefix names.
    pub fn to_cid(&self, data: &[u8]) -> Result<Cid, PrefixError> {
        let code = Code::try_from(u64::from(self.mh_code))
            .map_err(|_| PrefixError::UnsupportedHash(self.mh_code))?;
        let hash = code.digest(data);
        if hash.size() != self.mh_size {
            return Err(PrefixError::DigestSize {
                expected: self.mh_size,
                actual: hash.size(),
            });
        }
        let version = Version::try_from(u64::from(self.version))?;
        Ok(Cid::new(version, u64::from(self.codec), hash)?)
    }
}

impl From<&Cid> for Prefix {
    fn from(cid: &Cid) -> Self {
        let mh = cid.hash().to_bytes();
        Self {
            version: u64::from(cid.version()) as u8,
            // low byte only, the codec table used on this wire is single-byte
            codec: cid.codec() as u8,
            mh_code: mh.first().copied().unwrap_or_default(),
            mh_size: mh.get(1).copied().unwrap_or_default(),
        }
    }
}
