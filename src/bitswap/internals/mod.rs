// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub(in crate::bitswap) mod codec;

/// Types generated from `proto/bitswap.proto` by the build script.
pub(in crate::bitswap) mod pb {
    include!(concat!(env!("OUT_DIR"), "/proto/mod.rs"));
}
