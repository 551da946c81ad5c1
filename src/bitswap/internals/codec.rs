// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use unsigned_varint::codec::UviBytes;

use crate::bitswap::message::MAX_MESSAGE_SIZE;

/// Splits an inbound stream into unsigned-varint length-prefixed frames. A
/// frame header declaring more than `max_len` bytes fails the stream.
pub fn frame_reader<R: AsyncRead>(io: R, max_len: usize) -> FramedRead<R, UviBytes> {
    let mut codec = UviBytes::default();
    codec.set_max_len(max_len);
    FramedRead::new(io, codec)
}

/// Writes each message as one unsigned-varint length-prefixed frame.
pub fn frame_writer<W: AsyncWrite>(io: W) -> FramedWrite<W, UviBytes<Bytes>> {
    let mut codec = UviBytes::default();
    codec.set_max_len(MAX_MESSAGE_SIZE);
    FramedWrite::new(io, codec)
}
