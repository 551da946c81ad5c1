// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use protobuf::{EnumOrUnknown, Message as _, MessageField};

use super::internals::pb::bitswap::{self as pb, message as pb_message};
use super::prefix::{Prefix, PrefixError};

use pb_message::wantlist as pb_wantlist;

/// Hard ceiling of a single encoded message.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Highest priority an [`Entry`] can carry.
pub const MAX_PRIORITY: i32 = i32::MAX;

// Added once either blocks or presences are non empty:
// - 2 for the varints declaring the new embedded messages
// - 8 (4 x 2) for the varints declaring their payload length in a 4 MiB message
const NON_EMPTY_OVERHEAD: usize = 2 + 8;

// Added by a new block on top of its data:
// - 1 for the varint declaring the embedded message
// - 1 for the varint declaring the prefix field
// - 4 for the varint declaring the data length in a 4 MiB message
// - 4 for the prefix itself
const NEW_BLOCK_OVERHEAD: usize = 1 + 1 + 4 + 4;

// Added by a new presence on top of its CID:
// - 1 for the varint declaring the embedded message
// - 1 for the varint declaring the cid field
// - 1 for the varint declaring the type field
// - 1 for the type value
const NEW_PRESENCE_OVERHEAD: usize = 1 + 1 + 1 + 1;

/// The size estimate undercounts in pathological cases, every projection is
/// scaled up by this margin before comparing against [`MAX_MESSAGE_SIZE`].
const ESTIMATION_MARGIN: f64 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid protobuf message: {0}")]
    Protobuf(#[from] protobuf::Error),
    #[error("invalid cid: {0}")]
    Cid(#[from] cid::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WantType {
    #[default]
    Block,
    Have,
}

impl From<EnumOrUnknown<pb_wantlist::WantType>> for WantType {
    // unknown values fall back to the proto default
    fn from(ty: EnumOrUnknown<pb_wantlist::WantType>) -> Self {
        match ty.enum_value_or_default() {
            pb_wantlist::WantType::Block => Self::Block,
            pb_wantlist::WantType::Have => Self::Have,
        }
    }
}

impl From<WantType> for pb_wantlist::WantType {
    fn from(ty: WantType) -> Self {
        match ty {
            WantType::Block => Self::Block,
            WantType::Have => Self::Have,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockPresenceType {
    #[default]
    Have,
    DontHave,
}

impl From<EnumOrUnknown<pb_message::BlockPresenceType>> for BlockPresenceType {
    fn from(ty: EnumOrUnknown<pb_message::BlockPresenceType>) -> Self {
        match ty.enum_value_or_default() {
            pb_message::BlockPresenceType::Have => Self::Have,
            pb_message::BlockPresenceType::DontHave => Self::DontHave,
        }
    }
}

impl From<BlockPresenceType> for pb_message::BlockPresenceType {
    fn from(ty: BlockPresenceType) -> Self {
        match ty {
            BlockPresenceType::Have => Self::Have,
            BlockPresenceType::DontHave => Self::DontHave,
        }
    }
}

/// One line of a wantlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub cid: Cid,
    pub priority: i32,
    pub cancel: bool,
    pub want_type: WantType,
    pub send_dont_have: bool,
}

impl Entry {
    /// Priorities below 1 are raised to 1.
    pub fn new(
        cid: Cid,
        priority: i32,
        cancel: bool,
        want_type: WantType,
        send_dont_have: bool,
    ) -> Self {
        Self {
            cid,
            priority: priority.clamp(1, MAX_PRIORITY),
            cancel,
            want_type,
            send_dont_have,
        }
    }

    pub fn new_block(cid: Cid) -> Self {
        Self::new(cid, 1, false, WantType::Block, false)
    }

    pub fn new_have(cid: Cid) -> Self {
        Self::new(cid, 1, false, WantType::Have, false)
    }

    pub fn new_cancel(cid: Cid, want_type: WantType) -> Self {
        Self::new(cid, 1, true, want_type, false)
    }

    pub fn send_dont_have(mut self, b: bool) -> Self {
        self.send_dont_have = b;
        self
    }

    /// Whether `self` and `other` want the same thing. Only the hash digest is
    /// compared, so the same content under another codec or CID version
    /// matches.
    pub fn same_target(&self, other: &Entry) -> bool {
        self.want_type == other.want_type && self.cid.hash().digest() == other.cid.hash().digest()
    }

    fn from_pb(raw: pb_wantlist::Entry) -> Result<Self, DecodeError> {
        let cid = Cid::try_from(raw.block.as_slice())?;
        Ok(Self::new(
            cid,
            raw.priority,
            raw.cancel,
            raw.wantType.into(),
            raw.sendDontHave,
        ))
    }

    fn to_pb(&self) -> pb_wantlist::Entry {
        pb_wantlist::Entry {
            block: self.cid.to_bytes(),
            priority: self.priority,
            cancel: self.cancel,
            wantType: EnumOrUnknown::new(self.want_type.into()),
            sendDontHave: self.send_dont_have,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Wantlist {
    pub entries: Vec<Entry>,
    /// Whether this is the complete list rather than a delta.
    pub full: bool,
}

impl Wantlist {
    fn from_pb(raw: pb_message::Wantlist) -> Result<Self, DecodeError> {
        Ok(Self {
            entries: raw
                .entries
                .into_iter()
                .map(Entry::from_pb)
                .collect::<Result<_, _>>()?,
            full: raw.full,
        })
    }

    fn to_pb(&self) -> Option<pb_message::Wantlist> {
        if self.entries.is_empty() && !self.full {
            return None;
        }
        Some(pb_message::Wantlist {
            entries: self.entries.iter().map(Entry::to_pb).collect(),
            full: self.full,
            ..Default::default()
        })
    }
}

/// Block data together with the encoded [`Prefix`] of its CID.
///
/// Received prefixes are kept as raw bytes and only parsed on demand, a
/// prefix this node cannot interpret does not invalidate the rest of the
/// message carrying it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub prefix: Vec<u8>,
    pub data: Vec<u8>,
}

impl Block {
    pub fn new(cid: &Cid, data: Vec<u8>) -> Self {
        Self {
            prefix: Prefix::from(cid).to_bytes(),
            data,
        }
    }

    pub fn prefix(&self) -> Result<Prefix, PrefixError> {
        Prefix::new(&self.prefix)
    }

    /// Rebuilds the CID of this block from its prefix and data.
    pub fn cid(&self) -> Result<Cid, PrefixError> {
        self.prefix()?.to_cid(&self.data)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPresence {
    pub cid: Cid,
    pub ty: BlockPresenceType,
}

impl BlockPresence {
    pub fn new(cid: Cid, ty: BlockPresenceType) -> Self {
        Self { cid, ty }
    }

    pub fn have(cid: Cid) -> Self {
        Self::new(cid, BlockPresenceType::Have)
    }

    pub fn dont_have(cid: Cid) -> Self {
        Self::new(cid, BlockPresenceType::DontHave)
    }
}

/// A resolved want: either the content itself or a statement about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockOrPresence {
    Block(Block),
    Presence(BlockPresence),
}

/// The `bitswap` wire envelope.
///
/// Blocks and presences are added through [`Message::add_block`] and
/// [`Message::add_block_presence`], which keep a running estimate of the
/// encoded length instead of re-encoding on every addition. The estimate is
/// conservative, a rejected element means the message may be full, never that
/// an accepted one overflowed [`MAX_MESSAGE_SIZE`]. The price is the occasional
/// message flushed earlier than strictly needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub wantlist: Wantlist,
    blocks: Vec<Block>,
    block_presences: Vec<BlockPresence>,
    pending_bytes: i32,
    estimated_length: usize,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    pub fn new() -> Self {
        Self::from_parts(Wantlist::default(), vec![], vec![], 0)
    }

    pub fn with_wantlist(wantlist: Wantlist) -> Self {
        Self::from_parts(wantlist, vec![], vec![], 0)
    }

    fn from_parts(
        wantlist: Wantlist,
        blocks: Vec<Block>,
        block_presences: Vec<BlockPresence>,
        pending_bytes: i32,
    ) -> Self {
        let mut message = Self {
            wantlist,
            blocks,
            block_presences,
            pending_bytes: pending_bytes.max(0),
            estimated_length: 0,
        };
        message.estimated_length = message.encoded_len() + NON_EMPTY_OVERHEAD;
        message
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_presences(&self) -> &[BlockPresence] {
        &self.block_presences
    }

    pub fn pending_bytes(&self) -> i32 {
        self.pending_bytes
    }

    /// Negative values are stored as zero.
    pub fn set_pending_bytes(&mut self, pending_bytes: i32) {
        self.pending_bytes = pending_bytes.max(0);
    }

    pub fn estimated_length(&self) -> usize {
        self.estimated_length
    }

    /// Whether the message carries neither blocks nor presences.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.block_presences.is_empty()
    }

    /// Appends `block` if the message stays under [`MAX_MESSAGE_SIZE`],
    /// otherwise hands it back.
    pub fn add_block(&mut self, block: Block) -> Result<(), Block> {
        let size = NEW_BLOCK_OVERHEAD + block.data.len();
        if self.estimate_new_size_after(size) > MAX_MESSAGE_SIZE as f64 {
            return Err(block);
        }
        self.blocks.push(block);
        self.estimated_length += size;
        Ok(())
    }

    /// Appends `presence` if the message stays under [`MAX_MESSAGE_SIZE`],
    /// otherwise hands it back.
    pub fn add_block_presence(&mut self, presence: BlockPresence) -> Result<(), BlockPresence> {
        let size = NEW_PRESENCE_OVERHEAD + presence.cid.encoded_len();
        if self.estimate_new_size_after(size) > MAX_MESSAGE_SIZE as f64 {
            return Err(presence);
        }
        self.block_presences.push(presence);
        self.estimated_length += size;
        Ok(())
    }

    pub fn add(&mut self, item: BlockOrPresence) -> Result<(), BlockOrPresence> {
        match item {
            BlockOrPresence::Block(block) => self.add_block(block).map_err(BlockOrPresence::Block),
            BlockOrPresence::Presence(presence) => self
                .add_block_presence(presence)
                .map_err(BlockOrPresence::Presence),
        }
    }

    fn estimate_new_size_after(&self, element_size: usize) -> f64 {
        (self.estimated_length + element_size) as f64 * (1.0 + ESTIMATION_MARGIN)
    }

    pub fn encoded_len(&self) -> usize {
        self.to_pb().compute_size() as usize
    }

    pub fn to_bytes(&self) -> protobuf::Result<Vec<u8>> {
        self.to_pb().write_to_bytes()
    }

    /// Decodes a message. Legacy `blocks` without a prefix are skipped, block
    /// prefixes are taken as is.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw = pb::Message::parse_from_bytes(bytes)?;
        let wantlist = raw
            .wantlist
            .into_option()
            .map(Wantlist::from_pb)
            .transpose()?
            .unwrap_or_default();
        let blocks = raw
            .payload
            .into_iter()
            .map(|b| Block {
                prefix: b.prefix,
                data: b.data,
            })
            .collect();
        let block_presences = raw
            .blockPresences
            .into_iter()
            .map(|p| -> Result<BlockPresence, DecodeError> {
                Ok(BlockPresence {
                    cid: Cid::try_from(p.cid.as_slice())?,
                    ty: p.type_.into(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self::from_parts(
            wantlist,
            blocks,
            block_presences,
            raw.pendingBytes,
        ))
    }

    fn to_pb(&self) -> pb::Message {
        pb::Message {
            wantlist: MessageField::from_option(self.wantlist.to_pb()),
            payload: self
                .blocks
                .iter()
                .map(|b| pb_message::Block {
                    prefix: b.prefix.clone(),
                    data: b.data.clone(),
                    ..Default::default()
                })
                .collect(),
            blockPresences: self
                .block_presences
                .iter()
                .map(|p| pb_message::BlockPresence {
                    cid: p.cid.to_bytes(),
                    type_: EnumOrUnknown::new(p.ty.into()),
                    ..Default::default()
                })
                .collect(),
            pendingBytes: self.pending_bytes,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::raw_cid;
    use quickcheck_macros::quickcheck;

    fn block_of(len: usize, seed: usize) -> (Cid, Block) {
        let data = vec![seed as u8; len];
        let cid = raw_cid(&format!("{seed}-{len}").into_bytes());
        (cid, Block::new(&cid, data))
    }

    /// Greedily packs `items` the way the resolver does.
    fn pack(items: Vec<BlockOrPresence>) -> Vec<Message> {
        let mut messages = vec![];
        let mut message = Message::new();
        for item in items {
            if let Err(item) = message.add(item) {
                messages.push(std::mem::take(&mut message));
                message.add(item).unwrap();
            }
        }
        if !message.is_empty() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn entry_normalizes_priority() {
        let cid = raw_cid(b"a");
        assert_eq!(Entry::new(cid, 0, false, WantType::Block, false).priority, 1);
        assert_eq!(Entry::new(cid, -5, false, WantType::Block, false).priority, 1);
        assert_eq!(Entry::new(cid, 7, false, WantType::Block, false).priority, 7);
        assert_eq!(
            Entry::new(cid, i32::MAX, false, WantType::Block, false).priority,
            MAX_PRIORITY
        );
    }

    #[test]
    fn same_target_compares_digest_only() {
        let cid = raw_cid(b"content");
        let as_cbor = Cid::new_v1(crate::test_utils::DAG_CBOR, *cid.hash());
        assert!(Entry::new_block(cid).same_target(&Entry::new_cancel(as_cbor, WantType::Block)));
        assert!(!Entry::new_block(cid).same_target(&Entry::new_cancel(cid, WantType::Have)));
        assert!(!Entry::new_block(cid).same_target(&Entry::new_block(raw_cid(b"other"))));
    }

    #[test]
    fn decode_normalizes_unknown_want_type() {
        let cid = raw_cid(b"unknown want type").to_bytes();
        let mut entry = vec![0x0a, cid.len() as u8];
        entry.extend_from_slice(&cid);
        // wantType = 7, priority = -3
        entry.extend_from_slice(&[0x20, 0x07]);
        entry.extend_from_slice(&[0x10, 0xfd, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        let mut wantlist = vec![0x0a, entry.len() as u8];
        wantlist.extend_from_slice(&entry);
        let mut bytes = vec![0x0a, wantlist.len() as u8];
        bytes.extend_from_slice(&wantlist);

        let message = Message::from_bytes(&bytes).unwrap();
        let entry = &message.wantlist.entries[0];
        assert_eq!(entry.want_type, WantType::Block);
        assert_eq!(entry.priority, 1);
        assert!(!entry.cancel);
        assert!(!entry.send_dont_have);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Message::from_bytes(&[0x0a, 0x05, 0x0a]),
            Err(DecodeError::Protobuf(_))
        ));
        // a wantlist entry whose block field is not a cid
        let bytes = [0x0a, 0x05, 0x0a, 0x03, 0x0a, 0x01, 0xff];
        assert!(matches!(Message::from_bytes(&bytes), Err(DecodeError::Cid(_))));
    }

    #[test]
    fn message_roundtrip() {
        let mut message = Message::with_wantlist(Wantlist {
            entries: vec![
                Entry::new_block(raw_cid(b"w1")).send_dont_have(true),
                Entry::new_have(raw_cid(b"w2")),
                Entry::new_cancel(raw_cid(b"w3"), WantType::Have),
            ],
            full: true,
        });
        for i in 0..5 {
            message.add_block(block_of(100 * i, i).1).unwrap();
        }
        for i in 0..3 {
            let cid = raw_cid(&[i]);
            let presence = if i % 2 == 0 {
                BlockPresence::have(cid)
            } else {
                BlockPresence::dont_have(cid)
            };
            message.add_block_presence(presence).unwrap();
        }
        message.set_pending_bytes(1024);

        let decoded = Message::from_bytes(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.wantlist, message.wantlist);
        assert_eq!(decoded.blocks(), message.blocks());
        assert_eq!(decoded.block_presences(), message.block_presences());
        assert_eq!(decoded.pending_bytes(), 1024);
    }

    #[test]
    fn decoded_block_rebuilds_cid() {
        let data = b"hello bitswap".to_vec();
        let cid = raw_cid(&data);
        let mut message = Message::new();
        message.add_block(Block::new(&cid, data)).unwrap();
        let decoded = Message::from_bytes(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.blocks()[0].cid().unwrap(), cid);
    }

    #[test]
    fn decode_keeps_unparsed_prefix() {
        let want = Entry::new_block(raw_cid(b"wanted"));
        let mut message = Message::with_wantlist(Wantlist {
            entries: vec![want.clone()],
            full: false,
        });
        let prefix = vec![0x01, 0xa9, 0x02, 0x12, 0x20];
        message
            .add_block(Block {
                prefix: prefix.clone(),
                data: b"{}".to_vec(),
            })
            .unwrap();

        let decoded = Message::from_bytes(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.wantlist.entries, vec![want]);
        assert_eq!(decoded.blocks()[0].prefix, prefix);
        assert!(matches!(
            decoded.blocks()[0].cid(),
            Err(PrefixError::InvalidLength(5))
        ));
    }

    #[test]
    fn pending_bytes_is_never_negative() {
        let mut message = Message::new();
        message.set_pending_bytes(-10);
        assert_eq!(message.pending_bytes(), 0);
    }

    #[test]
    fn empty_message_encodes_to_nothing() {
        let message = Message::new();
        assert!(message.is_empty());
        assert_eq!(message.to_bytes().unwrap(), Vec::<u8>::new());
        assert_eq!(message.estimated_length(), NON_EMPTY_OVERHEAD);
    }

    #[test]
    fn large_blocks_are_split() {
        const MIB: usize = 1024 * 1024;
        let items = (0..7)
            .map(|i| BlockOrPresence::Block(block_of(MIB, i).1))
            .collect::<Vec<_>>();
        let messages = pack(items);
        assert_eq!(
            messages.iter().map(|m| m.blocks().len()).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        for message in messages {
            assert!(message.to_bytes().unwrap().len() <= MAX_MESSAGE_SIZE);
        }
    }

    #[test]
    fn oversized_block_is_rejected_by_empty_message() {
        let mut message = Message::new();
        let (_, block) = block_of(MAX_MESSAGE_SIZE - 1024, 0);
        assert!(message.add_block(block).is_err());
        assert!(message.is_empty());
    }

    #[quickcheck]
    fn packing_is_conservative(block_sizes: Vec<u8>, presences: u8) -> bool {
        // up to ~3 MiB per block so messages actually fill up
        let mut items = block_sizes
            .iter()
            .take(12)
            .enumerate()
            .map(|(i, &size)| BlockOrPresence::Block(block_of(usize::from(size) * 12 * 1024, i).1))
            .collect::<Vec<_>>();
        items.extend((0..presences).map(|i| {
            BlockOrPresence::Presence(BlockPresence::dont_have(raw_cid(&[i, 0xbb])))
        }));
        let total = items.len();

        let messages = pack(items);
        let packed = messages
            .iter()
            .map(|m| m.blocks().len() + m.block_presences().len())
            .sum::<usize>();
        packed == total
            && messages.iter().all(|m| {
                let encoded = m.to_bytes().unwrap().len();
                encoded <= MAX_MESSAGE_SIZE
                    && encoded as f64 <= m.estimated_length() as f64 * (1.0 + ESTIMATION_MARGIN)
            })
    }
}
