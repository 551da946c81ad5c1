// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::LazyLock;

use prometheus_client::metrics::{counter::Counter, family::Family, gauge::Gauge};

use crate::metrics::{KindLabel, default_registry};

pub static MESSAGE_COUNTER: LazyLock<Family<KindLabel, Counter>> = LazyLock::new(|| {
    let metric = Family::default();
    default_registry().register(
        "bitswap_message_count",
        "Number of bitswap entries received and answered, by kind",
        metric.clone(),
    );
    metric
});

pub static OUTBOUND_MESSAGES: LazyLock<Counter> = LazyLock::new(|| {
    let metric = Counter::default();
    default_registry().register(
        "bitswap_outbound_messages",
        "Number of bitswap messages written to peers",
        metric.clone(),
    );
    metric
});

pub static OUTBOUND_BYTES: LazyLock<Counter> = LazyLock::new(|| {
    let metric = Counter::default();
    default_registry().register(
        "bitswap_outbound_bytes",
        "Encoded bytes of bitswap messages written to peers",
        metric.clone(),
    );
    metric
});

pub static INBOUND_BYTES: LazyLock<Counter> = LazyLock::new(|| {
    let metric = Counter::default();
    default_registry().register(
        "bitswap_inbound_bytes",
        "Bytes of bitswap frames read from peers",
        metric.clone(),
    );
    metric
});

pub static DRAIN_FAILURES: LazyLock<Counter> = LazyLock::new(|| {
    let metric = Counter::default();
    default_registry().register(
        "bitswap_drain_failures",
        "Number of want queue drain cycles that failed",
        metric.clone(),
    );
    metric
});

pub static PEER_QUEUES: LazyLock<Gauge> = LazyLock::new(|| {
    let metric = Gauge::default();
    default_registry().register(
        "bitswap_peer_queues",
        "Number of peers with a registered want queue",
        metric.clone(),
    );
    metric
});

pub mod values {
    use crate::metrics::KindLabel;

    pub const INBOUND_WANT_BLOCK: KindLabel = KindLabel::new("inbound_want_block");
    pub const INBOUND_WANT_HAVE: KindLabel = KindLabel::new("inbound_want_have");
    pub const INBOUND_CANCEL: KindLabel = KindLabel::new("inbound_cancel");
    pub const OUTBOUND_BLOCK: KindLabel = KindLabel::new("outbound_block");
    pub const OUTBOUND_HAVE: KindLabel = KindLabel::new("outbound_have");
    pub const OUTBOUND_DONT_HAVE: KindLabel = KindLabel::new("outbound_dont_have");
    /// Blocks or presences too large to fit even in an empty message.
    pub const DROPPED_OVERSIZED: KindLabel = KindLabel::new("dropped_oversized");
}
