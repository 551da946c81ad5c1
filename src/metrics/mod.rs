// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use parking_lot::{RwLock, RwLockWriteGuard};
use prometheus_client::{encoding::EncodeLabelSet, registry::Registry};
use std::sync::LazyLock;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tracing::warn;

static DEFAULT_REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(Default::default);

pub fn default_registry<'a>() -> RwLockWriteGuard<'a, Registry> {
    DEFAULT_REGISTRY.write()
}

/// Serves the default registry in the text exposition format on `/metrics`.
pub async fn init_prometheus(prometheus_listener: TcpListener) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(collect_prometheus_metrics))
        .layer(CompressionLayer::new());

    Ok(axum::serve(prometheus_listener, app.into_make_service()).await?)
}

async fn collect_prometheus_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        encode_metrics(),
    )
}

fn encode_metrics() -> String {
    let mut metrics = String::new();
    if let Err(e) =
        prometheus_client::encoding::text::encode_registry(&mut metrics, &DEFAULT_REGISTRY.read())
    {
        warn!("failed to encode the default metrics registry: {e}");
    };
    if let Err(e) = prometheus_client::encoding::text::encode_eof(&mut metrics) {
        warn!("failed to encode metrics eof {e}");
    };
    metrics
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet, derive_more::Constructor)]
pub struct KindLabel {
    kind: &'static str,
}
