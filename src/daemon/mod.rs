// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod main;

use crate::bitswap::{Block, Message, Miniswap};
use crate::cli_shared::cli::{CliOpts, Config};
use crate::db::MemoryDB;
use crate::libp2p::{Keypair, build_swarm, run_swarm, serve, start_listening};
use anyhow::Context as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Imports `imports` into memory and serves them over bitswap until Ctrl-C.
pub async fn start(opts: CliOpts, config: Config, imports: Vec<PathBuf>) -> anyhow::Result<()> {
    let db = Arc::new(MemoryDB::default());
    for path in &imports {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to import {}", path.display()))?;
        let cid = db.put_raw(&data)?;
        info!("Imported {} as {cid} ({} bytes)", path.display(), data.len());
        if Message::new().add_block(Block::new(&cid, data)).is_err() {
            warn!("{cid} is too large to ever fit in a bitswap message");
        }
    }

    if let Some(metrics_address) = opts.metrics_address {
        let listener = tokio::net::TcpListener::bind(metrics_address)
            .await
            .with_context(|| format!("could not bind to {metrics_address}"))?;
        info!("Prometheus server started at {metrics_address}");
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::init_prometheus(listener).await {
                warn!("Prometheus server failed: {e:#}");
            }
        });
    }

    let miniswap = Miniswap::new(db, config.bitswap)?;
    let mut swarm = build_swarm(Keypair::generate_ed25519(), &config.network)?;
    info!("p2p network peer id: {}", swarm.local_peer_id());
    start_listening(&mut swarm, &config.network.listen_addresses).await?;

    let server = tokio::spawn(serve(miniswap, swarm.behaviour().new_control()));
    run_swarm(swarm, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;
    server.abort();
    Ok(())
}
