// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::env::VarError;

use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

use crate::cli_shared::cli::CliOpts;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber: stdout always, plus an hourly rotated
/// `miniswap.log` when `--log-dir` is set.
pub fn setup_logger(opts: &CliOpts) {
    let mut layers = vec![fmt_layer(opts.log_json, std::io::stdout, true)];
    if let Some(log_dir) = &opts.log_dir {
        let appender = tracing_appender::rolling::hourly(log_dir, "miniswap.log");
        layers.push(fmt_layer(opts.log_json, appender, false));
    }
    tracing_subscriber::registry().with(layers).init();
}

fn fmt_layer<W>(json: bool, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    if json {
        layer.json().with_filter(env_filter()).boxed()
    } else {
        layer.with_filter(env_filter()).boxed()
    }
}

/// `RUST_LOG` when set, otherwise [`DEFAULT_DIRECTIVES`]. A non-unicode
/// `RUST_LOG` falls back to the subscriber's own default.
fn env_filter() -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => EnvFilter::new(directives),
        Err(VarError::NotPresent) => EnvFilter::new(DEFAULT_DIRECTIVES.join(",")),
        Err(VarError::NotUnicode(_)) => EnvFilter::default(),
    }
}

const DEFAULT_DIRECTIVES: [&str; 7] = [
    "info",
    "axum=warn",
    "libp2p_swarm=warn",
    "libp2p_tcp=warn",
    "libp2p_noise=warn",
    "multistream_select=warn",
    "yamux=warn",
];
