// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use protobuf_codegen::Customize;
use std::path::PathBuf;
use walkdir::WalkDir;

const PROTO_DIR: &str = "proto";
const CARGO_OUT_DIR: &str = "proto";

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed={PROTO_DIR}");

    protobuf_codegen::Codegen::new()
        .pure()
        .cargo_out_dir(CARGO_OUT_DIR)
        .inputs(proto_inputs().as_slice())
        .include(PROTO_DIR)
        .customize(Customize::default().gen_mod_rs(true).lite_runtime(true))
        .run()?;
    Ok(())
}

fn proto_inputs() -> Vec<PathBuf> {
    WalkDir::new(PROTO_DIR)
        .into_iter()
        .flatten()
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "proto"))
        .collect()
}
