// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drop-in replacement for the Plex transcoder binary.
//!
//! PMS launches this in place of `Plex Transcoder`; instead of running
//! the transcode locally it creates a Kubernetes Job on the cluster and
//! mirrors its outcome. Codecs requiring the EAE sidecar cannot run
//! remotely, so those invocations fall through to the original binary
//! kept next to the shim with an `.orig` suffix.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod exit_error;
mod session;
mod supervisor;

use std::os::unix::process::CommandExt;
use std::process::Command;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if kt_core::needs_bypass(&args) {
        let err = exec_original(&args);
        eprintln!("kube-transcode: failed to exec original transcoder: {err}");
        std::process::exit(1);
    }

    let protection = match supervisor::ensure_protected() {
        Ok(protection) => protection,
        Err(err) => {
            eprintln!("kube-transcode: {err}");
            std::process::exit(err.code);
        }
    };

    init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("kube-transcode: failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    let code = match runtime.block_on(session::run(protection)) {
        Ok(()) => 0,
        Err(err) => {
            error!(%err, "transcode offload failed");
            err.code
        }
    };
    std::process::exit(code);
}

/// Replace this process with the original transcoder. Returns only if
/// the exec itself failed.
fn exec_original(args: &[String]) -> std::io::Error {
    let argv0 = args.first().map(String::as_str).unwrap_or_default();
    Command::new(format!("{argv0}.orig")).args(args.iter().skip(1)).exec()
}

fn init_tracing() {
    // Stdout belongs to PMS; keep all diagnostics on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}
