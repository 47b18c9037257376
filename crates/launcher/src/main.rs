// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entrypoint of the remote transcode job.
//!
//! Runs as pid 1 inside the job pod: fetches the codec package from the
//! shim, bridges the pod-local PMS port back to the real server, then
//! runs the transcoder command and mirrors its exit code. Bridge
//! failures exit with 2 so they are distinguishable from transcoder
//! failures in the job's status.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use clap::Parser;
use kt_bridge::{package, tunnel};
use kt_core::{env::FFMPEG_EXTERNAL_LIBS, ffmpeg};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG: i32 = 1;
const EXIT_BRIDGE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "transcode-launcher", about = "Runs a Plex transcode inside a Kubernetes job")]
struct Args {
    /// Address the local PMS stand-in listens on. `:port` binds all
    /// interfaces.
    #[arg(long, default_value = ":32400")]
    listen: String,

    /// Routable host:port of the real PMS instance.
    #[arg(long)]
    pms_addr: Option<String>,

    /// URL of the codec package server on the PMS pod.
    #[arg(long, env = "CODEC_SERVER")]
    codec_server_url: Option<String>,

    /// Directory to unpack the codec package into.
    #[arg(long, env = "FFMPEG_EXTERNAL_LIBS")]
    codec_dir: Option<PathBuf>,

    /// Log level handed to the transcoder via -loglevel/-loglevel_plex.
    #[arg(long)]
    loglevel: Option<String>,

    /// The transcoder command, after `--`.
    #[arg(last = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.loglevel.as_deref());
    std::process::exit(run(args).await);
}

async fn run(args: Args) -> i32 {
    let Some(pms_addr) = args.pms_addr.filter(|a| !a.is_empty()) else {
        error!("--pms-addr is required");
        return EXIT_CONFIG;
    };
    let Some((program, rest)) = args.command.split_first() else {
        error!("no transcoder command given after --");
        return EXIT_CONFIG;
    };

    if let (Some(url), Some(dir)) = (&args.codec_server_url, &args.codec_dir) {
        info!(%url, dir = %dir.display(), "fetching codec package");
        if let Err(err) = package::fetch_package(dir, url).await {
            error!(%err, "codec package fetch failed");
            return EXIT_BRIDGE;
        }
        // The transcoder expects the variable in FFmpeg-escaped form.
        std::env::set_var(FFMPEG_EXTERNAL_LIBS, ffmpeg::escape(&dir.to_string_lossy()));
    }

    let listen = normalize_listen(&args.listen);
    let listener = match TcpListener::bind(&listen).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %listen, %err, "failed to bind tunnel listener");
            return EXIT_BRIDGE;
        }
    };
    info!(addr = %listen, upstream = %pms_addr, "tunnel listening");

    let cancel = CancellationToken::new();
    let mut tunnel = tokio::spawn(tunnel::serve(cancel.clone(), listener, pms_addr));

    let mut command = tokio::process::Command::new(program);
    if let Some(level) = &args.loglevel {
        command.args(["-loglevel", level, "-loglevel_plex", level]);
    }
    command.args(rest);

    info!(transcoder = %program, "starting transcoder");
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(transcoder = %program, %err, "failed to start transcoder");
            cancel.cancel();
            return EXIT_CONFIG;
        }
    };

    tokio::select! {
        result = &mut tunnel => {
            // The accept loop only returns early on failure; the
            // transcoder cannot reach PMS without it.
            error!(error = ?result, "tunnel stopped while transcoder was running");
            let _ = child.kill().await;
            EXIT_BRIDGE
        }
        status = child.wait() => {
            cancel.cancel();
            match status {
                Ok(status) => {
                    let code = status.code().unwrap_or(EXIT_CONFIG);
                    info!(code, "transcoder exited");
                    code
                }
                Err(err) => {
                    error!(%err, "failed to await transcoder");
                    EXIT_CONFIG
                }
            }
        }
    }
}

/// Accept Go-style `:port` listen addresses by binding all interfaces.
fn normalize_listen(listen: &str) -> String {
    match listen.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => listen.to_string(),
    }
}

fn init_tracing(loglevel: Option<&str>) {
    let default = loglevel.unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}
