// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One offloaded transcode session, start to finish: resolve the PMS
//! pod, optionally stand up the codec package server, create the Job,
//! wait for it, and always delete it afterwards.

use crate::exit_error::ExitError;
use crate::supervisor::{self, Protection};
use k8s_openapi::api::batch::v1::Job;
use kt_bridge::package;
use kt_core::{env::FFMPEG_EXTERNAL_LIBS, ffmpeg, Rewriter};
use kt_offload::{build_job, delete_job, wait_for_completion, Overrides, PmsMetadata, WaitError};
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(protection: Protection) -> Result<(), ExitError> {
    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone())?;
    if let Protection::Supervised { parent } = protection {
        tokio::spawn(supervisor::watch_parent(parent, cancel.clone()));
    }

    let pod_name = std::env::var("POD_NAME").unwrap_or_default();
    let pod_namespace = std::env::var("POD_NAMESPACE").unwrap_or_default();

    let client = Client::try_default()
        .await
        .map_err(|err| ExitError::config(format!("failed to build Kubernetes client: {err}")))?;

    let overrides = Overrides::from_env();
    let mut meta = PmsMetadata::fetch(client.clone(), &pod_name, &pod_namespace, &overrides)
        .await
        .map_err(|err| ExitError::config(err.to_string()))?;

    if let Some(dir) = codec_dir() {
        meta.codec_port = Some(spawn_codec_server(dir).await?);
    }

    let cwd = std::env::current_dir()
        .map_err(|err| ExitError::config(format!("failed to resolve working directory: {err}")))?;
    let argv: Vec<String> = std::env::args().collect();
    let args = remote_command(&meta.pms_addr, &argv);
    let environ: Vec<String> = std::env::vars().map(|(k, v)| format!("{k}={v}")).collect();

    let job = build_job(&cwd.to_string_lossy(), &meta, &environ, &args)
        .map_err(|err| ExitError::config(err.to_string()))?;

    let jobs: Api<Job> = Api::namespaced(client, &meta.namespace);
    let created = jobs
        .create(&PostParams::default(), &job)
        .await
        .map_err(|err| ExitError::config(format!("failed to create transcode job: {err}")))?;
    let job_name = created.name_any();
    info!(job = %job_name, "created transcode job");

    let outcome = wait_for_completion(&cancel, &jobs, &job_name).await;
    // The job is deleted no matter how the wait ended.
    delete_job(&jobs, &job_name).await;

    match outcome {
        Ok(()) => {
            info!(job = %job_name, "transcode job completed");
            Ok(())
        }
        Err(WaitError::Cancelled) => {
            info!(job = %job_name, "session cancelled; transcode job deleted");
            Ok(())
        }
        Err(err) => Err(ExitError::config(format!("transcode job did not complete: {err}"))),
    }
}

/// The remote transcoder invocation: the shim's full argv, rewritten.
///
/// `argv[0]` must survive: inside the unmodified PMS image that path is
/// the real `Plex Transcoder` binary, and the launcher execs the first
/// element after `--` verbatim.
fn remote_command(pms_addr: &str, argv: &[String]) -> Vec<String> {
    Rewriter::new(format!("http://{pms_addr}")).args(argv)
}

/// Codec directory advertised by PMS, if any. The variable arrives
/// FFmpeg-escaped.
fn codec_dir() -> Option<PathBuf> {
    std::env::var(FFMPEG_EXTERNAL_LIBS)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|v| PathBuf::from(ffmpeg::unescape(&v)))
}

/// Bind an ephemeral port and serve the codec directory from it.
async fn spawn_codec_server(dir: PathBuf) -> Result<u16, ExitError> {
    let listener = TcpListener::bind(("0.0.0.0", 0))
        .await
        .map_err(|err| ExitError::config(format!("failed to bind codec server: {err}")))?;
    let port = listener
        .local_addr()
        .map_err(|err| ExitError::config(format!("failed to read codec server address: {err}")))?
        .port();
    info!(port, dir = %dir.display(), "serving codec packages");
    tokio::spawn(async move {
        if let Err(err) = package::serve(listener, dir).await {
            warn!(%err, "codec package server stopped");
        }
    });
    Ok(port)
}

fn spawn_signal_listener(cancel: CancellationToken) -> Result<(), ExitError> {
    let mut term = signal(SignalKind::terminate())
        .map_err(|err| ExitError::config(format!("failed to install SIGTERM handler: {err}")))?;
    let mut int = signal(SignalKind::interrupt())
        .map_err(|err| ExitError::config(format!("failed to install SIGINT handler: {err}")))?;
    tokio::spawn(async move {
        tokio::select! {
            _ = term.recv() => info!("received SIGTERM"),
            _ = int.recv() => info!("received SIGINT"),
        }
        cancel.cancel();
    });
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
