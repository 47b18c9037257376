// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcode job spec construction.
//!
//! [`build_job`] is a pure function from the resolved descriptor plus the
//! caller's runtime context to a complete batch Job. The only
//! non-determinism is the server-assigned `generateName` suffix.

use crate::metadata::{MetadataError, PmsMetadata};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kt_core::env::{filter_pod_env, split_environ};
use std::collections::BTreeMap;
use thiserror::Error;

/// Prefix for server-generated job names.
pub const GENERATE_NAME: &str = "pms-elastic-transcoder-";

/// Scratch volume shared between the init step and the main container.
const SHARED_VOLUME: &str = "shared";
const SHARED_MOUNT_PATH: &str = "/shared";

/// Finished jobs are garbage-collected after a day.
const TTL_SECONDS: i32 = 86_400;

/// Run once; the shim reacts to failure, the orchestrator must not retry
/// silently.
const BACKOFF_LIMIT: i32 = 1;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("cannot construct owner reference: {0}")]
    MissingOwner(#[from] MetadataError),
}

/// Build the complete Job for one offloaded transcode.
///
/// `environ` is the shim's own `KEY=VALUE` environment, forwarded after
/// pod-identity filtering; `args` are the already-rewritten transcoder
/// arguments.
pub fn build_job(
    cwd: &str,
    meta: &PmsMetadata,
    environ: &[String],
    args: &[String],
) -> Result<Job, SpecError> {
    let owner = meta.owner_reference()?;

    let env: Vec<EnvVar> = filter_pod_env(split_environ(environ.iter()))
        .into_iter()
        .map(|(name, value)| EnvVar { name, value: Some(value), ..Default::default() })
        .collect();

    let shared_mount = VolumeMount {
        name: SHARED_VOLUME.to_string(),
        mount_path: SHARED_MOUNT_PATH.to_string(),
        read_only: Some(false),
        ..Default::default()
    };

    let mut volume_mounts = vec![shared_mount.clone()];
    volume_mounts.extend(meta.mounts.iter().cloned().map(|mut m| {
        m.read_only = Some(false);
        m
    }));

    let mut volumes = vec![Volume {
        name: SHARED_VOLUME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }];
    volumes.extend(meta.volumes.iter().cloned());

    // The launcher binary ships in the kube-transcode image, not the PMS
    // image. An init step stages it into the shared scratch volume so the
    // main container can exec it.
    let init_container = Container {
        name: "kube-transcode-init".to_string(),
        image: Some(meta.launcher_image.clone()),
        command: Some(vec![
            "cp".to_string(),
            "/transcode-launcher".to_string(),
            "/shared/transcode-launcher".to_string(),
        ]),
        volume_mounts: Some(vec![shared_mount]),
        ..Default::default()
    };

    let main_container = Container {
        name: "plex".to_string(),
        image: Some(meta.pms_image.clone()),
        command: Some(meta.launcher_command(args)),
        env: Some(env),
        working_dir: Some(cwd.to_string()),
        volume_mounts: Some(volume_mounts),
        ..Default::default()
    };

    Ok(Job {
        metadata: ObjectMeta {
            generate_name: Some(GENERATE_NAME.to_string()),
            namespace: Some(meta.namespace.clone()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(BACKOFF_LIMIT),
            ttl_seconds_after_finished: Some(TTL_SECONDS),
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    node_selector: Some(BTreeMap::from([(
                        "kubernetes.io/arch".to_string(),
                        "amd64".to_string(),
                    )])),
                    restart_policy: Some("Never".to_string()),
                    init_containers: Some(vec![init_container]),
                    containers: vec![main_container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod spec_tests;
