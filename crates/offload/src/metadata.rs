// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PMS pod metadata resolution.
//!
//! The shim runs inside the PMS pod and knows only its own name and
//! namespace. Everything else a transcode job needs — images, volumes,
//! a routable server address — is read from the pod object itself, with
//! operator overrides supplied as `kube-transcode/...` annotations.
//!
//! Resolution is all-or-nothing: a descriptor is either fully populated
//! or the offload attempt fails here, before anything is created.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::Api;
use kube::Client;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Annotation carrying the cluster-routable PMS address (`host:port`).
pub const ANNOTATION_PMS_ADDR: &str = "kube-transcode/pms-addr";
/// Annotation carrying the launcher image reference.
pub const ANNOTATION_IMAGE: &str = "kube-transcode/image";
/// Annotation overriding the PMS container name.
pub const ANNOTATION_CONTAINER_NAME: &str = "kube-transcode/container-name";
/// Annotation overriding the mount paths propagated to the job.
pub const ANNOTATION_MOUNTS: &str = "kube-transcode/mounts";
/// Annotation setting the remote transcoder log level.
pub const ANNOTATION_LOGLEVEL: &str = "kube-transcode/loglevel";

/// Environment override for the PMS address (takes precedence over the
/// annotation).
pub const ENV_PMS_ADDR: &str = "KUBE_TRANSCODE_PMS_ADDR";
/// Environment override for the launcher image.
pub const ENV_IMAGE: &str = "KUBE_TRANSCODE_IMAGE";

const DEFAULT_CONTAINER_NAME: &str = "plex";
const DEFAULT_MOUNTS: &str = "/data,/transcode";

/// Errors from metadata resolution. All are terminal for the offload
/// attempt; nothing here is retried.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("pod identity missing: POD_NAME and POD_NAMESPACE must both be set")]
    IdentityMissing,

    #[error("unable to fetch pod {namespace}/{name}: {source}")]
    LookupFailed {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("no usable container named {0:?} in pod spec (override with the kube-transcode/container-name annotation)")]
    ContainerNotFound(String),

    #[error("no volume backs mount path {0:?}")]
    VolumeNotFound(String),

    #[error("required annotation {0:?} missing from pod")]
    AnnotationMissing(&'static str),

    #[error("owner UID is empty, has the pod been resolved?")]
    OwnerUnresolved,
}

/// Environment-sourced overrides, resolved once at startup and threaded
/// into [`PmsMetadata::from_pod`] so resolution itself stays pure.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pms_addr: Option<String>,
    pub launcher_image: Option<String>,
}

impl Overrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self {
            pms_addr: std::env::var(ENV_PMS_ADDR).ok().filter(|v| !v.is_empty()),
            launcher_image: std::env::var(ENV_IMAGE).ok().filter(|v| !v.is_empty()),
        }
    }
}

/// Resolved facts about the PMS pod needed to build a transcode job.
/// Immutable once resolved, except for the codec server port which the
/// shim learns only after binding its listener.
#[derive(Debug, Clone, PartialEq)]
pub struct PmsMetadata {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    /// Image of the PMS container; the job reuses it so the transcoder
    /// binary and its libraries match the server exactly.
    pub pms_image: String,
    /// Image carrying the transcode-launcher binary.
    pub launcher_image: String,
    /// Cluster-routable `host:port` for the PMS instance.
    pub pms_addr: String,
    /// IP of the PMS pod, used to advertise the codec server.
    pub pod_ip: Option<String>,
    /// Remote transcoder log level, if the operator set one.
    pub loglevel: Option<String>,
    /// Volumes to propagate, deduplicated, in lexicographic name order.
    pub volumes: Vec<Volume>,
    /// Mounts to propagate, unmodified, in annotation order.
    pub mounts: Vec<VolumeMount>,
    /// Port of the local codec package server, when one is running.
    pub codec_port: Option<u16>,
}

impl PmsMetadata {
    /// Fetch the PMS pod and resolve it into a descriptor.
    pub async fn fetch(
        client: Client,
        name: &str,
        namespace: &str,
        overrides: &Overrides,
    ) -> Result<Self, MetadataError> {
        if name.is_empty() || namespace.is_empty() {
            return Err(MetadataError::IdentityMissing);
        }
        let pods: Api<Pod> = Api::namespaced(client, namespace);
        let pod = pods.get(name).await.map_err(|source| MetadataError::LookupFailed {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;
        Self::from_pod(&pod, overrides)
    }

    /// Resolve a pod object into a descriptor. Pure; fails rather than
    /// returning a partially-populated descriptor.
    pub fn from_pod(pod: &Pod, overrides: &Overrides) -> Result<Self, MetadataError> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        if name.is_empty() || namespace.is_empty() {
            return Err(MetadataError::IdentityMissing);
        }
        let uid = pod.metadata.uid.clone().unwrap_or_default();

        let empty = BTreeMap::new();
        let annotations = pod.metadata.annotations.as_ref().unwrap_or(&empty);

        let container_name = annotations
            .get(ANNOTATION_CONTAINER_NAME)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string());

        let spec = pod
            .spec
            .as_ref()
            .ok_or_else(|| MetadataError::ContainerNotFound(container_name.clone()))?;
        let container = spec
            .containers
            .iter()
            .find(|c| c.name == container_name)
            .ok_or_else(|| MetadataError::ContainerNotFound(container_name.clone()))?;
        let pms_image = container
            .image
            .clone()
            .filter(|i| !i.is_empty())
            .ok_or_else(|| MetadataError::ContainerNotFound(container_name.clone()))?;

        let pms_addr = overrides
            .pms_addr
            .clone()
            .or_else(|| annotations.get(ANNOTATION_PMS_ADDR).cloned())
            .filter(|a| !a.is_empty())
            .ok_or(MetadataError::AnnotationMissing(ANNOTATION_PMS_ADDR))?;

        let launcher_image = overrides
            .launcher_image
            .clone()
            .or_else(|| annotations.get(ANNOTATION_IMAGE).cloned())
            .filter(|i| !i.is_empty())
            .ok_or(MetadataError::AnnotationMissing(ANNOTATION_IMAGE))?;

        let mount_spec = annotations
            .get(ANNOTATION_MOUNTS)
            .cloned()
            .unwrap_or_else(|| DEFAULT_MOUNTS.to_string());
        let mount_paths: Vec<String> = mount_spec
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let (volumes, mounts) = resolve_volumes(spec, container, &mount_paths)?;

        let pod_ip = pod.status.as_ref().and_then(|s| s.pod_ip.clone());

        debug!(
            pod = %name,
            namespace = %namespace,
            image = %pms_image,
            volumes = volumes.len(),
            "resolved PMS pod metadata"
        );

        Ok(Self {
            name,
            namespace,
            uid,
            pms_image,
            launcher_image,
            pms_addr,
            pod_ip,
            loglevel: annotations.get(ANNOTATION_LOGLEVEL).cloned(),
            volumes,
            mounts,
            codec_port: None,
        })
    }

    /// Owner reference back to the PMS pod, so deleting the pod cascades
    /// deletion of any transcode jobs it spawned.
    pub fn owner_reference(&self) -> Result<OwnerReference, MetadataError> {
        if self.uid.is_empty() {
            return Err(MetadataError::OwnerUnresolved);
        }
        Ok(OwnerReference {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            ..Default::default()
        })
    }

    /// Command for the job's main container: the staged launcher binary,
    /// its bridge flags, then `--` and the rewritten transcoder arguments.
    pub fn launcher_command(&self, args: &[String]) -> Vec<String> {
        let mut cmd = vec![
            "/shared/transcode-launcher".to_string(),
            format!("--pms-addr={}", self.pms_addr),
            "--listen=:32400".to_string(),
        ];
        if let (Some(port), Some(ip)) = (self.codec_port, self.pod_ip.as_deref()) {
            cmd.push(format!("--codec-server-url=http://{ip}:{port}/"));
        }
        if let Some(level) = &self.loglevel {
            cmd.push(format!("--loglevel={level}"));
        }
        cmd.push("--".to_string());
        cmd.extend(args.iter().cloned());
        cmd
    }
}

/// Resolve required mount paths against the container's mounts and the
/// pod's volumes. A volume mounted at several paths (with different
/// sub-paths) is returned once; volumes come back sorted by name so
/// repeated resolutions of the same pod are reproducible.
fn resolve_volumes(
    spec: &PodSpec,
    container: &Container,
    paths: &[String],
) -> Result<(Vec<Volume>, Vec<VolumeMount>), MetadataError> {
    let mut mounts = Vec::new();
    let mut by_name: BTreeMap<String, Volume> = BTreeMap::new();

    for path in paths {
        let mount = container
            .volume_mounts
            .as_ref()
            .and_then(|ms| ms.iter().find(|m| &m.mount_path == path))
            .ok_or_else(|| MetadataError::VolumeNotFound(path.clone()))?;
        let volume = spec
            .volumes
            .as_ref()
            .and_then(|vs| vs.iter().find(|v| v.name == mount.name))
            .ok_or_else(|| MetadataError::VolumeNotFound(path.clone()))?;
        mounts.push(mount.clone());
        by_name.entry(volume.name.clone()).or_insert_with(|| volume.clone());
    }

    Ok((by_name.into_values().collect(), mounts))
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod metadata_tests;
