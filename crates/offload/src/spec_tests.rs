// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

fn pvc_volume(name: &str, claim: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount { name: name.to_string(), mount_path: path.to_string(), ..Default::default() }
}

fn descriptor() -> PmsMetadata {
    PmsMetadata {
        name: "pms".to_string(),
        namespace: "plex".to_string(),
        uid: "abc123".to_string(),
        pms_image: "pms:latest".to_string(),
        launcher_image: "kube-transcode:latest".to_string(),
        pms_addr: "kube-transcode:32400".to_string(),
        pod_ip: Some("10.1.2.3".to_string()),
        loglevel: None,
        volumes: vec![pvc_volume("data", "datapvc"), pvc_volume("transcode", "transcodepvc")],
        mounts: vec![mount("data", "/data"), mount("transcode", "/transcode")],
        codec_port: None,
    }
}

#[test]
fn builds_complete_job() {
    let environ = vec!["FOO=bar".to_string(), "BAR=oof".to_string()];
    let args = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let got = build_job("/rundir", &descriptor(), &environ, &args).unwrap();

    let want = Job {
        metadata: ObjectMeta {
            generate_name: Some("pms-elastic-transcoder-".to_string()),
            namespace: Some("plex".to_string()),
            owner_references: Some(vec![OwnerReference {
                api_version: "v1".to_string(),
                kind: "Pod".to_string(),
                name: "pms".to_string(),
                uid: "abc123".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(1),
            ttl_seconds_after_finished: Some(86_400),
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    node_selector: Some(BTreeMap::from([(
                        "kubernetes.io/arch".to_string(),
                        "amd64".to_string(),
                    )])),
                    restart_policy: Some("Never".to_string()),
                    init_containers: Some(vec![Container {
                        name: "kube-transcode-init".to_string(),
                        image: Some("kube-transcode:latest".to_string()),
                        command: Some(vec![
                            "cp".to_string(),
                            "/transcode-launcher".to_string(),
                            "/shared/transcode-launcher".to_string(),
                        ]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: "shared".to_string(),
                            mount_path: "/shared".to_string(),
                            read_only: Some(false),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }]),
                    containers: vec![Container {
                        name: "plex".to_string(),
                        image: Some("pms:latest".to_string()),
                        command: Some(vec![
                            "/shared/transcode-launcher".to_string(),
                            "--pms-addr=kube-transcode:32400".to_string(),
                            "--listen=:32400".to_string(),
                            "--".to_string(),
                            "a".to_string(),
                            "b".to_string(),
                            "c".to_string(),
                        ]),
                        env: Some(vec![
                            EnvVar {
                                name: "FOO".to_string(),
                                value: Some("bar".to_string()),
                                ..Default::default()
                            },
                            EnvVar {
                                name: "BAR".to_string(),
                                value: Some("oof".to_string()),
                                ..Default::default()
                            },
                        ]),
                        working_dir: Some("/rundir".to_string()),
                        volume_mounts: Some(vec![
                            VolumeMount {
                                name: "shared".to_string(),
                                mount_path: "/shared".to_string(),
                                read_only: Some(false),
                                ..Default::default()
                            },
                            VolumeMount {
                                name: "data".to_string(),
                                mount_path: "/data".to_string(),
                                read_only: Some(false),
                                ..Default::default()
                            },
                            VolumeMount {
                                name: "transcode".to_string(),
                                mount_path: "/transcode".to_string(),
                                read_only: Some(false),
                                ..Default::default()
                            },
                        ]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![
                        Volume {
                            name: "shared".to_string(),
                            empty_dir: Some(EmptyDirVolumeSource::default()),
                            ..Default::default()
                        },
                        pvc_volume("data", "datapvc"),
                        pvc_volume("transcode", "transcodepvc"),
                    ]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    assert_eq!(got, want);
}

#[test]
fn drops_pod_identity_env_and_unescapes_codec_path() {
    let environ = vec![
        "POD_NAME=pms".to_string(),
        "POD_NAMESPACE=plex".to_string(),
        r"FFMPEG_EXTERNAL_LIBS=/path\ to/codec".to_string(),
        "SHELL=/bin/false".to_string(),
    ];
    let job = build_job("/", &descriptor(), &environ, &[]).unwrap();
    let containers = &job.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers;
    let env = containers[0].env.as_ref().unwrap();
    assert_eq!(
        *env,
        vec![
            EnvVar {
                name: "FFMPEG_EXTERNAL_LIBS".to_string(),
                value: Some("/path to/codec".to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "SHELL".to_string(),
                value: Some("/bin/false".to_string()),
                ..Default::default()
            },
        ]
    );
}

#[test]
fn fails_without_owner_uid() {
    let mut meta = descriptor();
    meta.uid = String::new();
    let err = build_job("/", &meta, &[], &[]).unwrap_err();
    assert!(matches!(err, SpecError::MissingOwner(_)));
}
