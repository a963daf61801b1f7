// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Builders for the forwarder's Kubernetes resources.
//!
//! This module computes the full desired specification of the metrics
//! forwarding Deployment and its supporting objects (`ClusterRoleBinding`,
//! CA-bundle `ConfigMap`) as a pure function of the addon spec, the hub
//! connection info, the allow-list, and the observed cluster identity. The
//! convergence engine diffs these against the store; nothing here performs
//! I/O, which keeps the builders easily testable.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use tracing::debug;

use crate::allowlist::MetricsAllowList;
use crate::config::OperatorConfig;
use crate::constants::{
    CA_CONFIGMAP_NAME, CA_INJECT_ANNOTATION, CA_MOUNT_PATH, CA_VOLUME_NAME,
    CLUSTER_ROLE_BINDING_NAME, CLUSTER_ROLE_NAME, DEFAULT_INTERVAL_SECS, FORWARDER_BINARY,
    FORWARDER_CONTAINER_NAME, FORWARDER_DEPLOYMENT_NAME, LEGACY_CA_FILE, LIMIT_BYTES,
    MTLS_MOUNT_PATH, MTLS_SECRET_NAME, MTLS_VOLUME_NAME, OWNER_ANNOTATION_KEY,
    OWNER_ANNOTATION_VALUE, PROM_URL, SA_TOKEN_FILE, SELECTOR_KEY, SELECTOR_VALUE,
};
use crate::crd::MetricsAddonSpec;
use crate::duration::parse_interval;
use crate::hub::HubInfo;
use crate::remote_write::normalize_endpoint;

/// Selector labels shared by the forwarder Deployment and its pods.
#[must_use]
pub fn forwarder_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(SELECTOR_KEY.to_string(), SELECTOR_VALUE.to_string())])
}

fn owner_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([(
        OWNER_ANNOTATION_KEY.to_string(),
        OWNER_ANNOTATION_VALUE.to_string(),
    )])
}

/// Effective sampling interval in seconds.
///
/// A missing or malformed interval falls back to the default rather than
/// failing the build.
fn interval_secs(spec: &MetricsAddonSpec) -> u64 {
    match spec.interval.as_deref() {
        None => DEFAULT_INTERVAL_SECS,
        Some(raw) => match parse_interval(raw) {
            Ok(interval) => interval.as_secs(),
            Err(err) => {
                debug!(interval = raw, error = %err, "falling back to the default sampling interval");
                DEFAULT_INTERVAL_SECS
            }
        },
    }
}

/// Build the forwarder's command line.
///
/// Argument order is deterministic: fixed flags first, then one `--label`
/// per external label in key order, then one `--match` per allow-listed
/// metric name, then one `--match` per raw match expression, both in
/// declaration order.
fn build_command(
    effective_id: &str,
    ca_file: &str,
    spec: &MetricsAddonSpec,
    hub_info: &HubInfo,
    allow_list: &MetricsAllowList,
) -> Vec<String> {
    let mut command = vec![
        FORWARDER_BINARY.to_string(),
        "--id=$(ID)".to_string(),
        "--from=$(FROM)".to_string(),
        "--to-upload=$(TO)".to_string(),
        format!("--from-ca-file={ca_file}"),
        format!("--from-token-file={SA_TOKEN_FILE}"),
        format!("--interval={}s", interval_secs(spec)),
        format!("--limit-bytes={LIMIT_BYTES}"),
        format!("--label=cluster={}", hub_info.cluster_name),
        format!("--label=clusterID={effective_id}"),
    ];
    if let Some(labels) = &spec.external_labels {
        for (key, value) in labels {
            command.push(format!("--label={key}={value}"));
        }
    }
    for name in &allow_list.names {
        command.push(format!("--match={{__name__=\"{name}\"}}"));
    }
    for expr in &allow_list.matches {
        command.push(format!("--match={expr}"));
    }
    command
}

/// Build the desired forwarder Deployment.
///
/// On legacy platforms (`legacy`, no cluster UUID available) the identity
/// label degrades to `hub_info.cluster_name` and the CA file switches to the
/// fixed service-account path; otherwise the injected CA-bundle `ConfigMap`
/// is mounted. The mTLS certificate Secret is always mounted, named by
/// `spec.tlsConfig` when set.
#[must_use]
pub fn build_forwarder_deployment(
    config: &OperatorConfig,
    cluster_id: &str,
    spec: &MetricsAddonSpec,
    hub_info: &HubInfo,
    allow_list: &MetricsAllowList,
    replicas: i32,
    legacy: bool,
) -> Deployment {
    let effective_id = if legacy {
        hub_info.cluster_name.as_str()
    } else {
        cluster_id
    };
    let ca_file = if legacy {
        LEGACY_CA_FILE.to_string()
    } else {
        format!("{CA_MOUNT_PATH}/service-ca.crt")
    };
    debug!(
        effective_id,
        legacy, replicas, "building forwarder deployment spec"
    );

    let mtls_secret = spec
        .tls_config
        .as_ref()
        .and_then(|tls| tls.secret_name.clone())
        .unwrap_or_else(|| MTLS_SECRET_NAME.to_string());

    let mut volumes = vec![Volume {
        name: MTLS_VOLUME_NAME.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(mtls_secret),
            ..Default::default()
        }),
        ..Default::default()
    }];
    let mut volume_mounts = vec![VolumeMount {
        name: MTLS_VOLUME_NAME.to_string(),
        mount_path: MTLS_MOUNT_PATH.to_string(),
        ..Default::default()
    }];
    if !legacy {
        volumes.push(Volume {
            name: CA_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: CA_CONFIGMAP_NAME.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: CA_VOLUME_NAME.to_string(),
            mount_path: CA_MOUNT_PATH.to_string(),
            ..Default::default()
        });
    }

    let labels = forwarder_labels();
    Deployment {
        metadata: ObjectMeta {
            name: Some(FORWARDER_DEPLOYMENT_NAME.to_string()),
            namespace: Some(config.namespace.clone()),
            annotations: Some(owner_annotations()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(config.service_account.clone()),
                    containers: vec![Container {
                        name: FORWARDER_CONTAINER_NAME.to_string(),
                        image: Some(config.forwarder_image.clone()),
                        command: Some(build_command(
                            effective_id,
                            &ca_file,
                            spec,
                            hub_info,
                            allow_list,
                        )),
                        env: Some(vec![
                            env_var("FROM", PROM_URL),
                            env_var("TO", &normalize_endpoint(&hub_info.endpoint)),
                            env_var("ID", effective_id),
                        ]),
                        volume_mounts: Some(volume_mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// Structural equality over the fields the operator derives.
///
/// Two deployments are equal iff their replica count, container command,
/// environment, and volumes match; anything else (defaulted fields, status,
/// store-assigned metadata) is ignored so that server-side defaulting does
/// not cause spurious updates.
#[must_use]
pub fn deployment_specs_match(desired: &Deployment, observed: &Deployment) -> bool {
    derived_fields(desired) == derived_fields(observed)
}

type DerivedFields<'a> = (
    Option<i32>,
    Option<&'a Vec<String>>,
    Option<&'a Vec<EnvVar>>,
    Option<&'a Vec<Volume>>,
);

fn derived_fields(deployment: &Deployment) -> DerivedFields<'_> {
    let spec = deployment.spec.as_ref();
    let pod = spec.and_then(|s| s.template.spec.as_ref());
    let container = pod.and_then(|p| p.containers.first());
    (
        spec.and_then(|s| s.replicas),
        container.and_then(|c| c.command.as_ref()),
        container.and_then(|c| c.env.as_ref()),
        pod.and_then(|p| p.volumes.as_ref()),
    )
}

/// Observed replica count of a deployment, zero when unset.
#[must_use]
pub fn observed_replicas(deployment: &Deployment) -> i32 {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(0)
}

/// Build the binding granting the forwarder's service account read access to
/// platform monitoring.
#[must_use]
pub fn build_cluster_role_binding(config: &OperatorConfig) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE_BINDING_NAME.to_string()),
            annotations: Some(owner_annotations()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: config.service_account.clone(),
            namespace: Some(config.namespace.clone()),
            ..Default::default()
        }]),
    }
}

/// Whether an observed binding already carries the expected role reference
/// and subjects.
#[must_use]
pub fn cluster_role_binding_matches(
    desired: &ClusterRoleBinding,
    observed: &ClusterRoleBinding,
) -> bool {
    desired.role_ref == observed.role_ref && desired.subjects == observed.subjects
}

/// Build the CA-bundle `ConfigMap` the platform fills through its injection
/// annotation.
#[must_use]
pub fn build_ca_configmap(config: &OperatorConfig) -> ConfigMap {
    let mut annotations = owner_annotations();
    annotations.insert(CA_INJECT_ANNOTATION.to_string(), "true".to_string());
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(CA_CONFIGMAP_NAME.to_string()),
            namespace: Some(config.namespace.clone()),
            annotations: Some(annotations),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "service-ca.crt".to_string(),
            String::new(),
        )])),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "forwarder_resources_tests.rs"]
mod forwarder_resources_tests;
