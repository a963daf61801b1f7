// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for the metrics forwarding addon.
//!
//! This module defines the `MetricsAddon` resource, the declarative desired
//! state for metrics forwarding on a spoke cluster. The authoritative copy
//! lives on the hub cluster; a mirrored copy on the spoke carries the locally
//! computed status back.
//!
//! # Example: Enabling forwarding
//!
//! ```rust,no_run
//! use forwardy::crd::MetricsAddonSpec;
//!
//! let spec = MetricsAddonSpec {
//!     enable_metrics: true,
//!     interval: Some("30s".to_string()),
//!     tls_config: None,
//!     external_labels: None,
//!     write_relabel_configs: None,
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `MetricsAddon` declares the desired state of metrics forwarding on a spoke
/// cluster.
///
/// The hub cluster owns the spec; the spoke operator only reads it and writes
/// status. Exactly one instance named `metrics-addon` exists per cluster pair.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "forwardy.firestoned.io",
    version = "v1beta1",
    kind = "MetricsAddon",
    namespaced,
    doc = "MetricsAddon declares whether and how platform metrics are forwarded from a spoke cluster to its hub."
)]
#[kube(status = "MetricsAddonStatus")]
#[serde(rename_all = "camelCase")]
pub struct MetricsAddonSpec {
    /// Whether metrics forwarding is enabled. Disabling scales the forwarder
    /// to zero replicas without deleting it.
    pub enable_metrics: bool,

    /// Sampling interval as a Go-style duration string (e.g., "30s", "2m").
    ///
    /// Missing or malformed values fall back to the 60s default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// TLS settings for the upload connection to the hub.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    /// Additional labels stamped onto every forwarded series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_labels: Option<BTreeMap<String, String>>,

    /// Relabel rules applied by the platform Prometheus before remote-writing
    /// to the hub. A cluster-identity rule is always appended to these.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_relabel_configs: Option<Vec<RelabelRule>>,
}

/// TLS settings for the forwarder's upload connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Name of the Secret holding the client certificate pair. Defaults to
    /// the hub-delivered certificate Secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// One Prometheus relabel rule, in the upstream `remoteWrite` wire shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelabelRule {
    /// Labels whose values are concatenated as the rule input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_labels: Option<Vec<String>>,

    /// Label the rule writes its output to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,

    /// Regular expression matched against the concatenated input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Replacement value written on a match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,

    /// Relabel action (replace, keep, drop, ...). Defaults to replace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Condition represents an observation of the addon's current state.
///
/// The status propagator always replaces the whole condition list with a
/// single current condition; conditions are never accumulated or merged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
pub struct Condition {
    /// Type of condition: Available, Disabled, Degraded, or NotSupported.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `MetricsAddon` status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsAddonStatus {
    /// Current condition of the addon. Holds exactly one element once any
    /// reconcile has reached a decision point.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
