// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the forwardy operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the forwardy CRDs
pub const API_GROUP: &str = "forwardy.firestoned.io";

/// API version for the forwardy CRDs
pub const API_VERSION: &str = "v1beta1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "forwardy.firestoned.io/v1beta1";

/// Kind name for the `MetricsAddon` resource
pub const KIND_METRICS_ADDON: &str = "MetricsAddon";

/// Fixed name of the addon instance on both clusters
pub const ADDON_NAME: &str = "metrics-addon";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer gating deletion of the addon until managed objects are cleaned up
pub const ADDON_FINALIZER: &str = "forwardy.firestoned.io/addon-cleanup";

/// Finalizer gating deletion until the remote-write entry is removed from the
/// shared monitoring configuration
pub const REMOTE_WRITE_FINALIZER: &str = "forwardy.firestoned.io/remote-write-cleanup";

// ============================================================================
// Hub Connection Constants
// ============================================================================

/// Name of the hub-delivered connection Secret
pub const HUB_INFO_SECRET_NAME: &str = "hub-info-secret";

/// Data key inside the hub connection Secret
pub const HUB_INFO_KEY: &str = "hub-info.yaml";

/// Default mount path of the hub kubeconfig inside the operator pod
pub const HUB_KUBECONFIG_PATH: &str = "/spoke/hub-kubeconfig/kubeconfig";

// ============================================================================
// Forwarder Deployment Constants
// ============================================================================

/// Name of the managed forwarder Deployment
pub const FORWARDER_DEPLOYMENT_NAME: &str = "metrics-forwarder";

/// Container name inside the forwarder Deployment
pub const FORWARDER_CONTAINER_NAME: &str = "metrics-forwarder";

/// Path of the forwarder binary inside the image
pub const FORWARDER_BINARY: &str = "/usr/bin/metrics-forwarder";

/// Pod selector label key for the forwarder
pub const SELECTOR_KEY: &str = "component";

/// Pod selector label value for the forwarder
pub const SELECTOR_VALUE: &str = "metrics-forwarder";

/// Annotation key marking objects owned by this operator
pub const OWNER_ANNOTATION_KEY: &str = "owner";

/// Annotation value marking objects owned by this operator
pub const OWNER_ANNOTATION_VALUE: &str = "forwardy";

/// Upload size cap passed to the forwarder (1 GiB)
pub const LIMIT_BYTES: i64 = 1_073_741_824;

/// Sampling interval used when the addon spec omits or mangles its own
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Certificate Constants
// ============================================================================

/// Name of the mTLS certificate Secret delivered by the hub
pub const MTLS_SECRET_NAME: &str = "metrics-forwarder-certs";

/// Volume name for the mTLS certificates
pub const MTLS_VOLUME_NAME: &str = "mtlscerts";

/// Mount path for the mTLS certificates
pub const MTLS_MOUNT_PATH: &str = "/tlscerts";

/// Name of the injected CA-bundle ConfigMap
pub const CA_CONFIGMAP_NAME: &str = "metrics-forwarder-ca-bundle";

/// Volume name for the CA bundle
pub const CA_VOLUME_NAME: &str = "serving-certs-ca-bundle";

/// Mount path for the CA bundle
pub const CA_MOUNT_PATH: &str = "/etc/serving-certs-ca-bundle";

/// Annotation requesting platform CA-bundle injection into the ConfigMap
pub const CA_INJECT_ANNOTATION: &str = "service.alpha.openshift.io/inject-cabundle";

/// CA file used on legacy platforms without an injected bundle
pub const LEGACY_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/service-ca.crt";

/// Service account token file mounted into every pod
pub const SA_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

// ============================================================================
// RBAC Constants
// ============================================================================

/// Name of the managed ClusterRoleBinding
pub const CLUSTER_ROLE_BINDING_NAME: &str = "metrics-forwarder-view";

/// ClusterRole granting read access to platform monitoring
pub const CLUSTER_ROLE_NAME: &str = "cluster-monitoring-view";

// ============================================================================
// Platform Monitoring Constants
// ============================================================================

/// Name of the platform Prometheus Service used as the prerequisite marker
pub const PROM_SERVICE_NAME: &str = "prometheus-k8s";

/// Namespace of the platform monitoring stack
pub const PROM_NAMESPACE: &str = "openshift-monitoring";

/// In-cluster URL the forwarder scrapes metrics from
pub const PROM_URL: &str = "https://prometheus-k8s.openshift-monitoring.svc:9091";

/// Name of the shared cluster monitoring configuration ConfigMap
pub const MONITORING_CONFIG_NAME: &str = "cluster-monitoring-config";

/// Namespace of the shared cluster monitoring configuration
pub const MONITORING_CONFIG_NAMESPACE: &str = "openshift-monitoring";

/// Data key of the monitoring configuration document
pub const MONITORING_CONFIG_KEY: &str = "config.yaml";

// ============================================================================
// Remote Write Constants
// ============================================================================

/// Scheme prefixed onto endpoints that arrive without one
pub const REMOTE_WRITE_PROTOCOL: &str = "http://";

/// Write sub-path appended onto endpoints that lack it
pub const REMOTE_WRITE_URL_SUBPATH: &str = "/api/metrics/v1/write";

/// Label stamped onto every forwarded series by the synthesized relabel rule
pub const CLUSTER_ID_LABEL: &str = "cluster_id";

// ============================================================================
// Allow-list Constants
// ============================================================================

/// Name of the metric allow-list ConfigMap
pub const ALLOWLIST_CONFIGMAP_NAME: &str = "metrics-allowlist";

/// Data key inside the allow-list ConfigMap
pub const ALLOWLIST_KEY: &str = "allowlist.yaml";

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration after a successful reconcile (5 minutes); repairs drift
/// in objects the operator does not watch
pub const RESYNC_REQUEUE_DURATION_SECS: u64 = 300;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
