// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration resolved once at process start.
//!
//! All environment-derived settings live in [`OperatorConfig`], constructed in
//! `main` and passed by reference into the reconcilers through the shared
//! context. Reconciliation logic never reads the environment itself, which
//! keeps it independently testable.

use anyhow::{Context as _, Result};
use std::env;

use crate::constants::HUB_KUBECONFIG_PATH;

/// Process-wide configuration for the operator.
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace on the spoke cluster holding the addon objects
    pub namespace: String,

    /// Namespace on the hub cluster holding the authoritative addon
    pub hub_namespace: String,

    /// Container image for the forwarder Deployment
    pub forwarder_image: String,

    /// Service account the forwarder pods run as
    pub service_account: String,

    /// Path to the mounted hub kubeconfig
    pub hub_kubeconfig_path: String,
}

impl OperatorConfig {
    /// Build the configuration from the environment.
    ///
    /// Required variables: `WATCH_NAMESPACE`, `HUB_NAMESPACE`,
    /// `FORWARDER_IMAGE`, `SERVICE_ACCOUNT`. `HUB_KUBECONFIG` falls back to
    /// the default mount path.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing required variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            namespace: require("WATCH_NAMESPACE")?,
            hub_namespace: require("HUB_NAMESPACE")?,
            forwarder_image: require("FORWARDER_IMAGE")?,
            service_account: require("SERVICE_ACCOUNT")?,
            hub_kubeconfig_path: env::var("HUB_KUBECONFIG")
                .unwrap_or_else(|_| HUB_KUBECONFIG_PATH.to_string()),
        })
    }

    /// Fixed configuration for unit tests.
    #[cfg(test)]
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            namespace: "test-ns".to_string(),
            hub_namespace: "test-hub-ns".to_string(),
            forwarder_image: "quay.io/firestoned/metrics-forwarder:latest".to_string(),
            service_account: "forwardy".to_string(),
            hub_kubeconfig_path: "/tmp/hub-kubeconfig".to_string(),
        }
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("required environment variable {name} is not set"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
