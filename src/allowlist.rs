// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Metric allow-list loaded from a ConfigMap.
//!
//! The allow-list restricts which series the forwarder ships to the hub. It
//! is an optional input: a missing ConfigMap, a missing data key, or YAML
//! that fails to parse all degrade to an empty allow-list rather than failing
//! the reconcile.

use k8s_openapi::api::core::v1::ConfigMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::ALLOWLIST_KEY;

/// Metric names and selector expressions permitted through the forwarder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricsAllowList {
    /// Exact metric names to forward, in declaration order.
    #[serde(default)]
    pub names: Vec<String>,

    /// Raw series selector expressions to forward, in declaration order.
    #[serde(default)]
    pub matches: Vec<String>,
}

impl MetricsAllowList {
    /// Parse the allow-list from its ConfigMap, degrading to empty on any
    /// missing or malformed input.
    #[must_use]
    pub fn from_configmap(cm: Option<&ConfigMap>) -> Self {
        let Some(cm) = cm else {
            return Self::default();
        };
        let Some(raw) = cm.data.as_ref().and_then(|d| d.get(ALLOWLIST_KEY)) else {
            warn!("allow-list configmap has no {} key", ALLOWLIST_KEY);
            return Self::default();
        };
        match serde_yaml::from_str(raw) {
            Ok(list) => list,
            Err(err) => {
                warn!(error = %err, "failed to parse metric allow-list, forwarding nothing extra");
                Self::default()
            }
        }
    }

    /// Whether the allow-list permits nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.matches.is_empty()
    }
}

#[cfg(test)]
#[path = "allowlist_tests.rs"]
mod allowlist_tests;
