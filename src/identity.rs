// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Externally observed cluster identity.
//!
//! The forwarder stamps every series with a cluster identifier so the hub can
//! tell spokes apart. Modern platforms expose a stable UUID; legacy platforms
//! do not, in which case the caller degrades to the hub-assigned cluster name
//! and the deprecated service-account CA path.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};

/// Source of the opaque cluster identifier.
///
/// Implementations perform the external lookup; callers treat any failure as
/// "identity unavailable" and substitute the fallback identity downstream.
#[async_trait]
pub trait ClusterIdentitySource: Send + Sync {
    /// Look up the cluster identifier.
    ///
    /// # Errors
    ///
    /// Returns an error when the identity cannot be determined; callers map
    /// this to the empty-identity legacy mode rather than failing.
    async fn cluster_id(&self) -> Result<String>;
}

/// Identity source backed by the UID of the `kube-system` namespace.
///
/// The namespace UID is stable for the lifetime of a cluster and exists on
/// every conformant platform; clusters where the lookup is forbidden behave
/// like legacy platforms.
pub struct NamespaceUidSource {
    client: Client,
}

impl NamespaceUidSource {
    /// Create a source reading the identity through the given client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterIdentitySource for NamespaceUidSource {
    async fn cluster_id(&self) -> Result<String> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = api
            .get("kube-system")
            .await
            .context("failed to read kube-system namespace")?;
        ns.metadata
            .uid
            .context("kube-system namespace has no uid")
    }
}

/// Fixed identity source for tests.
#[cfg(test)]
pub struct FixedIdentitySource(pub Option<String>);

#[cfg(test)]
#[async_trait]
impl ClusterIdentitySource for FixedIdentitySource {
    async fn cluster_id(&self) -> Result<String> {
        self.0
            .clone()
            .ok_or_else(|| anyhow::anyhow!("cluster identity unavailable"))
    }
}
