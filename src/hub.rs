// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hub connection information delivered through a Secret.
//!
//! The hub cluster pushes a Secret into the addon namespace whose
//! `hub-info.yaml` key describes where forwarded metrics should be uploaded.
//! The connection info is a required input: a missing or malformed Secret
//! fails the reconcile so the runtime redelivers it.

use anyhow::{bail, Context as _, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{HUB_INFO_KEY, HUB_INFO_SECRET_NAME};
use crate::remote_write::normalize_endpoint;

/// Connection information for the hub cluster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HubInfo {
    /// Name the hub knows this spoke cluster by. Doubles as the fallback
    /// identity label on legacy platforms without a cluster UUID.
    #[serde(rename = "cluster-name")]
    pub cluster_name: String,

    /// Upload endpoint on the hub.
    pub endpoint: String,
}

impl HubInfo {
    /// Parse hub connection info out of the hub-delivered Secret.
    ///
    /// # Errors
    ///
    /// Returns an error when the expected data key is missing, the YAML does
    /// not parse, or the endpoint does not normalize into a valid URL.
    pub fn from_secret(secret: &Secret) -> Result<Self> {
        let data = secret
            .data
            .as_ref()
            .and_then(|d| d.get(HUB_INFO_KEY))
            .with_context(|| format!("hub info secret has no {HUB_INFO_KEY} key"))?;

        let info: HubInfo =
            serde_yaml::from_slice(&data.0).context("failed to parse hub info yaml")?;

        if info.cluster_name.is_empty() {
            bail!("hub info has an empty cluster-name");
        }
        Url::parse(&normalize_endpoint(&info.endpoint))
            .with_context(|| format!("hub endpoint {} is not a valid URL", info.endpoint))?;

        Ok(info)
    }

    /// Fetch and parse the hub connection Secret from the addon namespace.
    ///
    /// # Errors
    ///
    /// Returns an error when the Secret is absent or does not parse; hub
    /// connection info is a required input, so the reconcile fails and the
    /// runtime redelivers it.
    pub async fn load(client: &Client, namespace: &str) -> Result<Self> {
        let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
        let secret = api.get(HUB_INFO_SECRET_NAME).await.with_context(|| {
            format!("hub connection secret {HUB_INFO_SECRET_NAME} is missing in {namespace}")
        })?;
        Self::from_secret(&secret)
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod hub_tests;
