// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status mirror from the spoke-local addon to its hub copy.
//!
//! The convergence engine writes status onto the spoke-local addon; this
//! reconciler copies that status verbatim onto the hub-side representation.
//! The two writes are independent and non-transactional: the hub copy may be
//! momentarily stale relative to the local value, and consumers must treat
//! it as eventually consistent. Mirroring an unchanged status is a logged
//! no-op so the mirror does not re-trigger itself.

use anyhow::{Context as _, Result};
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;
use tracing::{debug, info};

use crate::constants::ADDON_NAME;
use crate::context::Context;
use crate::crd::MetricsAddon;

/// Copy the local addon's status onto the hub addon.
///
/// # Errors
///
/// Returns an error when either addon copy cannot be read or the hub status
/// write fails; the runtime redelivers with backoff.
pub async fn sync_status(ctx: &Context) -> Result<()> {
    let local_api: Api<MetricsAddon> = Api::namespaced(ctx.client.clone(), &ctx.config.namespace);
    let hub_api: Api<MetricsAddon> =
        Api::namespaced(ctx.hub_client.clone(), &ctx.config.hub_namespace);

    let local = local_api
        .get(ADDON_NAME)
        .await
        .context("failed to fetch the local addon")?;
    let hub = hub_api
        .get(ADDON_NAME)
        .await
        .context("failed to fetch the hub addon")?;

    let status = local.status.clone().unwrap_or_default();
    if hub.status.as_ref() == Some(&status) {
        debug!("hub addon status already current");
        return Ok(());
    }

    let patch = json!({ "status": status });
    hub_api
        .patch_status(ADDON_NAME, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .context("failed to mirror status onto the hub addon")?;
    info!("mirrored addon status to the hub");
    Ok(())
}
