// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote-write companion controller.
//!
//! Injects the hub's forwarding target into the shared cluster monitoring
//! document while the addon has metrics enabled, and removes it when the
//! addon disables metrics or is deleted. The document is co-owned by
//! uncoordinated writers, so every edit is a versioned read-merge-write: the
//! merge runs against a fresh read, the write carries the read's version
//! token, and a conflict surfaces as a retryable error that forces the whole
//! cycle to restart. Removal is gated by its own cleanup marker so a
//! deleted addon never strands its entry in the document.

use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use tracing::{debug, info, warn};

use crate::constants::{
    MONITORING_CONFIG_KEY, MONITORING_CONFIG_NAME, MONITORING_CONFIG_NAMESPACE,
    REMOTE_WRITE_FINALIZER,
};
use crate::context::Context;
use crate::crd::MetricsAddon;
use crate::hub::HubInfo;
use crate::reconcilers::finalizers::{
    ensure_finalizer, remove_finalizer, FinalizerAction, FinalizerState,
};
use crate::remote_write::{build_entry, merge_remote_write, normalize_endpoint};
use crate::versioned::{read_document, write_document};

/// Run one reconcile of the shared monitoring document against the addon.
///
/// # Errors
///
/// Returns an error when the hub connection info is missing, the document is
/// malformed, or a store write fails; a version conflict is surfaced as a
/// retryable error and the runtime redelivers, re-reading from scratch.
pub async fn reconcile_monitoring_config(ctx: &Context, addon: &MetricsAddon) -> Result<()> {
    let hub_api: Api<MetricsAddon> =
        Api::namespaced(ctx.hub_client.clone(), &ctx.config.hub_namespace);
    let hub_info = HubInfo::load(&ctx.client, &ctx.config.namespace).await?;

    match FinalizerState::observe(&addon.metadata, REMOTE_WRITE_FINALIZER).plan() {
        FinalizerAction::AddMarker => {
            ensure_finalizer(&hub_api, addon, REMOTE_WRITE_FINALIZER).await?;
            return Ok(());
        }
        FinalizerAction::RunCleanup => {
            remove_remote_write(ctx, &hub_info.endpoint).await?;
            remove_finalizer(&hub_api, addon, REMOTE_WRITE_FINALIZER).await?;
            return Ok(());
        }
        FinalizerAction::Nothing => return Ok(()),
        FinalizerAction::Proceed => {}
    }

    if addon.spec.enable_metrics {
        apply_remote_write(ctx, addon, &hub_info).await
    } else {
        remove_remote_write(ctx, &hub_info.endpoint).await
    }
}

fn config_api(ctx: &Context) -> Api<ConfigMap> {
    Api::namespaced(ctx.client.clone(), MONITORING_CONFIG_NAMESPACE)
}

/// Inject or refresh the hub's entry in the monitoring document.
async fn apply_remote_write(ctx: &Context, addon: &MetricsAddon, hub_info: &HubInfo) -> Result<()> {
    let api = config_api(ctx);
    let cluster_id = match ctx.identity.cluster_id().await {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "cluster identity unavailable, stamping the hub cluster name");
            String::new()
        }
    };
    let id_label = if cluster_id.is_empty() {
        hub_info.cluster_name.clone()
    } else {
        cluster_id
    };
    let rules = addon.spec.write_relabel_configs.clone().unwrap_or_default();
    let entry = build_entry(&hub_info.endpoint, &rules, &id_label);
    let target = normalize_endpoint(&hub_info.endpoint);

    match read_document(&api, MONITORING_CONFIG_NAME, MONITORING_CONFIG_KEY).await? {
        None => {
            let content = merge_remote_write("", &target, Some(&entry))?;
            write_document(
                &api,
                MONITORING_CONFIG_NAME,
                MONITORING_CONFIG_KEY,
                &content,
                None,
            )
            .await
            .context("failed to create the cluster monitoring configuration")?;
            info!("created cluster monitoring configuration with the forwarding target");
        }
        Some(doc) => {
            let merged = merge_remote_write(&doc.content, &target, Some(&entry))?;
            if merged == doc.content {
                debug!("forwarding target already present in the monitoring configuration");
            } else {
                write_document(
                    &api,
                    MONITORING_CONFIG_NAME,
                    MONITORING_CONFIG_KEY,
                    &merged,
                    doc.version.as_deref(),
                )
                .await
                .context("failed to update the cluster monitoring configuration")?;
                info!("injected forwarding target into the cluster monitoring configuration");
            }
        }
    }
    Ok(())
}

/// Remove the hub's entry from the monitoring document. An absent document
/// or entry is a no-op.
async fn remove_remote_write(ctx: &Context, endpoint: &str) -> Result<()> {
    let api = config_api(ctx);
    let target = normalize_endpoint(endpoint);

    match read_document(&api, MONITORING_CONFIG_NAME, MONITORING_CONFIG_KEY).await? {
        None => {
            debug!("no cluster monitoring configuration, nothing to remove");
        }
        Some(doc) => {
            let merged = merge_remote_write(&doc.content, &target, None)?;
            if merged == doc.content {
                debug!("forwarding target not present in the monitoring configuration");
            } else {
                write_document(
                    &api,
                    MONITORING_CONFIG_NAME,
                    MONITORING_CONFIG_KEY,
                    &merged,
                    doc.version.as_deref(),
                )
                .await
                .context("failed to update the cluster monitoring configuration")?;
                info!("removed forwarding target from the cluster monitoring configuration");
            }
        }
    }
    Ok(())
}
