// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Convergence engine for the metrics forwarding addon.
//!
//! One reconcile runs the full state machine from scratch: load inputs,
//! settle the finalizer lifecycle, check the platform prerequisite, ensure
//! the support objects, and converge the forwarder Deployment onto the
//! desired spec. Every step re-derives its target from current state and
//! every write is idempotent, so a duplicate or out-of-order delivery
//! converges to the same result with no further writes.
//!
//! The engine never sleeps or retries internally; an error returns control
//! to the runtime, which owns backoff and redelivery.

use anyhow::{Context as _, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::allowlist::MetricsAllowList;
use crate::constants::{
    ADDON_FINALIZER, ADDON_NAME, ALLOWLIST_CONFIGMAP_NAME, CA_CONFIGMAP_NAME,
    CLUSTER_ROLE_BINDING_NAME, FORWARDER_DEPLOYMENT_NAME, PROM_NAMESPACE, PROM_SERVICE_NAME,
    SELECTOR_KEY, SELECTOR_VALUE,
};
use crate::context::Context;
use crate::crd::MetricsAddon;
use crate::forwarder_resources::{
    build_ca_configmap, build_cluster_role_binding, build_forwarder_deployment,
    cluster_role_binding_matches, deployment_specs_match, observed_replicas,
};
use crate::hub::HubInfo;
use crate::metrics;
use crate::reconcilers::finalizers::{
    ensure_finalizer, remove_finalizer, FinalizerAction, FinalizerState,
};
use crate::reconcilers::status::{report_status, ConditionKind};

/// Run one reconcile of the hub addon.
///
/// # Errors
///
/// Returns an error when a required input is missing or a store write fails;
/// the runtime redelivers with backoff. A missing platform monitoring stack
/// is reported as `NotSupported` and is not an error.
pub async fn reconcile_addon(ctx: &Context, addon: &MetricsAddon) -> Result<()> {
    let config = &ctx.config;
    let hub_api: Api<MetricsAddon> =
        Api::namespaced(ctx.hub_client.clone(), &config.hub_namespace);
    let local_api: Api<MetricsAddon> = Api::namespaced(ctx.client.clone(), &config.namespace);

    let hub_info = HubInfo::load(&ctx.client, &config.namespace).await?;

    match FinalizerState::observe(&addon.metadata, ADDON_FINALIZER).plan() {
        FinalizerAction::AddMarker => {
            ensure_finalizer(&hub_api, addon, ADDON_FINALIZER).await?;
            // Stop here; the resulting update event re-triggers the reconcile.
            return Ok(());
        }
        FinalizerAction::RunCleanup => {
            cleanup_managed_objects(ctx).await?;
            remove_finalizer(&hub_api, addon, ADDON_FINALIZER).await?;
            return Ok(());
        }
        FinalizerAction::Nothing => return Ok(()),
        FinalizerAction::Proceed => {}
    }

    if !platform_monitoring_available(ctx).await? {
        info!("platform monitoring not installed, metrics forwarding is not supported here");
        report_status(&local_api, ADDON_NAME, ConditionKind::NotSupported).await;
        return Ok(());
    }

    let allow_list = load_allow_list(ctx).await?;
    let cluster_id = match ctx.identity.cluster_id().await {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "cluster identity unavailable, falling back to the hub cluster name");
            String::new()
        }
    };

    if let Err(err) = ensure_support_objects(ctx).await {
        report_status(&local_api, ADDON_NAME, ConditionKind::Degraded).await;
        return Err(err);
    }
    if let Err(err) =
        converge_deployment(ctx, addon, &hub_info, &allow_list, &cluster_id, &local_api).await
    {
        report_status(&local_api, ADDON_NAME, ConditionKind::Degraded).await;
        return Err(err);
    }
    Ok(())
}

/// Whether the platform monitoring stack's marker Service exists.
async fn platform_monitoring_available(ctx: &Context) -> Result<bool> {
    let api: Api<Service> = Api::namespaced(ctx.client.clone(), PROM_NAMESPACE);
    match api.get(PROM_SERVICE_NAME).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(ref e)) if e.code == 404 => Ok(false),
        Err(err) => Err(err).context("failed to check the platform monitoring service"),
    }
}

/// Load the metric allow-list, degrading to empty when the ConfigMap is
/// absent.
async fn load_allow_list(ctx: &Context) -> Result<MetricsAllowList> {
    let api: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &ctx.config.namespace);
    match api.get(ALLOWLIST_CONFIGMAP_NAME).await {
        Ok(cm) => Ok(MetricsAllowList::from_configmap(Some(&cm))),
        Err(kube::Error::Api(ref e)) if e.code == 404 => {
            debug!("no allow-list configmap, forwarding the default series only");
            Ok(MetricsAllowList::from_configmap(None))
        }
        Err(err) => Err(err).context("failed to fetch the metric allow-list"),
    }
}

/// Ensure the ClusterRoleBinding and CA-bundle ConfigMap exist with the
/// expected fields.
///
/// A binding with divergent role reference or subjects is updated in place,
/// carrying the observed version token so the write does not conflict
/// spuriously; a matching object is left untouched.
async fn ensure_support_objects(ctx: &Context) -> Result<()> {
    let rb_api: Api<ClusterRoleBinding> = Api::all(ctx.client.clone());
    let desired = build_cluster_role_binding(&ctx.config);
    match rb_api.get(CLUSTER_ROLE_BINDING_NAME).await {
        Ok(found) => {
            if cluster_role_binding_matches(&desired, &found) {
                debug!("forwarder clusterrolebinding already up to date");
            } else {
                let mut desired = desired;
                desired.metadata.resource_version = found.metadata.resource_version.clone();
                rb_api
                    .replace(CLUSTER_ROLE_BINDING_NAME, &PostParams::default(), &desired)
                    .await
                    .context("failed to update the forwarder clusterrolebinding")?;
                info!("updated forwarder clusterrolebinding");
                metrics::record_resource_updated("ClusterRoleBinding");
            }
        }
        Err(kube::Error::Api(ref e)) if e.code == 404 => {
            rb_api
                .create(&PostParams::default(), &desired)
                .await
                .context("failed to create the forwarder clusterrolebinding")?;
            info!("created forwarder clusterrolebinding");
            metrics::record_resource_created("ClusterRoleBinding");
        }
        Err(err) => {
            return Err(err).context("failed to fetch the forwarder clusterrolebinding");
        }
    }

    let cm_api: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &ctx.config.namespace);
    match cm_api.get(CA_CONFIGMAP_NAME).await {
        Ok(_) => debug!("ca bundle configmap already exists"),
        Err(kube::Error::Api(ref e)) if e.code == 404 => {
            cm_api
                .create(&PostParams::default(), &build_ca_configmap(&ctx.config))
                .await
                .context("failed to create the ca bundle configmap")?;
            info!("created ca bundle configmap");
            metrics::record_resource_created("ConfigMap");
        }
        Err(err) => return Err(err).context("failed to fetch the ca bundle configmap"),
    }
    Ok(())
}

/// Converge the forwarder Deployment onto the desired spec.
///
/// Status rule: a fresh create and a structural no-op while enabled report
/// `Ready`; an update reports nothing except `Disabled` when it scaled the
/// forwarder to zero.
async fn converge_deployment(
    ctx: &Context,
    addon: &MetricsAddon,
    hub_info: &HubInfo,
    allow_list: &MetricsAllowList,
    cluster_id: &str,
    local_api: &Api<MetricsAddon>,
) -> Result<()> {
    let enabled = addon.spec.enable_metrics;
    let replicas = i32::from(enabled);
    let legacy = cluster_id.is_empty();
    let mut desired = build_forwarder_deployment(
        &ctx.config,
        cluster_id,
        &addon.spec,
        hub_info,
        allow_list,
        replicas,
        legacy,
    );

    let api: Api<Deployment> = Api::namespaced(ctx.client.clone(), &ctx.config.namespace);
    match api.get(FORWARDER_DEPLOYMENT_NAME).await {
        Ok(found) => {
            let scaling_down = !enabled && observed_replicas(&found) > 0;
            if deployment_specs_match(&desired, &found) {
                debug!("forwarder deployment already up to date");
                if enabled {
                    report_status(local_api, ADDON_NAME, ConditionKind::Ready).await;
                }
            } else {
                desired.metadata.resource_version = found.metadata.resource_version.clone();
                api.replace(FORWARDER_DEPLOYMENT_NAME, &PostParams::default(), &desired)
                    .await
                    .context("failed to update the forwarder deployment")?;
                info!(replicas, "updated forwarder deployment");
                metrics::record_resource_updated("Deployment");
                if scaling_down {
                    report_status(local_api, ADDON_NAME, ConditionKind::Disabled).await;
                }
            }
        }
        Err(kube::Error::Api(ref e)) if e.code == 404 => {
            if enabled {
                api.create(&PostParams::default(), &desired)
                    .await
                    .context("failed to create the forwarder deployment")?;
                info!("created forwarder deployment");
                metrics::record_resource_created("Deployment");
                report_status(local_api, ADDON_NAME, ConditionKind::Ready).await;
            } else {
                debug!("metrics disabled and no forwarder deployed, nothing to converge");
            }
        }
        Err(err) => return Err(err).context("failed to fetch the forwarder deployment"),
    }

    if ctx.restart.pending() {
        restart_forwarder_pods(ctx).await?;
        ctx.restart.clear();
    }
    Ok(())
}

/// Delete every forwarder pod so the deployment controller recreates them
/// with the rolled-over certificates. Best-effort trigger, not a direct pod
/// replacement.
async fn restart_forwarder_pods(ctx: &Context) -> Result<()> {
    let api: Api<Pod> = Api::namespaced(ctx.client.clone(), &ctx.config.namespace);
    let selector = format!("{SELECTOR_KEY}={SELECTOR_VALUE}");
    let pods = api
        .list(&ListParams::default().labels(&selector))
        .await
        .context("failed to list forwarder pods")?;

    for pod in pods {
        let name = pod.name_any();
        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => info!(pod = %name, "deleted forwarder pod for certificate rollover"),
            Err(kube::Error::Api(ref e)) if e.code == 404 => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to delete forwarder pod {name}"));
            }
        }
    }
    Ok(())
}

/// Delete the managed objects, deployment first, each individually
/// idempotent so a partially failed cleanup is safe to re-run.
async fn cleanup_managed_objects(ctx: &Context) -> Result<()> {
    info!("cleaning up managed forwarder objects");

    let deployments: Api<Deployment> = Api::namespaced(ctx.client.clone(), &ctx.config.namespace);
    delete_if_present(&deployments, FORWARDER_DEPLOYMENT_NAME, "Deployment").await?;

    let bindings: Api<ClusterRoleBinding> = Api::all(ctx.client.clone());
    delete_if_present(&bindings, CLUSTER_ROLE_BINDING_NAME, "ClusterRoleBinding").await?;

    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &ctx.config.namespace);
    delete_if_present(&configmaps, CA_CONFIGMAP_NAME, "ConfigMap").await?;

    Ok(())
}

/// Delete one object, treating not-found as success.
async fn delete_if_present<T>(api: &Api<T>, name: &str, kind: &str) -> Result<()>
where
    T: Clone + std::fmt::Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(name, kind, "deleted managed object");
            metrics::record_resource_deleted(kind);
            Ok(())
        }
        Err(kube::Error::Api(ref e)) if e.code == 404 => {
            debug!(name, kind, "managed object already deleted");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to delete {kind} {name}")),
    }
}

#[cfg(test)]
#[path = "addon_tests.rs"]
mod addon_tests;
