// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use forwardy::{
    config::OperatorConfig,
    constants::{
        ADDON_NAME, ALLOWLIST_CONFIGMAP_NAME, ERROR_REQUEUE_DURATION_SECS,
        FORWARDER_DEPLOYMENT_NAME, HUB_INFO_SECRET_NAME, MTLS_SECRET_NAME,
        RESYNC_REQUEUE_DURATION_SECS, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::MetricsAddon,
    event_filter::{FilterState, Payload, WatchRule, WatchedKind},
    identity::NamespaceUidSource,
    metrics,
    reconcilers::{reconcile_addon, reconcile_monitoring_config, sync_status},
    versioned::StoreError,
};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::{controller::Action, reflector::ObjectRef, watcher, Controller};
use kube::{Api, Client, ResourceExt};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

/// Controller context pairing the shared context with the trigger-level
/// event filter for the controller's root object.
type FilteredCtx = (Arc<Context>, Arc<Mutex<FilterState>>);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("forwardy-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting metrics forwarding addon operator");

    let config = OperatorConfig::from_env()?;
    debug!(?config, "Operator configuration resolved");

    debug!("Initializing spoke cluster client");
    let client = Client::try_default().await?;

    debug!("Initializing hub cluster client");
    let hub_client = create_hub_client(&config).await?;

    let identity = Arc::new(NamespaceUidSource::new(client.clone()));
    let ctx = Arc::new(Context::new(client, hub_client, config, identity));

    info!("Starting all controllers");

    // Controllers should never exit - if one fails, we log it and exit the main process
    tokio::select! {
        result = run_addon_controller(ctx.clone()) => {
            error!("CRITICAL: addon convergence controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("addon convergence controller exited unexpectedly without error")
        }
        result = run_status_controller(ctx.clone()) => {
            error!("CRITICAL: status mirror controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("status mirror controller exited unexpectedly without error")
        }
        result = run_monitoring_config_controller(ctx.clone()) => {
            error!("CRITICAL: remote-write controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("remote-write controller exited unexpectedly without error")
        }
        result = metrics::serve_metrics() => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }
}

/// Build the client for the hub cluster from the mounted kubeconfig.
async fn create_hub_client(config: &OperatorConfig) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(&config.hub_kubeconfig_path)?;
    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(Client::try_from(client_config)?)
}

fn lock(filter: &Mutex<FilterState>) -> std::sync::MutexGuard<'_, FilterState> {
    filter.lock().unwrap_or_else(PoisonError::into_inner)
}

fn watch_rule(kind: WatchedKind, name: &str, namespace: &str, react_to_delete: bool) -> WatchRule {
    WatchRule {
        kind,
        name: name.to_string(),
        namespace: namespace.to_string(),
        react_to_create: true,
        react_to_update: true,
        react_to_delete,
    }
}

/// Run the addon convergence controller.
///
/// The root watch is the hub-side addon; secondary watches on the hub-info
/// Secret, the mTLS certificate Secret, the allow-list ConfigMap, and the
/// forwarder Deployment map back to the single addon key. Each watch runs
/// through the event filter so version-only churn does not trigger
/// reconciles, and the certificate watch raises the pending-restart flag
/// the convergence engine consumes.
async fn run_addon_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting addon convergence controller");

    let namespace = ctx.config.namespace.clone();
    let hub_namespace = ctx.config.hub_namespace.clone();

    let hub_api: Api<MetricsAddon> = Api::namespaced(ctx.hub_client.clone(), &hub_namespace);
    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &namespace);
    let deployments: Api<Deployment> = Api::namespaced(ctx.client.clone(), &namespace);

    let addon_filter = Arc::new(Mutex::new(FilterState::new(watch_rule(
        WatchedKind::Addon,
        ADDON_NAME,
        &hub_namespace,
        false,
    ))));
    let hub_info_filter = Arc::new(Mutex::new(FilterState::new(watch_rule(
        WatchedKind::HubInfoSecret,
        HUB_INFO_SECRET_NAME,
        &namespace,
        true,
    ))));
    let cert_filter = Arc::new(Mutex::new(FilterState::new(watch_rule(
        WatchedKind::MtlsCertSecret,
        MTLS_SECRET_NAME,
        &namespace,
        true,
    ))));
    let allow_filter = Arc::new(Mutex::new(FilterState::new(watch_rule(
        WatchedKind::AllowListConfigMap,
        ALLOWLIST_CONFIGMAP_NAME,
        &namespace,
        true,
    ))));
    let deploy_filter = Arc::new(Mutex::new(FilterState::new(watch_rule(
        WatchedKind::ForwarderDeployment,
        FORWARDER_DEPLOYMENT_NAME,
        &namespace,
        true,
    ))));

    Controller::new(hub_api, watcher::Config::default())
        .watches(secrets, watcher::Config::default(), {
            let hub_info_filter = hub_info_filter.clone();
            let cert_filter = cert_filter.clone();
            let restart = ctx.restart.clone();
            let hub_namespace = hub_namespace.clone();
            move |secret: Secret| {
                let name = secret.name_any();
                let ns = secret.namespace().unwrap_or_default();
                let version = secret.resource_version().unwrap_or_default();
                let mut relevant =
                    lock(&hub_info_filter).observe(&name, &ns, &version, Payload::Opaque);
                if lock(&cert_filter).observe(&name, &ns, &version, Payload::Opaque) {
                    debug!("certificate secret changed, requesting forwarder restart");
                    restart.request();
                    relevant = true;
                }
                relevant.then(|| ObjectRef::<MetricsAddon>::new(ADDON_NAME).within(&hub_namespace))
            }
        })
        .watches(configmaps, watcher::Config::default(), {
            let allow_filter = allow_filter.clone();
            let hub_namespace = hub_namespace.clone();
            move |cm: ConfigMap| {
                let name = cm.name_any();
                let ns = cm.namespace().unwrap_or_default();
                let version = cm.resource_version().unwrap_or_default();
                lock(&allow_filter)
                    .observe(&name, &ns, &version, Payload::Opaque)
                    .then(|| ObjectRef::<MetricsAddon>::new(ADDON_NAME).within(&hub_namespace))
            }
        })
        .watches(deployments, watcher::Config::default(), {
            let deploy_filter = deploy_filter.clone();
            let hub_namespace = hub_namespace.clone();
            move |deployment: Deployment| {
                let name = deployment.name_any();
                let ns = deployment.namespace().unwrap_or_default();
                let version = deployment.resource_version().unwrap_or_default();
                let payload = Payload::Deployment(deployment.spec.clone());
                lock(&deploy_filter)
                    .observe(&name, &ns, &version, payload)
                    .then(|| ObjectRef::<MetricsAddon>::new(ADDON_NAME).within(&hub_namespace))
            }
        })
        .run(
            reconcile_addon_wrapper,
            error_policy,
            Arc::new((ctx.clone(), addon_filter)),
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for the addon convergence controller.
async fn reconcile_addon_wrapper(
    addon: Arc<MetricsAddon>,
    ctx: Arc<FilteredCtx>,
) -> Result<Action, ReconcileError> {
    let (ctx, filter) = (&ctx.0, &ctx.1);
    let name = addon.name_any();
    let namespace = addon.namespace().unwrap_or_default();
    let version = addon.resource_version().unwrap_or_default();
    let payload = Payload::Addon {
        spec: addon.spec.clone(),
        deleting: addon.metadata.deletion_timestamp.is_some(),
    };
    if !lock(filter).observe_delivery(&name, &namespace, &version, payload) {
        debug!("addon changed in version only, skipping reconcile");
        return Ok(Action::requeue(Duration::from_secs(
            RESYNC_REQUEUE_DURATION_SECS,
        )));
    }

    let start = Instant::now();
    match reconcile_addon(ctx, &addon).await {
        Ok(()) => {
            metrics::record_reconciliation_success("MetricsAddon", start.elapsed());
            info!("Successfully reconciled MetricsAddon: {name}");
            Ok(Action::requeue(Duration::from_secs(
                RESYNC_REQUEUE_DURATION_SECS,
            )))
        }
        Err(e) => {
            metrics::record_reconciliation_error("MetricsAddon", start.elapsed());
            // Forget the observation so the retry is not filtered as an
            // already-handled version.
            lock(filter).forget(&name, &namespace);
            error!("Failed to reconcile MetricsAddon: {e:#}");
            Err(e.into())
        }
    }
}

/// Run the status mirror controller.
///
/// Roots on the spoke-local addon and copies its status onto the hub copy
/// whenever the local status structurally changes.
async fn run_status_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting status mirror controller");

    let namespace = ctx.config.namespace.clone();
    let local_api: Api<MetricsAddon> = Api::namespaced(ctx.client.clone(), &namespace);
    let status_filter = Arc::new(Mutex::new(FilterState::new(watch_rule(
        WatchedKind::AddonStatus,
        ADDON_NAME,
        &namespace,
        false,
    ))));

    Controller::new(local_api, watcher::Config::default())
        .run(
            sync_status_wrapper,
            error_policy,
            Arc::new((ctx.clone(), status_filter)),
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for the status mirror controller.
async fn sync_status_wrapper(
    addon: Arc<MetricsAddon>,
    ctx: Arc<FilteredCtx>,
) -> Result<Action, ReconcileError> {
    let (ctx, filter) = (&ctx.0, &ctx.1);
    let name = addon.name_any();
    let namespace = addon.namespace().unwrap_or_default();
    let version = addon.resource_version().unwrap_or_default();
    let payload = Payload::AddonStatus(addon.status.clone().unwrap_or_default());
    if !lock(filter).observe_delivery(&name, &namespace, &version, payload) {
        debug!("local addon status unchanged, skipping mirror");
        return Ok(Action::requeue(Duration::from_secs(
            RESYNC_REQUEUE_DURATION_SECS,
        )));
    }

    let start = Instant::now();
    match sync_status(ctx).await {
        Ok(()) => {
            metrics::record_reconciliation_success("MetricsAddonStatus", start.elapsed());
            Ok(Action::requeue(Duration::from_secs(
                RESYNC_REQUEUE_DURATION_SECS,
            )))
        }
        Err(e) => {
            metrics::record_reconciliation_error("MetricsAddonStatus", start.elapsed());
            lock(filter).forget(&name, &namespace);
            error!("Failed to mirror addon status: {e:#}");
            Err(e.into())
        }
    }
}

/// Run the remote-write companion controller.
async fn run_monitoring_config_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting remote-write controller");

    let hub_api: Api<MetricsAddon> =
        Api::namespaced(ctx.hub_client.clone(), &ctx.config.hub_namespace);

    Controller::new(hub_api, watcher::Config::default())
        .run(
            reconcile_monitoring_config_wrapper,
            error_policy,
            ctx.clone(),
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for the remote-write controller.
async fn reconcile_monitoring_config_wrapper(
    addon: Arc<MetricsAddon>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    match reconcile_monitoring_config(&ctx, &addon).await {
        Ok(()) => {
            metrics::record_reconciliation_success("MonitoringConfig", start.elapsed());
            Ok(Action::requeue(Duration::from_secs(
                RESYNC_REQUEUE_DURATION_SECS,
            )))
        }
        Err(e) => {
            metrics::record_reconciliation_error("MonitoringConfig", start.elapsed());
            if e.downcast_ref::<StoreError>()
                .is_some_and(StoreError::is_conflict)
            {
                // Concurrent edit by another writer; the retry re-reads and
                // re-merges from scratch.
                warn!("Monitoring configuration changed underneath, retrying: {e:#}");
            } else {
                error!("Failed to reconcile the monitoring configuration: {e:#}");
            }
            Err(e.into())
        }
    }
}

/// Error policy shared by all controllers.
fn error_policy<C>(_resource: Arc<MetricsAddon>, _err: &ReconcileError, _ctx: Arc<C>) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
