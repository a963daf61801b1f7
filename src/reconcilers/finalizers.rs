// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer lifecycle management.
//!
//! A cleanup marker on the addon resource gates its physical deletion: the
//! store refuses to remove the object while the marker is present, and this
//! operator only removes the marker after every managed object has been
//! confirmed deleted. The lifecycle is an explicit state machine observed
//! from object metadata with a total transition function, so an illegal
//! combination (marker removed while dependents still exist) has no
//! representation the reconciler could act on.
//!
//! The add/remove helpers take a caller-supplied [`Api`] so markers on
//! hub-side objects are managed through the hub client.

use anyhow::Result;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// Observed finalizer lifecycle state of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizerState {
    /// Not deleting, marker absent: first observation of the resource.
    Absent,
    /// Not deleting, marker present: normal operation.
    Present,
    /// Deletion requested while the marker is present: cleanup is pending.
    Cleaning,
    /// Deletion requested and the marker is gone: the store finishes the
    /// removal on its own.
    Removed,
}

/// What the reconciler must do for an observed finalizer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizerAction {
    /// Add the marker, persist, and stop this reconcile; the resulting
    /// update event re-triggers it.
    AddMarker,
    /// Continue with normal convergence.
    Proceed,
    /// Delete the managed objects, then remove the marker.
    RunCleanup,
    /// Nothing left to do for this resource.
    Nothing,
}

impl FinalizerState {
    /// Observe the state from object metadata.
    #[must_use]
    pub fn observe(meta: &ObjectMeta, marker: &str) -> Self {
        let has_marker = meta
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|m| m == marker));
        match (meta.deletion_timestamp.is_some(), has_marker) {
            (false, false) => Self::Absent,
            (false, true) => Self::Present,
            (true, true) => Self::Cleaning,
            (true, false) => Self::Removed,
        }
    }

    /// Total transition to the action the reconciler must take.
    #[must_use]
    pub fn plan(self) -> FinalizerAction {
        match self {
            Self::Absent => FinalizerAction::AddMarker,
            Self::Present => FinalizerAction::Proceed,
            Self::Cleaning => FinalizerAction::RunCleanup,
            Self::Removed => FinalizerAction::Nothing,
        }
    }
}

/// Add a cleanup marker to a resource if not already present. Idempotent.
///
/// # Errors
///
/// Returns an error when the patch against the store fails.
pub async fn ensure_finalizer<T>(api: &Api<T>, resource: &T, marker: &str) -> Result<()>
where
    T: Resource<DynamicType = ()>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned,
{
    if resource.finalizers().iter().any(|m| m == marker) {
        return Ok(());
    }
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(marker.to_string());

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(
        &resource.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;

    info!(
        marker,
        name = %resource.name_any(),
        kind = %T::kind(&()),
        "added cleanup marker"
    );
    Ok(())
}

/// Remove a cleanup marker from a resource. Idempotent.
///
/// This is the sole permitted way to let the store complete the resource's
/// deletion; callers invoke it only after cleanup succeeded.
///
/// # Errors
///
/// Returns an error when the patch against the store fails; the marker stays
/// in place and cleanup re-runs on the next delivery.
pub async fn remove_finalizer<T>(api: &Api<T>, resource: &T, marker: &str) -> Result<()>
where
    T: Resource<DynamicType = ()>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned,
{
    if !resource.finalizers().iter().any(|m| m == marker) {
        return Ok(());
    }
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.retain(|m| m != marker);

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(
        &resource.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;

    info!(
        marker,
        name = %resource.name_any(),
        kind = %T::kind(&()),
        "removed cleanup marker"
    );
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
