// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Relevance filtering for watch events.
//!
//! The controller runtime delivers every change to every watched object; most
//! of them are noise. This module decides, per watched kind, whether an
//! observed change is relevant enough to trigger a reconcile: create and
//! delete events are matched by name and namespace, and update events
//! additionally require the store's version token to have moved and, for
//! kinds with a structural check, the meaningful payload to actually differ.
//! A status-only echo bumps the version token without changing the payload
//! and must not re-trigger the reconcile that caused it.
//!
//! Structural checks live in a dispatch table keyed by [`WatchedKind`]; a new
//! kind gets a table entry, not a type switch.

use k8s_openapi::api::apps::v1::DeploymentSpec;
use std::collections::HashMap;

use crate::crd::{MetricsAddonSpec, MetricsAddonStatus};

/// The object kinds this operator watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchedKind {
    /// Hub connection Secret.
    HubInfoSecret,
    /// mTLS certificate Secret; updates force a forwarder restart.
    MtlsCertSecret,
    /// Metric allow-list ConfigMap.
    AllowListConfigMap,
    /// The managed forwarder Deployment.
    ForwarderDeployment,
    /// The hub addon's spec and deletion intent.
    Addon,
    /// The spoke-local addon's status, mirrored to the hub.
    AddonStatus,
}

/// The structurally meaningful payload of a watched object.
///
/// Kinds whose every versioned change matters carry [`Payload::Opaque`];
/// the rest carry the fields their structural check compares.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Forwarder Deployment spec.
    Deployment(Option<DeploymentSpec>),
    /// Addon spec plus deletion intent.
    Addon {
        /// Desired state from the hub.
        spec: MetricsAddonSpec,
        /// Whether a deletion timestamp is set.
        deleting: bool,
    },
    /// Addon status as written by the convergence engine.
    AddonStatus(MetricsAddonStatus),
    /// Kinds without a structural check.
    Opaque,
}

/// Which events a watched kind reacts to, and for which object.
#[derive(Clone, Debug)]
pub struct WatchRule {
    /// Kind this rule filters; selects the structural check.
    pub kind: WatchedKind,
    /// Exact object name the rule matches.
    pub name: String,
    /// Exact namespace the rule matches.
    pub namespace: String,
    /// React to create events.
    pub react_to_create: bool,
    /// React to update events.
    pub react_to_update: bool,
    /// React to delete events.
    pub react_to_delete: bool,
}

/// One observed change on a watched object.
#[derive(Clone, Debug)]
pub enum Event {
    /// The object appeared.
    Created {
        /// Object name.
        name: String,
        /// Object namespace.
        namespace: String,
    },
    /// The object changed; carries the before/after versions and payloads.
    Updated(Box<UpdateEvent>),
    /// The object disappeared.
    Deleted {
        /// Object name.
        name: String,
        /// Object namespace.
        namespace: String,
    },
}

/// Before/after state of an update event.
#[derive(Clone, Debug)]
pub struct UpdateEvent {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
    /// Version token before the change.
    pub old_version: String,
    /// Version token after the change.
    pub new_version: String,
    /// Payload before the change.
    pub old_payload: Payload,
    /// Payload after the change.
    pub new_payload: Payload,
}

/// Returns true when the payloads structurally differ.
type StructuralCheck = fn(&Payload, &Payload) -> bool;

/// Structural-difference checks per watched kind. Kinds without an entry
/// trigger on any version-token change.
const STRUCTURAL_CHECKS: &[(WatchedKind, StructuralCheck)] = &[
    (WatchedKind::ForwarderDeployment, deployment_spec_differs),
    (WatchedKind::Addon, addon_differs),
    (WatchedKind::AddonStatus, addon_status_differs),
];

fn deployment_spec_differs(old: &Payload, new: &Payload) -> bool {
    match (old, new) {
        (Payload::Deployment(a), Payload::Deployment(b)) => a != b,
        _ => true,
    }
}

fn addon_differs(old: &Payload, new: &Payload) -> bool {
    match (old, new) {
        (
            Payload::Addon {
                spec: a,
                deleting: da,
            },
            Payload::Addon {
                spec: b,
                deleting: db,
            },
        ) => a != b || da != db,
        _ => true,
    }
}

fn addon_status_differs(old: &Payload, new: &Payload) -> bool {
    match (old, new) {
        (Payload::AddonStatus(a), Payload::AddonStatus(b)) => a != b,
        _ => true,
    }
}

fn structural_check(kind: WatchedKind) -> Option<StructuralCheck> {
    STRUCTURAL_CHECKS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, check)| *check)
}

/// Decide whether an observed change should trigger a reconcile.
#[must_use]
pub fn should_reconcile(rule: &WatchRule, event: &Event) -> bool {
    match event {
        Event::Created { name, namespace } => {
            rule.react_to_create && rule.matches(name, namespace)
        }
        Event::Deleted { name, namespace } => {
            rule.react_to_delete && rule.matches(name, namespace)
        }
        Event::Updated(update) => {
            if !rule.react_to_update || !rule.matches(&update.name, &update.namespace) {
                return false;
            }
            if update.old_version == update.new_version {
                return false;
            }
            match structural_check(rule.kind) {
                Some(differs) => differs(&update.old_payload, &update.new_payload),
                None => true,
            }
        }
    }
}

impl WatchRule {
    fn matches(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace == namespace
    }
}

/// Adapts the pure filter to single-sided streams.
///
/// Watch streams and reconcile triggers deliver only the current object;
/// the filter's update contract needs the previous one. `FilterState`
/// remembers the last observed (version, payload) per object and synthesizes
/// the create/update event for [`should_reconcile`].
#[derive(Debug)]
pub struct FilterState {
    rule: WatchRule,
    last: HashMap<(String, String), (String, Payload)>,
}

impl FilterState {
    /// Create the state for one watch rule.
    #[must_use]
    pub fn new(rule: WatchRule) -> Self {
        Self {
            rule,
            last: HashMap::new(),
        }
    }

    /// Observe an object from a watch stream and decide relevance.
    ///
    /// The first sighting of an object is a create; later sightings are
    /// updates against the remembered state.
    pub fn observe(
        &mut self,
        name: &str,
        namespace: &str,
        version: &str,
        payload: Payload,
    ) -> bool {
        let key = (namespace.to_string(), name.to_string());
        let event = match self.last.get(&key) {
            None => Event::Created {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            Some((old_version, old_payload)) => Event::Updated(Box::new(UpdateEvent {
                name: name.to_string(),
                namespace: namespace.to_string(),
                old_version: old_version.clone(),
                new_version: version.to_string(),
                old_payload: old_payload.clone(),
                new_payload: payload.clone(),
            })),
        };
        let relevant = should_reconcile(&self.rule, &event);
        self.last.insert(key, (version.to_string(), payload));
        relevant
    }

    /// Observe a reconcile delivery and decide relevance.
    ///
    /// A redelivery of an already-seen version is the runtime's resync or
    /// retry path and is let through; only a version change without a
    /// structural change is suppressed.
    pub fn observe_delivery(
        &mut self,
        name: &str,
        namespace: &str,
        version: &str,
        payload: Payload,
    ) -> bool {
        let key = (namespace.to_string(), name.to_string());
        if self.last.get(&key).is_some_and(|(v, _)| v == version) {
            return self.rule.matches(name, namespace);
        }
        self.observe(name, namespace, version, payload)
    }

    /// Drop the remembered state for an object so its next delivery passes.
    ///
    /// Called after a failed reconcile: the retry arrives with the same
    /// version and must not be filtered as already handled.
    pub fn forget(&mut self, name: &str, namespace: &str) {
        self.last
            .remove(&(namespace.to_string(), name.to_string()));
    }
}

#[cfg(test)]
#[path = "event_filter_tests.rs"]
mod event_filter_tests;
