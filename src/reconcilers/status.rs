// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status conditions for the addon resource.
//!
//! A reconcile that reaches a decision point reports exactly one of four
//! condition kinds, each with a fixed (type, reason, message). The condition
//! list is always replaced wholesale with a single element; conditions are
//! never accumulated or merged with prior state, and re-reporting the same
//! kind rewrites the timestamp.
//!
//! Status writes are best-effort: a failure is logged and swallowed so it
//! never fails the reconcile that produced the status.

use chrono::Utc;
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;
use tracing::{debug, warn};

use crate::crd::{Condition, MetricsAddon};

/// The four terminal outcomes a reconcile can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionKind {
    /// The forwarder was deployed (or confirmed converged) successfully.
    Ready,
    /// Forwarding was scaled down because the addon disabled it.
    Disabled,
    /// A write against the store failed; the runtime will retry.
    Degraded,
    /// The platform has no monitoring stack to forward from.
    NotSupported,
}

impl ConditionKind {
    /// Condition type as written to the status.
    #[must_use]
    pub fn condition_type(self) -> &'static str {
        match self {
            Self::Ready => "Available",
            Self::Disabled => "Disabled",
            Self::Degraded => "Degraded",
            Self::NotSupported => "NotSupported",
        }
    }

    /// Programmatic reason for the condition.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ready => "Deployed",
            Self::Disabled => "Disabled",
            Self::Degraded => "Degraded",
            Self::NotSupported => "NotSupported",
        }
    }

    /// Human-readable message for the condition.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Ready => "Metrics forwarder deployed and functional",
            Self::Disabled => "enableMetrics is set to False",
            Self::Degraded => "Metrics forwarder deployment not successful",
            Self::NotSupported => "Metrics forwarding is not supported on this cluster",
        }
    }
}

/// Build the single current condition for a kind, stamped with the current
/// time.
#[must_use]
pub fn build_condition(kind: ConditionKind) -> Condition {
    Condition {
        r#type: kind.condition_type().to_string(),
        status: "True".to_string(),
        reason: Some(kind.reason().to_string()),
        message: Some(kind.message().to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Replace the addon's condition list with the single condition for `kind`.
///
/// The write is best-effort: a failure is logged, never propagated, so the
/// reconcile outcome is not masked by a status hiccup.
pub async fn report_status(api: &Api<MetricsAddon>, name: &str, kind: ConditionKind) {
    let condition = build_condition(kind);
    let patch = json!({ "status": { "conditions": [condition] } });
    match api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => debug!(name, kind = ?kind, "reported addon status"),
        Err(err) => warn!(name, kind = ?kind, error = %err, "failed to update addon status"),
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
