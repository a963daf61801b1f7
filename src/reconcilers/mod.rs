// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation controllers for the metrics forwarding addon.
//!
//! Three independently triggered reconcilers share the convergence
//! machinery in this module:
//!
//! 1. **Convergence** ([`reconcile_addon`]) - keeps the forwarder
//!    Deployment, its RBAC binding, and the CA-bundle ConfigMap converged
//!    with the hub addon's desired state.
//! 2. **Status mirror** ([`sync_status`]) - copies the locally computed
//!    status onto the hub-side addon copy.
//! 3. **Remote write** ([`reconcile_monitoring_config`]) - injects or
//!    removes the hub's forwarding target in the shared cluster monitoring
//!    document under optimistic concurrency.
//!
//! All three follow the standard controller pattern: each delivery
//! re-derives the full desired state from scratch, every write is
//! idempotent, and errors return to the runtime, which owns retry and
//! backoff.

pub mod addon;
pub mod finalizers;
pub mod monitoring_config;
pub mod status;
pub mod status_sync;

pub use addon::reconcile_addon;
pub use monitoring_config::reconcile_monitoring_config;
pub use status_sync::sync_status;
