// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every controller receives an `Arc<Context>` holding the spoke and hub
//! Kubernetes clients, the process-wide configuration, and the cluster
//! identity source. The context also carries the pending-restart flag the
//! certificate watch raises for the convergence engine to consume.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kube::Client;

use crate::config::OperatorConfig;
use crate::identity::ClusterIdentitySource;

/// Coalescing restart request shared between the certificate watch and the
/// convergence engine.
///
/// The watch raises the flag when the mTLS Secret changes; the engine deletes
/// the forwarder pods and clears it only after the deletes succeed, so a
/// failed reconcile retries the restart instead of losing it.
#[derive(Clone, Default)]
pub struct RestartFlag(Arc<AtomicBool>);

impl RestartFlag {
    /// Request a forwarder pod restart on the next reconcile.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a restart request is pending. Does not consume the request.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the pending request after the pods have been deleted.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Client for the spoke cluster the operator runs on
    pub client: Client,

    /// Client for the hub cluster holding the authoritative addon
    pub hub_client: Client,

    /// Process-wide configuration, constructed once at startup
    pub config: Arc<OperatorConfig>,

    /// Source of the externally observed cluster identity
    pub identity: Arc<dyn ClusterIdentitySource>,

    /// Pending forwarder restart request raised by the certificate watch
    pub restart: RestartFlag,
}

impl Context {
    /// Create a new context.
    #[must_use]
    pub fn new(
        client: Client,
        hub_client: Client,
        config: OperatorConfig,
        identity: Arc<dyn ClusterIdentitySource>,
    ) -> Self {
        Self {
            client,
            hub_client,
            config: Arc::new(config),
            identity,
            restart: RestartFlag::default(),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
