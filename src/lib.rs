// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Forwardy - Metrics Forwarding Addon Operator for Kubernetes
//!
//! Forwardy is a Kubernetes operator written in Rust that runs on a "spoke"
//! cluster and keeps a metrics-forwarding Deployment, its supporting
//! RBAC/ConfigMap objects, the shared cluster monitoring configuration, and
//! a cross-cluster status record converged with the desired state published
//! by a "hub" cluster.
//!
//! ## Overview
//!
//! This library provides the core functionality for the forwardy operator,
//! including:
//!
//! - The `MetricsAddon` Custom Resource Definition (CRD)
//! - Reconciliation logic for the forwarder Deployment and its dependents
//! - Merge logic for the shared cluster monitoring document
//! - Status propagation between the spoke and hub clusters
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types for the addon
//! - [`reconcilers`] - Reconciliation logic for each controller
//! - [`forwarder_resources`] - Desired-state builders for managed objects
//! - [`remote_write`] - Remote-write entry merging for the shared monitoring
//!   document
//! - [`event_filter`] - Relevance filtering for watch events
//! - [`versioned`] - Optimistic-concurrency access to shared documents
//! - [`context`] - Shared context passed to all controllers
//!
//! ## Example
//!
//! ```rust,no_run
//! use forwardy::crd::MetricsAddonSpec;
//!
//! // Desired state as published by the hub
//! let spec = MetricsAddonSpec {
//!     enable_metrics: true,
//!     interval: Some("30s".to_string()),
//!     tls_config: None,
//!     external_labels: None,
//!     write_relabel_configs: None,
//! };
//! ```
//!
//! ## Features
//!
//! - **Idempotent convergence** - duplicate or out-of-order deliveries
//!   converge to the same result with no extra writes
//! - **Finalizer-gated cleanup** - managed objects are confirmed deleted
//!   before the addon resource can go away
//! - **Shared-document safety** - unrelated remote-write entries and
//!   sections survive every merge unchanged

pub mod allowlist;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod duration;
pub mod event_filter;
pub mod forwarder_resources;
pub mod hub;
pub mod identity;
pub mod metrics;
pub mod reconcilers;
pub mod remote_write;
pub mod versioned;
