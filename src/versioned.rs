// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Versioned access to shared configuration documents.
//!
//! The cluster monitoring ConfigMap is edited by this operator and by other
//! controllers nobody coordinates with. The only safe discipline is
//! read-merge-write under optimistic concurrency: every read captures the
//! store's version token, every write carries it back, and a conflict is a
//! typed, retryable error forcing the caller to re-read and re-merge. Writes
//! patch only the document key so unrelated keys in the same ConfigMap are
//! never touched.

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Errors from reading or writing a versioned document.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The document changed between read and write. The caller must re-read
    /// and re-merge from scratch; blindly retrying the same payload would
    /// clobber the concurrent edit.
    #[error("version conflict writing {0}: document changed since it was read")]
    Conflict(String),

    /// Any other store failure.
    #[error("store request failed: {0}")]
    Api(#[from] kube::Error),
}

impl StoreError {
    /// Whether the error is resolved by re-reading and re-merging.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// A document read from the store together with the version token required
/// to write it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedDocument {
    /// Raw document content under the data key.
    pub content: String,

    /// Version token captured at read time.
    pub version: Option<String>,
}

/// Read one data key out of a ConfigMap, capturing its version token.
///
/// A missing ConfigMap yields `None`; a ConfigMap without the key yields an
/// empty document, so callers treat both as "no entries" rather than failing.
///
/// # Errors
///
/// Returns [`StoreError::Api`] for any store failure other than not-found.
pub async fn read_document(
    api: &Api<ConfigMap>,
    name: &str,
    key: &str,
) -> Result<Option<VersionedDocument>, StoreError> {
    match api.get(name).await {
        Ok(cm) => {
            let content = cm
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .cloned()
                .unwrap_or_default();
            Ok(Some(VersionedDocument {
                content,
                version: cm.metadata.resource_version,
            }))
        }
        Err(kube::Error::Api(ref e)) if e.code == 404 => {
            debug!(name, "configmap not found");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Write one data key back, guarded by the version token from the read.
///
/// With a version the write is a merge patch carrying the token, so a
/// concurrent edit surfaces as [`StoreError::Conflict`] and unrelated data
/// keys survive. Without a version a fresh ConfigMap is created; losing the
/// creation race is also a conflict.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] when the store rejects the version token
/// and [`StoreError::Api`] for any other failure.
pub async fn write_document(
    api: &Api<ConfigMap>,
    name: &str,
    key: &str,
    content: &str,
    version: Option<&str>,
) -> Result<(), StoreError> {
    let result = match version {
        Some(version) => {
            let patch = json!({
                "metadata": { "resourceVersion": version },
                "data": { key: content },
            });
            api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
        }
        None => {
            let cm = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(key.to_string(), content.to_string())])),
                ..Default::default()
            };
            api.create(&PostParams::default(), &cm).await
        }
    };

    match result {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ref e)) if e.code == 409 => {
            Err(StoreError::Conflict(name.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}
