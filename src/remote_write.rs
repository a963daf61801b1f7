// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote-write entry management for the shared cluster monitoring document.
//!
//! The platform monitoring ConfigMap is owned jointly by this operator and
//! other, uncoordinated writers. This module edits exactly one remote-write
//! entry inside it and leaves every other entry and every unrelated section
//! structurally untouched. The document is handled leniently as a YAML value
//! rather than a typed config so sections this operator does not know about
//! survive the round trip.
//!
//! Concurrency control is the caller's job: reads capture the ConfigMap's
//! resourceVersion and writes carry it back (see [`crate::versioned`]).

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::constants::{
    CLUSTER_ID_LABEL, REMOTE_WRITE_PROTOCOL, REMOTE_WRITE_URL_SUBPATH,
};
use crate::crd::RelabelRule;

/// Top-level section of the monitoring document owned by the platform
/// Prometheus.
const PROMETHEUS_SECTION: &str = "prometheusK8s";

/// Key of the remote-write list inside the Prometheus section.
const REMOTE_WRITE_KEY: &str = "remoteWrite";

/// One forwarding target inside the shared monitoring document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWriteEntry {
    /// Normalized upload URL.
    pub url: String,

    /// Relabel rules applied before upload, caller rules first, the
    /// synthesized cluster-identity rule last.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_relabel_configs: Vec<RelabelRule>,
}

/// Errors from merging into the shared monitoring document.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The document failed to parse; nothing was written.
    #[error("malformed monitoring configuration document: {0}")]
    Malformed(#[source] serde_yaml::Error),

    /// The document parsed but its top level is not a mapping.
    #[error("monitoring configuration document is not a mapping")]
    NotAMapping,

    /// An entry could not be encoded or decoded.
    #[error("invalid remote-write entry: {0}")]
    InvalidEntry(#[source] serde_yaml::Error),
}

/// Normalize an upload endpoint before matching and storage.
///
/// Prefixes `http://` when the endpoint has no scheme and appends the write
/// sub-path when it is missing.
///
/// # Example
///
/// ```
/// use forwardy::remote_write::normalize_endpoint;
///
/// assert_eq!(
///     normalize_endpoint("hub.example.com"),
///     "http://hub.example.com/api/metrics/v1/write"
/// );
/// ```
#[must_use]
pub fn normalize_endpoint(endpoint: &str) -> String {
    let mut url = endpoint.to_string();
    if !url.starts_with("http") {
        url = format!("{REMOTE_WRITE_PROTOCOL}{url}");
    }
    if !url.ends_with(REMOTE_WRITE_URL_SUBPATH) {
        url.push_str(REMOTE_WRITE_URL_SUBPATH);
    }
    url
}

/// The synthesized relabel rule stamping the cluster identity onto every
/// forwarded series.
#[must_use]
pub fn cluster_id_rule(cluster_id: &str) -> RelabelRule {
    RelabelRule {
        source_labels: Some(vec!["__name__".to_string()]),
        target_label: Some(CLUSTER_ID_LABEL.to_string()),
        replacement: Some(cluster_id.to_string()),
        regex: None,
        action: None,
    }
}

/// Build the entry for this spoke: normalized endpoint, caller rules, plus
/// the cluster-identity rule appended last (never deduplicated against the
/// caller rules).
#[must_use]
pub fn build_entry(endpoint: &str, rules: &[RelabelRule], cluster_id: &str) -> RemoteWriteEntry {
    let mut write_relabel_configs = rules.to_vec();
    write_relabel_configs.push(cluster_id_rule(cluster_id));
    RemoteWriteEntry {
        url: normalize_endpoint(endpoint),
        write_relabel_configs,
    }
}

/// Read the remote-write entries out of a document.
///
/// An absent Prometheus section or remote-write list means no entries, not an
/// error.
///
/// # Errors
///
/// Returns [`MergeError::Malformed`] when the document does not parse,
/// [`MergeError::NotAMapping`] when its top level is not a mapping, and
/// [`MergeError::InvalidEntry`] when an entry cannot be decoded.
pub fn remote_write_entries(document: &str) -> Result<Vec<RemoteWriteEntry>, MergeError> {
    let doc = parse_document(document)?;
    let Some(seq) = remote_write_seq(&doc) else {
        return Ok(Vec::new());
    };
    seq.iter()
        .map(|v| serde_yaml::from_value(v.clone()).map_err(MergeError::InvalidEntry))
        .collect()
}

/// Merge one remote-write target into the shared monitoring document.
///
/// With an entry, the first existing entry whose URL contains
/// `target_url_substring` is replaced in place; later matches are left alone.
/// Without a match the entry is appended. With `None` the first matching
/// entry is removed, and sections this operator emptied out are pruned so an
/// inject/remove pair round-trips to the original document.
///
/// Returns the re-serialized document; when nothing changed, the input is
/// returned verbatim.
///
/// # Errors
///
/// Returns [`MergeError::Malformed`] or [`MergeError::NotAMapping`] when the
/// document cannot be parsed, and [`MergeError::InvalidEntry`] when the new
/// entry cannot be encoded. No partial result is produced on error.
pub fn merge_remote_write(
    document: &str,
    target_url_substring: &str,
    entry: Option<&RemoteWriteEntry>,
) -> Result<String, MergeError> {
    let mut doc = parse_document(document)?;

    let changed = match entry {
        Some(entry) => {
            let new_value = serde_yaml::to_value(entry).map_err(MergeError::InvalidEntry)?;
            insert_entry(&mut doc, target_url_substring, new_value)
        }
        None => remove_entry(&mut doc, target_url_substring),
    };

    if !changed {
        return Ok(document.to_string());
    }
    serde_yaml::to_string(&doc).map_err(MergeError::InvalidEntry)
}

fn parse_document(document: &str) -> Result<Mapping, MergeError> {
    if document.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(document).map_err(MergeError::Malformed)?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(MergeError::NotAMapping),
    }
}

fn remote_write_seq(doc: &Mapping) -> Option<&Vec<Value>> {
    doc.get(PROMETHEUS_SECTION)?
        .as_mapping()?
        .get(REMOTE_WRITE_KEY)?
        .as_sequence()
}

fn entry_matches(value: &Value, target: &str) -> bool {
    value
        .get("url")
        .and_then(Value::as_str)
        .is_some_and(|url| url.contains(target))
}

/// Replace the first matching entry in place, or append. Sections are
/// synthesized only here, where a write is certain to happen.
fn insert_entry(doc: &mut Mapping, target: &str, new_value: Value) -> bool {
    let section = doc
        .entry(Value::from(PROMETHEUS_SECTION))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    let Some(section) = section.as_mapping_mut() else {
        return false;
    };
    let seq = section
        .entry(Value::from(REMOTE_WRITE_KEY))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    let Some(seq) = seq.as_sequence_mut() else {
        return false;
    };

    for existing in seq.iter_mut() {
        if entry_matches(existing, target) {
            if *existing == new_value {
                return false;
            }
            *existing = new_value;
            return true;
        }
    }
    seq.push(new_value);
    true
}

/// Remove the first matching entry; a document without a match is a no-op.
fn remove_entry(doc: &mut Mapping, target: &str) -> bool {
    let Some(section) = doc
        .get_mut(PROMETHEUS_SECTION)
        .and_then(Value::as_mapping_mut)
    else {
        return false;
    };
    let Some(seq) = section
        .get_mut(REMOTE_WRITE_KEY)
        .and_then(Value::as_sequence_mut)
    else {
        return false;
    };

    let Some(index) = seq.iter().position(|v| entry_matches(v, target)) else {
        return false;
    };
    seq.remove(index);

    // Prune what this removal emptied out so the document round-trips.
    if seq.is_empty() {
        section.remove(REMOTE_WRITE_KEY);
    }
    if section.is_empty() {
        doc.remove(PROMETHEUS_SECTION);
    }
    true
}

#[cfg(test)]
#[path = "remote_write_tests.rs"]
mod remote_write_tests;
