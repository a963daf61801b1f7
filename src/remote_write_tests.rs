// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `remote_write.rs`

#[cfg(test)]
mod tests {
    use crate::crd::RelabelRule;
    use crate::remote_write::{
        build_entry, cluster_id_rule, merge_remote_write, normalize_endpoint,
        remote_write_entries, MergeError, RemoteWriteEntry,
    };
    use serde_yaml::Value;

    const HUB_URL: &str = "http://hub.example.com/api/metrics/v1/write";

    fn parse(document: &str) -> Value {
        serde_yaml::from_str(document).unwrap()
    }

    fn sample_entry(url: &str) -> RemoteWriteEntry {
        RemoteWriteEntry {
            url: url.to_string(),
            write_relabel_configs: vec![cluster_id_rule("cluster-1")],
        }
    }

    #[test]
    fn test_normalize_adds_scheme_and_subpath() {
        assert_eq!(normalize_endpoint("hub.example.com"), HUB_URL);
    }

    #[test]
    fn test_normalize_keeps_existing_scheme() {
        assert_eq!(
            normalize_endpoint("https://hub.example.com"),
            "https://hub.example.com/api/metrics/v1/write"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        assert_eq!(normalize_endpoint(HUB_URL), HUB_URL);
    }

    #[test]
    fn test_cluster_id_rule_shape() {
        let rule = cluster_id_rule("abc-123");
        assert_eq!(rule.source_labels, Some(vec!["__name__".to_string()]));
        assert_eq!(rule.target_label, Some("cluster_id".to_string()));
        assert_eq!(rule.replacement, Some("abc-123".to_string()));
    }

    #[test]
    fn test_build_entry_appends_identity_rule_last() {
        let caller_rule = RelabelRule {
            target_label: Some("tenant".to_string()),
            replacement: Some("blue".to_string()),
            ..Default::default()
        };
        let entry = build_entry("hub.example.com", &[caller_rule.clone()], "cluster-1");
        assert_eq!(entry.url, HUB_URL);
        assert_eq!(entry.write_relabel_configs.len(), 2);
        assert_eq!(entry.write_relabel_configs[0], caller_rule);
        assert_eq!(entry.write_relabel_configs[1], cluster_id_rule("cluster-1"));
    }

    #[test]
    fn test_build_entry_never_dedupes_identity_rule() {
        // A caller rule identical to the synthesized one is kept alongside it.
        let duplicate = cluster_id_rule("cluster-1");
        let entry = build_entry("hub.example.com", &[duplicate], "cluster-1");
        assert_eq!(entry.write_relabel_configs.len(), 2);
        assert_eq!(
            entry.write_relabel_configs[0],
            entry.write_relabel_configs[1]
        );
    }

    #[test]
    fn test_merge_into_empty_document_synthesizes_sections() {
        let merged = merge_remote_write("", "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        let entries = remote_write_entries(&merged).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, HUB_URL);
    }

    #[test]
    fn test_merge_appends_when_no_match() {
        let doc = "prometheusK8s:\n  remoteWrite:\n  - url: http://other.example.com/write\n";
        let merged = merge_remote_write(doc, "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        let entries = remote_write_entries(&merged).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "http://other.example.com/write");
        assert_eq!(entries[1].url, HUB_URL);
    }

    #[test]
    fn test_merge_replaces_first_match_only() {
        let doc = concat!(
            "prometheusK8s:\n",
            "  remoteWrite:\n",
            "  - url: http://hub.example.com/api/metrics/v1/write\n",
            "    extra: first\n",
            "  - url: http://hub.example.com/api/metrics/v1/write\n",
            "    extra: second\n",
        );
        let merged =
            merge_remote_write(doc, "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        let value = parse(&merged);
        let entries = value["prometheusK8s"]["remoteWrite"].as_sequence().unwrap();
        assert_eq!(entries.len(), 2);
        // First entry replaced wholesale, losing its extra field.
        assert!(entries[0].get("extra").is_none());
        assert!(entries[0].get("writeRelabelConfigs").is_some());
        // Second match untouched.
        assert_eq!(entries[1], parse(doc)["prometheusK8s"]["remoteWrite"][1]);
    }

    #[test]
    fn test_merge_unchanged_returns_input_verbatim() {
        let doc = merge_remote_write("", "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        let again = merge_remote_write(&doc, "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_remove_missing_entry_is_noop() {
        let doc = "prometheusK8s:\n  remoteWrite:\n  - url: http://other.example.com/write\n";
        let merged = merge_remote_write(doc, "hub.example.com", None).unwrap();
        assert_eq!(merged, doc);
    }

    #[test]
    fn test_remove_from_absent_section_is_noop() {
        let doc = "enableUserWorkload: true\n";
        let merged = merge_remote_write(doc, "hub.example.com", None).unwrap();
        assert_eq!(merged, doc);
    }

    #[test]
    fn test_inject_then_remove_round_trips() {
        let original = concat!(
            "enableUserWorkload: true\n",
            "prometheusK8s:\n",
            "  retention: 24h\n",
            "  remoteWrite:\n",
            "  - url: http://other.example.com/write\n",
        );
        let injected =
            merge_remote_write(original, "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        assert_ne!(parse(original), parse(&injected));

        let removed = merge_remote_write(&injected, "hub.example.com", None).unwrap();
        assert_eq!(parse(original), parse(&removed));
    }

    #[test]
    fn test_inject_then_remove_round_trips_on_empty_document() {
        let injected =
            merge_remote_write("", "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        let removed = merge_remote_write(&injected, "hub.example.com", None).unwrap();
        // Sections the removal emptied out are pruned again.
        assert_eq!(parse(&removed), Value::Mapping(serde_yaml::Mapping::new()));
    }

    #[test]
    fn test_unrelated_sections_survive_merge() {
        let doc = concat!(
            "http:\n",
            "  proxy: http://proxy.example.com:3128\n",
            "alertmanagerMain:\n",
            "  enabled: false\n",
        );
        let merged =
            merge_remote_write(doc, "hub.example.com", Some(&sample_entry(HUB_URL))).unwrap();
        let value = parse(&merged);
        assert_eq!(value["http"], parse(doc)["http"]);
        assert_eq!(value["alertmanagerMain"], parse(doc)["alertmanagerMain"]);
        assert_eq!(remote_write_entries(&merged).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_document_is_a_hard_error() {
        let err = merge_remote_write("foo: [unclosed", "x", None).unwrap_err();
        assert!(matches!(err, MergeError::Malformed(_)));
    }

    #[test]
    fn test_non_mapping_document_is_rejected() {
        let err = merge_remote_write("- a\n- list\n", "x", None).unwrap_err();
        assert!(matches!(err, MergeError::NotAMapping));
    }

    #[test]
    fn test_read_entries_from_absent_section() {
        assert!(remote_write_entries("enableUserWorkload: true\n")
            .unwrap()
            .is_empty());
        assert!(remote_write_entries("").unwrap().is_empty());
    }
}
