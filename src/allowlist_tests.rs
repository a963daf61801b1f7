// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `allowlist.rs`

#[cfg(test)]
mod tests {
    use crate::allowlist::MetricsAllowList;
    use crate::constants::ALLOWLIST_KEY;
    use k8s_openapi::api::core::v1::ConfigMap;
    use std::collections::BTreeMap;

    fn configmap(key: &str, yaml: &str) -> ConfigMap {
        ConfigMap {
            data: Some(BTreeMap::from([(key.to_string(), yaml.to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_configmap_degrades_to_empty() {
        let list = MetricsAllowList::from_configmap(None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_missing_data_key_degrades_to_empty() {
        let cm = configmap("unrelated.yaml", "names: [up]");
        assert!(MetricsAllowList::from_configmap(Some(&cm)).is_empty());
    }

    #[test]
    fn test_malformed_yaml_degrades_to_empty() {
        let cm = configmap(ALLOWLIST_KEY, "names: [unclosed");
        assert!(MetricsAllowList::from_configmap(Some(&cm)).is_empty());
    }

    #[test]
    fn test_parses_names_and_matches_in_order() {
        let yaml = concat!(
            "names:\n",
            "- up\n",
            "- kube_pod_info\n",
            "matches:\n",
            "- '{__name__=~\"node_.*\"}'\n",
        );
        let cm = configmap(ALLOWLIST_KEY, yaml);
        let list = MetricsAllowList::from_configmap(Some(&cm));
        assert_eq!(list.names, vec!["up", "kube_pod_info"]);
        assert_eq!(list.matches, vec!["{__name__=~\"node_.*\"}"]);
        assert!(!list.is_empty());
    }

    #[test]
    fn test_partial_lists_are_fine() {
        let cm = configmap(ALLOWLIST_KEY, "names:\n- up\n");
        let list = MetricsAllowList::from_configmap(Some(&cm));
        assert_eq!(list.names, vec!["up"]);
        assert!(list.matches.is_empty());
    }
}
