// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{API_GROUP, API_VERSION, KIND_METRICS_ADDON};
    use crate::crd::{Condition, MetricsAddon, MetricsAddonSpec, MetricsAddonStatus, RelabelRule};
    use kube::core::CustomResourceExt;
    use kube::Resource;

    #[test]
    fn test_crd_identity() {
        assert_eq!(MetricsAddon::kind(&()), KIND_METRICS_ADDON);
        assert_eq!(MetricsAddon::group(&()), API_GROUP);
        assert_eq!(MetricsAddon::version(&()), API_VERSION);

        let crd = MetricsAddon::crd();
        assert_eq!(crd.spec.names.kind, KIND_METRICS_ADDON);
        assert_eq!(crd.spec.scope, "Namespaced");
    }

    #[test]
    fn test_spec_serializes_camel_case() {
        let spec = MetricsAddonSpec {
            enable_metrics: true,
            interval: Some("30s".to_string()),
            tls_config: None,
            external_labels: None,
            write_relabel_configs: Some(vec![RelabelRule {
                source_labels: Some(vec!["__name__".to_string()]),
                target_label: Some("tenant".to_string()),
                ..Default::default()
            }]),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["enableMetrics"], true);
        assert_eq!(json["interval"], "30s");
        assert_eq!(
            json["writeRelabelConfigs"][0]["sourceLabels"][0],
            "__name__"
        );
        // Unset optional fields stay off the wire.
        assert!(json.get("tlsConfig").is_none());
        assert!(json.get("externalLabels").is_none());
    }

    #[test]
    fn test_spec_round_trips() {
        let yaml = "enableMetrics: false\ninterval: 2m\n";
        let spec: MetricsAddonSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(!spec.enable_metrics);
        assert_eq!(spec.interval.as_deref(), Some("2m"));
        let back: MetricsAddonSpec =
            serde_yaml::from_str(&serde_yaml::to_string(&spec).unwrap()).unwrap();
        assert_eq!(spec, back);
    }

    #[test]
    fn test_status_defaults_to_no_conditions() {
        let status = MetricsAddonStatus::default();
        assert!(status.conditions.is_empty());

        let status: MetricsAddonStatus = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(status.conditions.is_empty());
    }

    #[test]
    fn test_condition_wire_shape() {
        let condition = Condition {
            r#type: "Available".to_string(),
            status: "True".to_string(),
            reason: Some("Deployed".to_string()),
            message: None,
            last_transition_time: None,
        };
        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["type"], "Available");
        assert_eq!(json["status"], "True");
        assert!(json.get("message").is_none());
    }
}
