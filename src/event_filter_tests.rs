// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `event_filter.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{MetricsAddonSpec, MetricsAddonStatus};
    use crate::event_filter::{
        should_reconcile, Event, FilterState, Payload, UpdateEvent, WatchRule, WatchedKind,
    };
    use k8s_openapi::api::apps::v1::DeploymentSpec;

    const NAME: &str = "metrics-forwarder";
    const NAMESPACE: &str = "test-ns";

    fn rule(kind: WatchedKind) -> WatchRule {
        WatchRule {
            kind,
            name: NAME.to_string(),
            namespace: NAMESPACE.to_string(),
            react_to_create: true,
            react_to_update: true,
            react_to_delete: true,
        }
    }

    fn addon_payload(enabled: bool, deleting: bool) -> Payload {
        Payload::Addon {
            spec: MetricsAddonSpec {
                enable_metrics: enabled,
                interval: None,
                tls_config: None,
                external_labels: None,
                write_relabel_configs: None,
            },
            deleting,
        }
    }

    fn deployment_payload(replicas: i32) -> Payload {
        Payload::Deployment(Some(DeploymentSpec {
            replicas: Some(replicas),
            ..Default::default()
        }))
    }

    fn update(old_version: &str, new_version: &str, old: Payload, new: Payload) -> Event {
        Event::Updated(Box::new(UpdateEvent {
            name: NAME.to_string(),
            namespace: NAMESPACE.to_string(),
            old_version: old_version.to_string(),
            new_version: new_version.to_string(),
            old_payload: old,
            new_payload: new,
        }))
    }

    #[test]
    fn test_create_requires_exact_name_and_namespace() {
        let rule = rule(WatchedKind::HubInfoSecret);
        assert!(should_reconcile(
            &rule,
            &Event::Created {
                name: NAME.to_string(),
                namespace: NAMESPACE.to_string()
            }
        ));
        assert!(!should_reconcile(
            &rule,
            &Event::Created {
                name: "other".to_string(),
                namespace: NAMESPACE.to_string()
            }
        ));
        assert!(!should_reconcile(
            &rule,
            &Event::Created {
                name: NAME.to_string(),
                namespace: "elsewhere".to_string()
            }
        ));
    }

    #[test]
    fn test_disabled_reactions_suppress_events() {
        let mut rule = rule(WatchedKind::HubInfoSecret);
        rule.react_to_create = false;
        rule.react_to_delete = false;
        assert!(!should_reconcile(
            &rule,
            &Event::Created {
                name: NAME.to_string(),
                namespace: NAMESPACE.to_string()
            }
        ));
        assert!(!should_reconcile(
            &rule,
            &Event::Deleted {
                name: NAME.to_string(),
                namespace: NAMESPACE.to_string()
            }
        ));
    }

    #[test]
    fn test_update_requires_version_change() {
        let rule = rule(WatchedKind::HubInfoSecret);
        assert!(!should_reconcile(
            &rule,
            &update("1", "1", Payload::Opaque, Payload::Opaque)
        ));
        assert!(should_reconcile(
            &rule,
            &update("1", "2", Payload::Opaque, Payload::Opaque)
        ));
    }

    #[test]
    fn test_version_churn_without_structural_change_is_ignored() {
        // A status-only deployment update bumps the version but not the spec.
        let rule = rule(WatchedKind::ForwarderDeployment);
        assert!(!should_reconcile(
            &rule,
            &update("1", "2", deployment_payload(1), deployment_payload(1))
        ));
        assert!(should_reconcile(
            &rule,
            &update("1", "2", deployment_payload(1), deployment_payload(0))
        ));
    }

    #[test]
    fn test_addon_deletion_intent_is_structural() {
        let rule = rule(WatchedKind::Addon);
        assert!(!should_reconcile(
            &rule,
            &update("1", "2", addon_payload(true, false), addon_payload(true, false))
        ));
        assert!(should_reconcile(
            &rule,
            &update("1", "2", addon_payload(true, false), addon_payload(true, true))
        ));
        assert!(should_reconcile(
            &rule,
            &update("1", "2", addon_payload(true, false), addon_payload(false, false))
        ));
    }

    #[test]
    fn test_status_check_compares_status_payloads() {
        let rule = rule(WatchedKind::AddonStatus);
        let empty = Payload::AddonStatus(MetricsAddonStatus::default());
        let ready = Payload::AddonStatus(MetricsAddonStatus {
            conditions: vec![crate::crd::Condition {
                r#type: "Available".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }],
        });
        assert!(!should_reconcile(
            &rule,
            &update("1", "2", empty.clone(), empty.clone())
        ));
        assert!(should_reconcile(&rule, &update("1", "2", empty, ready)));
    }

    #[test]
    fn test_filter_state_first_sight_is_a_create() {
        let mut state = FilterState::new(rule(WatchedKind::HubInfoSecret));
        assert!(state.observe(NAME, NAMESPACE, "1", Payload::Opaque));
        // Same version again: no new event.
        assert!(!state.observe(NAME, NAMESPACE, "1", Payload::Opaque));
        // New version on an opaque kind: relevant.
        assert!(state.observe(NAME, NAMESPACE, "2", Payload::Opaque));
    }

    #[test]
    fn test_filter_state_suppresses_structural_echo() {
        let mut state = FilterState::new(rule(WatchedKind::ForwarderDeployment));
        assert!(state.observe(NAME, NAMESPACE, "1", deployment_payload(1)));
        // Status-only echo: version moved, spec did not.
        assert!(!state.observe(NAME, NAMESPACE, "2", deployment_payload(1)));
        assert!(state.observe(NAME, NAMESPACE, "3", deployment_payload(0)));
    }

    #[test]
    fn test_observe_delivery_lets_redeliveries_through() {
        let mut state = FilterState::new(rule(WatchedKind::Addon));
        assert!(state.observe_delivery(NAME, NAMESPACE, "1", addon_payload(true, false)));
        // The runtime resyncs the same version: processed again, idempotently.
        assert!(state.observe_delivery(NAME, NAMESPACE, "1", addon_payload(true, false)));
        // A version bump without structural change is the echo case.
        assert!(!state.observe_delivery(NAME, NAMESPACE, "2", addon_payload(true, false)));
    }

    #[test]
    fn test_forget_lets_the_retry_through() {
        let mut state = FilterState::new(rule(WatchedKind::Addon));
        assert!(state.observe(NAME, NAMESPACE, "1", addon_payload(true, false)));
        assert!(!state.observe(NAME, NAMESPACE, "2", addon_payload(true, false)));
        state.forget(NAME, NAMESPACE);
        assert!(state.observe(NAME, NAMESPACE, "2", addon_payload(true, false)));
    }
}
