// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the forwardy operator.
//!
//! These tests verify the operator's objects against a real Kubernetes
//! cluster: CRD installation, addon lifecycle, and status wiring.
//!
//! Run with: cargo test --test simple_integration -- --ignored

mod common;

use common::{create_test_namespace, delete_test_namespace, get_kube_client_or_skip};
use forwardy::crd::{MetricsAddon, MetricsAddonSpec, MetricsAddonStatus};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::CustomResourceExt;

const TEST_NAMESPACE: &str = "forwardy-integration";

#[tokio::test]
#[ignore = "requires a cluster"]
async fn test_crd_can_be_installed() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let crds: Api<CustomResourceDefinition> = Api::all(client);

    let crd = MetricsAddon::crd();
    let name = crd.metadata.name.clone().unwrap();
    match crds.create(&PostParams::default(), &crd).await {
        Ok(_) => println!("Created CRD {name}"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => println!("CRD {name} already installed"),
        Err(e) => panic!("Failed to install CRD: {e}"),
    }

    let installed = crds.get(&name).await.expect("CRD should be fetchable");
    assert_eq!(installed.spec.names.kind, "MetricsAddon");
}

#[tokio::test]
#[ignore = "requires a cluster"]
async fn test_addon_lifecycle() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    create_test_namespace(&client, TEST_NAMESPACE)
        .await
        .expect("namespace should be creatable");

    let addons: Api<MetricsAddon> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let addon = MetricsAddon {
        metadata: ObjectMeta {
            name: Some("metrics-addon".to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: MetricsAddonSpec {
            enable_metrics: true,
            interval: Some("30s".to_string()),
            tls_config: None,
            external_labels: None,
            write_relabel_configs: None,
        },
        status: None,
    };

    match addons.create(&PostParams::default(), &addon).await {
        Ok(created) => {
            assert!(created.spec.enable_metrics);
            assert_eq!(created.status, None);
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Addon already exists, continuing");
        }
        Err(e) => panic!("Failed to create addon: {e}"),
    }

    // The status subresource accepts whole-list replacement.
    let status = MetricsAddonStatus {
        conditions: vec![forwardy::reconcilers::status::build_condition(
            forwardy::reconcilers::status::ConditionKind::Ready,
        )],
    };
    let patch = serde_json::json!({ "status": status });
    let patched = addons
        .patch_status(
            "metrics-addon",
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await
        .expect("status patch should succeed");
    let conditions = patched.status.expect("status should be set").conditions;
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].r#type, "Available");

    addons
        .delete("metrics-addon", &DeleteParams::default())
        .await
        .expect("addon should be deletable");
    delete_test_namespace(&client, TEST_NAMESPACE).await;
}
