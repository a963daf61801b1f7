// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `hub.rs`

#[cfg(test)]
mod tests {
    use crate::constants::HUB_INFO_KEY;
    use crate::hub::HubInfo;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret_with(data: Option<BTreeMap<String, ByteString>>) -> Secret {
        Secret {
            data,
            ..Default::default()
        }
    }

    fn hub_secret(yaml: &str) -> Secret {
        secret_with(Some(BTreeMap::from([(
            HUB_INFO_KEY.to_string(),
            ByteString(yaml.as_bytes().to_vec()),
        )])))
    }

    #[test]
    fn test_parses_hub_info() {
        let secret = hub_secret("cluster-name: spoke-1\nendpoint: hub.example.com\n");
        let info = HubInfo::from_secret(&secret).unwrap();
        assert_eq!(info.cluster_name, "spoke-1");
        assert_eq!(info.endpoint, "hub.example.com");
    }

    #[test]
    fn test_missing_data_key_is_an_error() {
        let err = HubInfo::from_secret(&secret_with(None)).unwrap_err();
        assert!(err.to_string().contains(HUB_INFO_KEY));

        let other = secret_with(Some(BTreeMap::from([(
            "unrelated".to_string(),
            ByteString(b"x".to_vec()),
        )])));
        assert!(HubInfo::from_secret(&other).is_err());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let secret = hub_secret("cluster-name: [unclosed");
        assert!(HubInfo::from_secret(&secret).is_err());
    }

    #[test]
    fn test_empty_cluster_name_is_an_error() {
        let secret = hub_secret("cluster-name: \"\"\nendpoint: hub.example.com\n");
        assert!(HubInfo::from_secret(&secret).is_err());
    }

    #[test]
    fn test_unparsable_endpoint_is_an_error() {
        let secret = hub_secret("cluster-name: spoke-1\nendpoint: \"http://[bad\"\n");
        assert!(HubInfo::from_secret(&secret).is_err());
    }

    #[test]
    fn test_bare_host_endpoint_is_accepted() {
        // Normalization supplies the scheme before URL validation.
        let secret = hub_secret("cluster-name: spoke-1\nendpoint: hub.example.com:9090\n");
        assert!(HubInfo::from_secret(&secret).is_ok());
    }
}
