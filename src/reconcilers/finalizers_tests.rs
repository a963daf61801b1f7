// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `finalizers.rs`

#[cfg(test)]
mod tests {
    use crate::constants::ADDON_FINALIZER;
    use crate::reconcilers::finalizers::{FinalizerAction, FinalizerState};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn meta(finalizers: Option<Vec<&str>>, deleting: bool) -> ObjectMeta {
        ObjectMeta {
            name: Some("metrics-addon".to_string()),
            namespace: Some("test-ns".to_string()),
            finalizers: finalizers
                .map(|f| f.into_iter().map(ToString::to_string).collect()),
            deletion_timestamp: deleting.then(|| Time(k8s_openapi::jiff::Timestamp::now())),
            ..Default::default()
        }
    }

    #[test]
    fn test_observe_absent() {
        assert_eq!(
            FinalizerState::observe(&meta(None, false), ADDON_FINALIZER),
            FinalizerState::Absent
        );
        assert_eq!(
            FinalizerState::observe(&meta(Some(vec![]), false), ADDON_FINALIZER),
            FinalizerState::Absent
        );
    }

    #[test]
    fn test_observe_present() {
        assert_eq!(
            FinalizerState::observe(&meta(Some(vec![ADDON_FINALIZER]), false), ADDON_FINALIZER),
            FinalizerState::Present
        );
    }

    #[test]
    fn test_observe_cleaning() {
        assert_eq!(
            FinalizerState::observe(&meta(Some(vec![ADDON_FINALIZER]), true), ADDON_FINALIZER),
            FinalizerState::Cleaning
        );
    }

    #[test]
    fn test_observe_removed() {
        assert_eq!(
            FinalizerState::observe(&meta(None, true), ADDON_FINALIZER),
            FinalizerState::Removed
        );
    }

    #[test]
    fn test_foreign_markers_do_not_count() {
        let meta = meta(Some(vec!["someone.else/cleanup"]), false);
        assert_eq!(
            FinalizerState::observe(&meta, ADDON_FINALIZER),
            FinalizerState::Absent
        );
    }

    #[test]
    fn test_plan_is_total() {
        assert_eq!(FinalizerState::Absent.plan(), FinalizerAction::AddMarker);
        assert_eq!(FinalizerState::Present.plan(), FinalizerAction::Proceed);
        assert_eq!(FinalizerState::Cleaning.plan(), FinalizerAction::RunCleanup);
        assert_eq!(FinalizerState::Removed.plan(), FinalizerAction::Nothing);
    }

    #[test]
    fn test_observe_is_stable_under_reobservation() {
        // A duplicate delivery of the same metadata plans the same action.
        let cleaning = meta(Some(vec![ADDON_FINALIZER]), true);
        let first = FinalizerState::observe(&cleaning, ADDON_FINALIZER).plan();
        let second = FinalizerState::observe(&cleaning, ADDON_FINALIZER).plan();
        assert_eq!(first, second);
    }
}
