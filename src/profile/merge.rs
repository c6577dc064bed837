//! Applying a [`ProfilePatch`] to a stored [`UserProfile`].
//!
//! Policy is shallow per section, deep per field: each section named by the
//! patch has its supplied fields overwritten and its other fields retained.
//! Lists and maps are replaced, never unioned. `user_id` and `created_at`
//! never change; `updated_at` moves strictly forward.
//!
//! The same policy runs server-side for remote updates; this module is the
//! local-cache rendition used when the backend is unavailable.

use chrono::{DateTime, Duration, Utc};

use super::patch::ProfilePatch;
use super::types::UserProfile;

/// Merge `patch` into `base`, stamping `updated_at` with the current time.
pub fn merge(base: &UserProfile, patch: &ProfilePatch) -> UserProfile {
    merge_at(base, patch, Utc::now())
}

/// Merge `patch` into `base`, stamping `updated_at` with `now`.
///
/// If `now` is not after the base's `updated_at` (clock skew, or two merges
/// within the clock's resolution), the stamp becomes one millisecond past
/// the base's.
pub fn merge_at(base: &UserProfile, patch: &ProfilePatch, now: DateTime<Utc>) -> UserProfile {
    let mut merged = base.clone();

    if let Some(ref section) = patch.basic_info {
        section.apply_to(&mut merged.basic_info);
    }
    if let Some(ref section) = patch.travel_interests {
        section.apply_to(&mut merged.travel_interests);
    }
    if let Some(ref section) = patch.accessibility_profile {
        section.apply_to(&mut merged.accessibility_profile);
    }
    if let Some(ref section) = patch.preferences {
        section.apply_to(&mut merged.preferences);
    }
    if let Some(value) = patch.profile_complete {
        merged.profile_complete = value;
    }
    if let Some(value) = patch.onboarding_completed {
        merged.onboarding_completed = value;
    }

    merged.updated_at = next_updated_at(base.updated_at, now);
    merged
}

fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::ProfileDefaults;
    use crate::profile::patch::{
        AccessibilityPatch, BasicInfoPatch, PreferencesPatch, TravelInterestsPatch,
    };
    use crate::profile::types::{BudgetRange, CommunicationStyle, ServiceAnimal, TravelStyle};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn base() -> UserProfile {
        let mut p = UserProfile::new("user-1", "Jane", "jane@x.com", &ProfileDefaults::default(), t(0));
        p.travel_interests.travel_style = vec![TravelStyle::Cultural, TravelStyle::Family];
        p.travel_interests.preferred_destinations = vec!["Lisbon".into(), "Kyoto".into()];
        p.accessibility_profile.mobility_needs = vec!["step-free access".into()];
        p.accessibility_profile
            .assistance_preferences
            .insert("airport".into(), "wheelchair to gate".into());
        p.preferences.planning_horizon = "6 months".into();
        p
    }

    #[test]
    fn empty_patch_only_refreshes_updated_at() {
        let p = base();
        let merged = merge_at(&p, &ProfilePatch::new(), t(10));
        let expected = UserProfile {
            updated_at: t(10),
            ..p.clone()
        };
        assert_eq!(merged, expected);
    }

    #[test]
    fn list_fields_are_replaced_not_unioned() {
        let p = base();
        let patch = ProfilePatch::new()
            .travel_interests(TravelInterestsPatch::default().travel_style([TravelStyle::Adventure]));
        let merged = merge_at(&p, &patch, t(5));
        assert_eq!(merged.travel_interests.travel_style, vec![TravelStyle::Adventure]);
        assert_eq!(
            merged.travel_interests.preferred_destinations,
            p.travel_interests.preferred_destinations
        );
    }

    #[test]
    fn map_fields_are_replaced_wholesale() {
        let p = base();
        let mut prefs = BTreeMap::new();
        prefs.insert("hotel".to_string(), "roll-in shower".to_string());
        let patch = ProfilePatch::new()
            .accessibility_profile(AccessibilityPatch::default().assistance_preferences(prefs.clone()));
        let merged = merge_at(&p, &patch, t(5));
        assert_eq!(merged.accessibility_profile.assistance_preferences, prefs);
    }

    #[test]
    fn absent_fields_in_patched_section_are_retained() {
        let p = base();
        let patch = ProfilePatch::new().basic_info(BasicInfoPatch::default().home_location("Porto"));
        let merged = merge_at(&p, &patch, t(5));
        assert_eq!(merged.basic_info.home_location, "Porto");
        assert_eq!(merged.basic_info.name, "Jane");
        assert_eq!(merged.basic_info.email, "jane@x.com");
    }

    #[test]
    fn optional_fields_are_set() {
        let p = base();
        let animal = ServiceAnimal {
            animal_type: "dog".into(),
            name: "Rex".into(),
            documentation: true,
        };
        let patch = ProfilePatch::new()
            .basic_info(BasicInfoPatch::default().age(34u32))
            .accessibility_profile(AccessibilityPatch::default().service_animal(animal.clone()));
        let merged = merge_at(&p, &patch, t(5));
        assert_eq!(merged.basic_info.age, Some(34));
        assert_eq!(merged.accessibility_profile.service_animal, Some(animal));
    }

    #[test]
    fn identity_fields_never_change() {
        let p = base();
        let patch = ProfilePatch::new()
            .basic_info(BasicInfoPatch::default().name("Someone Else"))
            .profile_complete(true)
            .onboarding_completed(true);
        let merged = merge_at(&p, &patch, t(99));
        assert_eq!(merged.user_id, p.user_id);
        assert_eq!(merged.created_at, p.created_at);
        assert!(merged.profile_complete);
        assert!(merged.onboarding_completed);
    }

    #[test]
    fn sequential_patches_equal_combined_patch() {
        let p = base();
        let a = ProfilePatch::new()
            .basic_info(BasicInfoPatch::default().name("A").nationality("PT"))
            .travel_interests(TravelInterestsPatch::default().budget_range(BudgetRange::Luxury))
            .preferences(PreferencesPatch::default().communication_style(CommunicationStyle::Brief));
        let b = ProfilePatch::new()
            .basic_info(BasicInfoPatch::default().name("B"))
            .travel_interests(TravelInterestsPatch::default().travel_style([TravelStyle::Solo]))
            .profile_complete(true);

        let sequential = merge_at(&merge_at(&p, &a, t(1)), &b, t(2));
        let combined = merge_at(&p, &a.clone().combine(b.clone()), t(2));
        assert_eq!(sequential, combined);
        assert_eq!(sequential.basic_info.name, "B");
        assert_eq!(sequential.basic_info.nationality, "PT");
        assert_eq!(sequential.travel_interests.budget_range, BudgetRange::Luxury);
        assert_eq!(sequential.travel_interests.travel_style, vec![TravelStyle::Solo]);
    }

    #[test]
    fn reapplying_a_patch_is_idempotent_on_fields() {
        let p = base();
        let patch = ProfilePatch::new()
            .accessibility_profile(AccessibilityPatch::default().dietary_restrictions(["vegan".to_string()]));
        let once = merge_at(&p, &patch, t(1));
        let twice = merge_at(&once, &patch, t(2));
        assert_eq!(
            UserProfile {
                updated_at: once.updated_at,
                ..twice
            },
            once
        );
    }

    #[test]
    fn updated_at_strictly_increases_even_with_stale_clock() {
        let p = base();
        let merged = merge_at(&p, &ProfilePatch::new(), t(0));
        assert!(merged.updated_at > p.updated_at);
        let again = merge_at(&merged, &ProfilePatch::new(), t(-50));
        assert!(again.updated_at > merged.updated_at);
    }

    #[test]
    fn between_then_merge_reproduces_edit() {
        let before = base();
        let mut edited = before.clone();
        edited.preferences.language_preferences = vec!["pt-PT".into(), "en-GB".into()];
        edited.travel_interests.activity_interests = vec!["museums".into()];

        let patch = ProfilePatch::between(&before, &edited);
        let merged = merge_at(&before, &patch, t(3));
        assert_eq!(
            UserProfile {
                updated_at: edited.updated_at,
                ..merged
            },
            edited
        );
    }
}
