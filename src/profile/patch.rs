//! Partial profile updates.
//!
//! A [`ProfilePatch`] names only the fields a caller wants to change. Every
//! section patch is a set of `Option` fields: `None` means "leave as is",
//! `Some(v)` means "replace with `v`". Lists and maps are replaced wholesale,
//! so callers changing a list must send the complete new list.
//!
//! Patches serialize without their `None` fields, which makes the serialized
//! form exactly the partial-profile body the backend expects on
//! `PUT /users/{id}`. Unknown sections and fields are ignored on
//! deserialization.
//!
//! Nullable profile fields (`age`, `phone`, `emergency_contact`,
//! `service_animal`) can be set through a patch but not cleared.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{
    AccessibilityProfile, BasicInfo, BudgetRange, CommunicationStyle, EmergencyContact,
    Preferences, RiskTolerance, ServiceAnimal, TravelInterests, TravelStyle, UserProfile,
};
use crate::error::{AuraError, Result};

// ---------------------------------------------------------------------------
// Macro to generate one patch type per profile section.
//
// `value` fields hold a plain `T` in the section, `optional` fields hold an
// `Option<T>`.
// ---------------------------------------------------------------------------

macro_rules! define_section_patch {
    (@wrap value, $v:expr) => {
        $v
    };
    (@wrap optional, $v:expr) => {
        Some($v)
    };
    (@diff value, $before:expr, $after:expr) => {
        if $before != $after {
            Some($after.clone())
        } else {
            None
        }
    };
    (@diff optional, $before:expr, $after:expr) => {
        if $before != $after {
            $after.clone()
        } else {
            None
        }
    };
    (
        $(#[$meta:meta])*
        $patch:ident for $section:ident {
            $( $field:ident : $ty:ty => $kind:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $patch {
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )+
        }

        impl $patch {
            /// `true` when no field is set.
            pub fn is_empty(&self) -> bool {
                $( self.$field.is_none() )&&+
            }

            $(
                pub fn $field(mut self, value: impl Into<$ty>) -> Self {
                    self.$field = Some(value.into());
                    self
                }
            )+

            /// Overwrite every field this patch sets; keep the rest.
            pub fn apply_to(&self, section: &mut $section) {
                $(
                    if let Some(ref v) = self.$field {
                        section.$field = define_section_patch!(@wrap $kind, v.clone());
                    }
                )+
            }

            /// Combine with a later patch: fields set by `later` win.
            pub fn overlay(mut self, later: Self) -> Self {
                $(
                    if later.$field.is_some() {
                        self.$field = later.$field;
                    }
                )+
                self
            }

            /// A patch holding exactly the fields that differ between two sections.
            pub fn between(before: &$section, after: &$section) -> Self {
                Self {
                    $( $field: define_section_patch!(@diff $kind, before.$field, after.$field), )+
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Section patches
// ---------------------------------------------------------------------------

define_section_patch!(
    /// Changes to [`BasicInfo`].
    BasicInfoPatch for BasicInfo {
        name: String => value,
        email: String => value,
        age: u32 => optional,
        nationality: String => value,
        home_location: String => value,
        phone: String => optional,
        emergency_contact: EmergencyContact => optional,
    }
);

define_section_patch!(
    /// Changes to [`TravelInterests`].
    TravelInterestsPatch for TravelInterests {
        preferred_destinations: Vec<String> => value,
        travel_style: Vec<TravelStyle> => value,
        budget_range: BudgetRange => value,
        group_size_preference: String => value,
        accommodation_preferences: Vec<String> => value,
        activity_interests: Vec<String> => value,
        transportation_preferences: Vec<String> => value,
    }
);

define_section_patch!(
    /// Changes to [`AccessibilityProfile`].
    AccessibilityPatch for AccessibilityProfile {
        mobility_needs: Vec<String> => value,
        sensory_needs: Vec<String> => value,
        cognitive_needs: Vec<String> => value,
        assistance_preferences: BTreeMap<String, String> => value,
        mobility_aids: Vec<String> => value,
        medical_conditions: Vec<String> => value,
        accessibility_priorities: Vec<String> => value,
        barrier_concerns: Vec<String> => value,
        dietary_restrictions: Vec<String> => value,
        medication_requirements: Vec<String> => value,
        service_animal: ServiceAnimal => optional,
        communication_needs: Vec<String> => value,
    }
);

define_section_patch!(
    /// Changes to [`Preferences`].
    PreferencesPatch for Preferences {
        communication_style: CommunicationStyle => value,
        risk_tolerance: RiskTolerance => value,
        planning_horizon: String => value,
        language_preferences: Vec<String> => value,
        currency_preference: String => value,
        timezone: String => value,
    }
);

// ---------------------------------------------------------------------------
// Whole-profile patch
// ---------------------------------------------------------------------------

/// A partial update to a [`UserProfile`].
///
/// `user_id`, `created_at` and `updated_at` are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_info: Option<BasicInfoPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_interests: Option<TravelInterestsPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessibility_profile: Option<AccessibilityPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<PreferencesPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
}

impl ProfilePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when applying this patch would change no field.
    pub fn is_empty(&self) -> bool {
        self.basic_info.as_ref().is_none_or(BasicInfoPatch::is_empty)
            && self
                .travel_interests
                .as_ref()
                .is_none_or(TravelInterestsPatch::is_empty)
            && self
                .accessibility_profile
                .as_ref()
                .is_none_or(AccessibilityPatch::is_empty)
            && self.preferences.as_ref().is_none_or(PreferencesPatch::is_empty)
            && self.profile_complete.is_none()
            && self.onboarding_completed.is_none()
    }

    /// Add basic-info changes, overlaying any already present.
    pub fn basic_info(mut self, patch: BasicInfoPatch) -> Self {
        self.basic_info = overlay_section(self.basic_info, Some(patch), BasicInfoPatch::overlay);
        self
    }

    pub fn travel_interests(mut self, patch: TravelInterestsPatch) -> Self {
        self.travel_interests = overlay_section(
            self.travel_interests,
            Some(patch),
            TravelInterestsPatch::overlay,
        );
        self
    }

    pub fn accessibility_profile(mut self, patch: AccessibilityPatch) -> Self {
        self.accessibility_profile = overlay_section(
            self.accessibility_profile,
            Some(patch),
            AccessibilityPatch::overlay,
        );
        self
    }

    pub fn preferences(mut self, patch: PreferencesPatch) -> Self {
        self.preferences =
            overlay_section(self.preferences, Some(patch), PreferencesPatch::overlay);
        self
    }

    pub fn profile_complete(mut self, value: bool) -> Self {
        self.profile_complete = Some(value);
        self
    }

    pub fn onboarding_completed(mut self, value: bool) -> Self {
        self.onboarding_completed = Some(value);
        self
    }

    /// One patch equivalent to applying `self` and then `later`.
    ///
    /// For every field named by both, `later` wins; fields named by only one
    /// of them are kept.
    pub fn combine(self, later: Self) -> Self {
        Self {
            basic_info: overlay_section(self.basic_info, later.basic_info, BasicInfoPatch::overlay),
            travel_interests: overlay_section(
                self.travel_interests,
                later.travel_interests,
                TravelInterestsPatch::overlay,
            ),
            accessibility_profile: overlay_section(
                self.accessibility_profile,
                later.accessibility_profile,
                AccessibilityPatch::overlay,
            ),
            preferences: overlay_section(
                self.preferences,
                later.preferences,
                PreferencesPatch::overlay,
            ),
            profile_complete: later.profile_complete.or(self.profile_complete),
            onboarding_completed: later.onboarding_completed.or(self.onboarding_completed),
        }
    }

    /// The minimal patch turning `before` into `after` (identity and
    /// timestamps excluded). Sections without changes are omitted.
    pub fn between(before: &UserProfile, after: &UserProfile) -> Self {
        Self {
            basic_info: non_empty(
                BasicInfoPatch::between(&before.basic_info, &after.basic_info),
                BasicInfoPatch::is_empty,
            ),
            travel_interests: non_empty(
                TravelInterestsPatch::between(&before.travel_interests, &after.travel_interests),
                TravelInterestsPatch::is_empty,
            ),
            accessibility_profile: non_empty(
                AccessibilityPatch::between(
                    &before.accessibility_profile,
                    &after.accessibility_profile,
                ),
                AccessibilityPatch::is_empty,
            ),
            preferences: non_empty(
                PreferencesPatch::between(&before.preferences, &after.preferences),
                PreferencesPatch::is_empty,
            ),
            profile_complete: (before.profile_complete != after.profile_complete)
                .then_some(after.profile_complete),
            onboarding_completed: (before.onboarding_completed != after.onboarding_completed)
                .then_some(after.onboarding_completed),
        }
    }

    /// Parse a patch from a JSON partial profile, ignoring unknown keys.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Validation`] when a known field has the wrong type.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| AuraError::Validation(format!("invalid profile patch: {e}")))
    }
}

fn overlay_section<P>(earlier: Option<P>, later: Option<P>, overlay: fn(P, P) -> P) -> Option<P> {
    match (earlier, later) {
        (Some(a), Some(b)) => Some(overlay(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn non_empty<P>(patch: P, is_empty: fn(&P) -> bool) -> Option<P> {
    if is_empty(&patch) { None } else { Some(patch) }
}
