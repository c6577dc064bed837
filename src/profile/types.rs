//! Profile record types shared by the backend wire format and the local cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ProfileDefaults;

/// Travel styles a user can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelStyle {
    Cultural,
    Adventure,
    Relaxation,
    Business,
    Family,
    Solo,
    Accessible,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetRange {
    Budget,
    #[default]
    MidRange,
    Luxury,
    Flexible,
}

/// How verbose the assistant should be.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationStyle {
    Brief,
    Detailed,
    #[default]
    Conversational,
    Professional,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAnimal {
    #[serde(rename = "type")]
    pub animal_type: String,
    pub name: String,
    /// Whether the user carries documentation for the animal.
    pub documentation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicInfo {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub nationality: String,
    pub home_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelInterests {
    pub preferred_destinations: Vec<String>,
    pub travel_style: Vec<TravelStyle>,
    pub budget_range: BudgetRange,
    pub group_size_preference: String,
    pub accommodation_preferences: Vec<String>,
    pub activity_interests: Vec<String>,
    pub transportation_preferences: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityProfile {
    pub mobility_needs: Vec<String>,
    pub sensory_needs: Vec<String>,
    pub cognitive_needs: Vec<String>,
    /// Free-form "kind of help → how I want it" pairs.
    pub assistance_preferences: BTreeMap<String, String>,
    pub mobility_aids: Vec<String>,
    pub medical_conditions: Vec<String>,
    pub accessibility_priorities: Vec<String>,
    pub barrier_concerns: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub medication_requirements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_animal: Option<ServiceAnimal>,
    pub communication_needs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub communication_style: CommunicationStyle,
    pub risk_tolerance: RiskTolerance,
    pub planning_horizon: String,
    pub language_preferences: Vec<String>,
    pub currency_preference: String,
    pub timezone: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self::with_defaults(&ProfileDefaults::default())
    }
}

impl Preferences {
    /// Preferences seeded from configured defaults.
    pub fn with_defaults(defaults: &ProfileDefaults) -> Self {
        Self {
            communication_style: CommunicationStyle::default(),
            risk_tolerance: RiskTolerance::default(),
            planning_horizon: String::new(),
            language_preferences: vec![defaults.language.clone()],
            currency_preference: defaults.currency.clone(),
            timezone: defaults.timezone.clone(),
        }
    }
}

/// The durable record of a traveller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub basic_info: BasicInfo,
    #[serde(default)]
    pub travel_interests: TravelInterests,
    #[serde(default)]
    pub accessibility_profile: AccessibilityProfile,
    #[serde(default)]
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub profile_complete: bool,
    #[serde(default)]
    pub onboarding_completed: bool,
}

impl UserProfile {
    /// A fresh profile with defaulted sections, as created before onboarding.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        defaults: &ProfileDefaults,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            basic_info: BasicInfo {
                name: name.into(),
                email: email.into(),
                ..BasicInfo::default()
            },
            travel_interests: TravelInterests::default(),
            accessibility_profile: AccessibilityProfile::default(),
            preferences: Preferences::with_defaults(defaults),
            created_at: now,
            updated_at: now,
            profile_complete: false,
            onboarding_completed: false,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.basic_info.name
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn new_profile_has_empty_lists_and_flags_off() {
        let p = UserProfile::new("u1", "Jane", "jane@x.com", &ProfileDefaults::default(), Utc::now());
        assert!(!p.profile_complete);
        assert!(!p.onboarding_completed);
        assert!(p.travel_interests.preferred_destinations.is_empty());
        assert!(p.travel_interests.travel_style.is_empty());
        assert!(p.accessibility_profile.mobility_needs.is_empty());
        assert!(p.accessibility_profile.assistance_preferences.is_empty());
        assert_eq!(p.preferences.language_preferences, vec!["en-US".to_string()]);
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(
            serde_json::to_value(BudgetRange::MidRange).unwrap(),
            serde_json::json!("mid-range")
        );
        assert_eq!(
            serde_json::to_value(TravelStyle::Accessible).unwrap(),
            serde_json::json!("accessible")
        );
        assert_eq!(
            serde_json::to_value(CommunicationStyle::Professional).unwrap(),
            serde_json::json!("professional")
        );
    }

    #[test]
    fn sparse_backend_profile_deserializes_with_defaults() {
        let json = serde_json::json!({
            "user_id": "abc",
            "basic_info": {"name": "Ana", "email": "ana@x.com"},
            "created_at": "2025-01-02T03:04:05Z",
            "updated_at": "2025-01-02T03:04:05Z",
            "accessibility_profile": {
                "service_animal": {"type": "dog", "name": "Rex", "documentation": true}
            }
        });
        let p: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(p.basic_info.name, "Ana");
        assert_eq!(p.travel_interests.budget_range, BudgetRange::MidRange);
        let animal = p.accessibility_profile.service_animal.unwrap();
        assert_eq!(animal.animal_type, "dog");
        assert!(animal.documentation);
    }
}
