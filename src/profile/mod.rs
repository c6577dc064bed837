//! Traveller profiles: the record, partial updates, and the merge policy.

pub mod merge;
pub mod patch;
pub mod types;

pub use merge::{merge, merge_at};
pub use patch::{
    AccessibilityPatch, BasicInfoPatch, PreferencesPatch, ProfilePatch, TravelInterestsPatch,
};
pub use types::{
    AccessibilityProfile, BasicInfo, BudgetRange, CommunicationStyle, EmergencyContact,
    Preferences, RiskTolerance, ServiceAnimal, TravelInterests, TravelStyle, UserProfile,
};
