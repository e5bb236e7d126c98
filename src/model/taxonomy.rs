//! Fixed classification vocabularies
//!
//! The category taxonomy and tag list are what the classification prompts
//! offer the LLM; answers outside them are discarded.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Resource categories and their subcategories
pub const RESOURCE_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Direct Care Services",
        &[
            "Home Care Assistance",
            "Skilled Nursing Care",
            "Hospice Care",
            "Palliative Care",
            "Geriatric Care Management",
        ],
    ),
    (
        "Support & Education",
        &[
            "Caregiver Support Groups",
            "Dementia Education Programs",
            "Online Forums & Communities",
            "Counseling & Therapy (for caregivers)",
            "Wellness Programs (for caregivers)",
        ],
    ),
    (
        "Financial & Legal",
        &[
            "Financial Assistance Programs",
            "Legal Aid & Advice",
            "Benefits Counseling",
            "Estate Planning Resources",
        ],
    ),
    (
        "Practical Assistance",
        &[
            "Respite Care",
            "Adult Day Care",
            "Transportation Services",
            "Meal Delivery Services",
            "Assistive Technology Resources",
            "Home Modification Resources",
        ],
    ),
    (
        "Social & Recreational",
        &[
            "Activities for People with Dementia and Caregivers",
            "Social Clubs & Programs for Seniors",
            "Recreational Therapy",
        ],
    ),
    (
        "Emergency & Safety",
        &[
            "Dementia-Specific Emergency Resources",
            "Emergency Alert Systems",
            "Safety Assessment & Home Safety Resources",
        ],
    ),
    (
        "Information & Referral",
        &[
            "Resource Directories & Databases",
            "Helplines & Hotlines",
            "Information Websites & Portals",
        ],
    ),
    ("General/Other", &["Other"]),
];

/// Returns the canonical (category, subcategory) pair if the answer is in the taxonomy
///
/// Matching ignores case and surrounding whitespace. A known category with an
/// unknown subcategory keeps the category and drops the subcategory.
pub fn resolve_category(
    category: &str,
    subcategory: Option<&str>,
) -> Option<(&'static str, Option<&'static str>)> {
    let category = category.trim();
    let (name, subs) = RESOURCE_CATEGORIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(category))?;

    let sub = subcategory.and_then(|wanted| {
        let wanted = wanted.trim();
        subs.iter().copied().find(|s| s.eq_ignore_ascii_case(wanted))
    });

    Some((name, sub))
}

/// Renders the taxonomy as the bullet list used in the classification prompt
pub fn format_categories() -> String {
    RESOURCE_CATEGORIES
        .iter()
        .map(|(category, subs)| {
            let lines: Vec<String> = subs.iter().map(|s| format!("- {}", s)).collect();
            format!("{}:\n{}", category, lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single best-fit topic tag for a resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTag {
    Education,
    Preparation,
    EarlyStages,
    MiddleStages,
    LateStages,
    EarlyOnset,
    Health,
    EndOfLife,
    DifficultConversations,
    Legal,
    Financial,
    LongTermCare,
    SocialSupport,
    SharedStories,
    Safety,
    HealthInsurance,
    Insurance,
    MentalHealth,
    SelfCare,
    Burnout,
    CareCoordination,
    SymptomManagement,
    BehaviorManagement,
    DementiaSymptoms,
    DailyCareActivities,
    TipsAdvice,
    HomeCare,
    AdultDayCare,
    Training,
}

impl ResourceTag {
    pub const ALL: [ResourceTag; 29] = [
        Self::Education,
        Self::Preparation,
        Self::EarlyStages,
        Self::MiddleStages,
        Self::LateStages,
        Self::EarlyOnset,
        Self::Health,
        Self::EndOfLife,
        Self::DifficultConversations,
        Self::Legal,
        Self::Financial,
        Self::LongTermCare,
        Self::SocialSupport,
        Self::SharedStories,
        Self::Safety,
        Self::HealthInsurance,
        Self::Insurance,
        Self::MentalHealth,
        Self::SelfCare,
        Self::Burnout,
        Self::CareCoordination,
        Self::SymptomManagement,
        Self::BehaviorManagement,
        Self::DementiaSymptoms,
        Self::DailyCareActivities,
        Self::TipsAdvice,
        Self::HomeCare,
        Self::AdultDayCare,
        Self::Training,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Education => "education",
            Self::Preparation => "preparation",
            Self::EarlyStages => "early_stages",
            Self::MiddleStages => "middle_stages",
            Self::LateStages => "late_stages",
            Self::EarlyOnset => "early_onset",
            Self::Health => "health",
            Self::EndOfLife => "end_of_life",
            Self::DifficultConversations => "difficult_conversations",
            Self::Legal => "legal",
            Self::Financial => "financial",
            Self::LongTermCare => "long_term_care",
            Self::SocialSupport => "social_support",
            Self::SharedStories => "shared_stories",
            Self::Safety => "safety",
            Self::HealthInsurance => "health_insurance",
            Self::Insurance => "insurance",
            Self::MentalHealth => "mental_health",
            Self::SelfCare => "self_care",
            Self::Burnout => "burnout",
            Self::CareCoordination => "care_coordination",
            Self::SymptomManagement => "symptom_management",
            Self::BehaviorManagement => "behavior_management",
            Self::DementiaSymptoms => "dementia_symptoms",
            Self::DailyCareActivities => "daily_care_activities",
            Self::TipsAdvice => "tips_advice",
            Self::HomeCare => "home_care",
            Self::AdultDayCare => "adult_day_care",
            Self::Training => "training",
        }
    }
}

/// Renders the tag list used in the tag classification prompt
pub fn format_tags() -> String {
    ResourceTag::ALL
        .iter()
        .map(|tag| format!("- {}", tag.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_pair() {
        let resolved = resolve_category("practical assistance", Some("Respite Care"));
        assert_eq!(resolved, Some(("Practical Assistance", Some("Respite Care"))));
    }

    #[test]
    fn test_resolve_unknown_subcategory_keeps_category() {
        let resolved = resolve_category("Financial & Legal", Some("Crypto Advice"));
        assert_eq!(resolved, Some(("Financial & Legal", None)));
    }

    #[test]
    fn test_resolve_unknown_category() {
        assert_eq!(resolve_category("Gardening", Some("Other")), None);
    }

    #[test]
    fn test_tag_serde_names_match_as_str() {
        for tag in ResourceTag::ALL {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
        }
    }

    #[test]
    fn test_prompt_lists() {
        assert!(format_categories().contains("Support & Education:\n- Caregiver Support Groups"));
        assert_eq!(format_tags().lines().count(), 29);
    }
}
