use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::model::taxonomy::ResourceTag;

/// One discovered caregiver service or program
///
/// `resource_name` is the deduplication identity and is never empty for
/// records produced by extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareResource {
    // ===== Identity =====
    pub provider_name: Option<String>,
    pub resource_name: String,
    pub resource_category: Option<String>,
    pub resource_subcategory: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<ResourceTag>,

    // ===== Location =====
    pub location_type: Option<LocationType>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,

    // ===== Contact =====
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,

    // ===== Descriptive =====
    pub description: Option<String>,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    pub time_zone: Option<String>,
    pub age_range: Option<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    pub cost_tier: Option<CostTier>,
    pub eligibility: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub accessibility_features: Vec<String>,
    pub format: Option<String>,
    #[serde(default)]
    pub dementia_types: Vec<DementiaType>,
    pub service_option: Option<ServiceOption>,

    // ===== Provenance =====
    pub source_url: Option<String>,
    pub source_origin: Option<String>,
    pub source_last_updated: Option<String>,

    // ===== Bookkeeping =====
    pub date_added_to_db: Option<DateTime<Utc>>,
    pub date_last_reviewed: Option<DateTime<Utc>>,
}

impl CareResource {
    /// Creates a record carrying only its identity
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            resource_name: name.into(),
            ..Default::default()
        }
    }

    /// Returns true if the field is present and non-empty
    ///
    /// Strings count as empty when they contain only whitespace; lists and
    /// sets count as empty when they have no elements.
    pub fn has_field(&self, field: ResourceField) -> bool {
        fn text(value: &Option<String>) -> bool {
            value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
        }

        match field {
            ResourceField::ProviderName => text(&self.provider_name),
            ResourceField::ResourceName => !self.resource_name.trim().is_empty(),
            ResourceField::ResourceCategory => text(&self.resource_category),
            ResourceField::ResourceSubcategory => text(&self.resource_subcategory),
            ResourceField::Tags => !self.tags.is_empty(),
            ResourceField::LocationType => self.location_type.is_some(),
            ResourceField::City => text(&self.city),
            ResourceField::State => text(&self.state),
            ResourceField::Country => text(&self.country),
            ResourceField::Zip => text(&self.zip),
            ResourceField::Phone => text(&self.phone),
            ResourceField::Email => text(&self.email),
            ResourceField::Website => text(&self.website),
            ResourceField::Description => text(&self.description),
            ResourceField::TimeSlots => !self.time_slots.is_empty(),
            ResourceField::TimeZone => text(&self.time_zone),
            ResourceField::AgeRange => text(&self.age_range),
            ResourceField::TargetAudience => !self.target_audience.is_empty(),
            ResourceField::CostTier => self.cost_tier.is_some(),
            ResourceField::Eligibility => text(&self.eligibility),
            ResourceField::Languages => !self.languages.is_empty(),
            ResourceField::AccessibilityFeatures => !self.accessibility_features.is_empty(),
            ResourceField::Format => text(&self.format),
            ResourceField::DementiaTypes => !self.dementia_types.is_empty(),
            ResourceField::ServiceOption => self.service_option.is_some(),
            ResourceField::SourceUrl => text(&self.source_url),
            ResourceField::SourceOrigin => text(&self.source_origin),
            ResourceField::SourceLastUpdated => text(&self.source_last_updated),
            ResourceField::DateAddedToDb => self.date_added_to_db.is_some(),
            ResourceField::DateLastReviewed => self.date_last_reviewed.is_some(),
        }
    }
}

/// Every column of a [`CareResource`], in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceField {
    ProviderName,
    ResourceName,
    ResourceCategory,
    ResourceSubcategory,
    Tags,
    LocationType,
    City,
    State,
    Country,
    Zip,
    Phone,
    Email,
    Website,
    Description,
    TimeSlots,
    TimeZone,
    AgeRange,
    TargetAudience,
    CostTier,
    Eligibility,
    Languages,
    AccessibilityFeatures,
    Format,
    DementiaTypes,
    ServiceOption,
    SourceUrl,
    SourceOrigin,
    SourceLastUpdated,
    DateAddedToDb,
    DateLastReviewed,
}

impl ResourceField {
    pub const ALL: [ResourceField; 30] = [
        Self::ProviderName,
        Self::ResourceName,
        Self::ResourceCategory,
        Self::ResourceSubcategory,
        Self::Tags,
        Self::LocationType,
        Self::City,
        Self::State,
        Self::Country,
        Self::Zip,
        Self::Phone,
        Self::Email,
        Self::Website,
        Self::Description,
        Self::TimeSlots,
        Self::TimeZone,
        Self::AgeRange,
        Self::TargetAudience,
        Self::CostTier,
        Self::Eligibility,
        Self::Languages,
        Self::AccessibilityFeatures,
        Self::Format,
        Self::DementiaTypes,
        Self::ServiceOption,
        Self::SourceUrl,
        Self::SourceOrigin,
        Self::SourceLastUpdated,
        Self::DateAddedToDb,
        Self::DateLastReviewed,
    ];

    /// Column name used in CSV headers and config keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderName => "provider_name",
            Self::ResourceName => "resource_name",
            Self::ResourceCategory => "resource_category",
            Self::ResourceSubcategory => "resource_subcategory",
            Self::Tags => "tags",
            Self::LocationType => "location_type",
            Self::City => "city",
            Self::State => "state",
            Self::Country => "country",
            Self::Zip => "zip",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Website => "website",
            Self::Description => "description",
            Self::TimeSlots => "time_slots",
            Self::TimeZone => "time_zone",
            Self::AgeRange => "age_range",
            Self::TargetAudience => "target_audience",
            Self::CostTier => "cost_tier",
            Self::Eligibility => "eligibility",
            Self::Languages => "languages",
            Self::AccessibilityFeatures => "accessibility_features",
            Self::Format => "format",
            Self::DementiaTypes => "dementia_types",
            Self::ServiceOption => "service_option",
            Self::SourceUrl => "source_url",
            Self::SourceOrigin => "source_origin",
            Self::SourceLastUpdated => "source_last_updated",
            Self::DateAddedToDb => "date_added_to_db",
            Self::DateLastReviewed => "date_last_reviewed",
        }
    }
}

impl FromStr for ResourceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Older key names are still accepted in config files
        match s {
            "name" => return Ok(Self::ResourceName),
            "resource_type" => return Ok(Self::ResourceCategory),
            _ => {}
        }

        Self::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown resource field: {}", s))
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recurring window in which a resource is available
///
/// Times are free text ("h:mm AM/PM"); overlapping slots are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TimeSlot {
    pub from_time: String,
    pub to_time: String,
    #[serde(default)]
    pub days: BTreeSet<Weekday>,
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<&str> = self.days.iter().map(|d| d.short_name()).collect();
        if days.is_empty() {
            write!(f, "{} - {}", self.from_time, self.to_time)
        } else {
            write!(f, "{} {} - {}", days.join("/"), self.from_time, self.to_time)
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
            Self::Sunday => "Sun",
        }
    }
}

/// How a resource is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum LocationType {
    Virtual,
    InPerson,
    AtHome,
    Telephone,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Virtual => "Virtual",
            Self::InPerson => "In Person",
            Self::AtHome => "At Home",
            Self::Telephone => "Telephone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum CostTier {
    FreeOrLowCost,
    OutOfPocketFee,
    CoveredBySomeInsurance,
}

impl CostTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreeOrLowCost => "Free or Low Cost",
            Self::OutOfPocketFee => "Out of Pocket Fee",
            Self::CoveredBySomeInsurance => "Covered by Some Insurance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum DementiaType {
    Alzheimers,
    Vascular,
    LewyBody,
    Frontotemporal,
    Mixed,
    Parkinsons,
    YoungOnset,
    Other,
}

impl DementiaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alzheimers => "Alzheimer's",
            Self::Vascular => "Vascular",
            Self::LewyBody => "Lewy Body",
            Self::Frontotemporal => "Frontotemporal",
            Self::Mixed => "Mixed",
            Self::Parkinsons => "Parkinson's",
            Self::YoungOnset => "Young Onset",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ServiceOption {
    Live,
    Asynchronous,
    ZipCode,
}

impl ServiceOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Asynchronous => "Asynchronous",
            Self::ZipCode => "Zip Code",
        }
    }
}
