//! Response shapes requested from the LLM
//!
//! These types double as the JSON schemas sent with structured-output
//! requests, so every field is optional: the model is told to return null
//! for anything the page does not state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::taxonomy::ResourceTag;
use crate::model::{
    CareResource, CostTier, DementiaType, LocationType, ResourceProvider, ServiceOption, TimeSlot,
};

/// A resource as described by the model, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedResource {
    /// Name of the organization offering the resource
    pub provider_name: Option<String>,
    /// Official name of the resource or service
    pub resource_name: Option<String>,
    pub resource_category: Option<String>,
    pub resource_subcategory: Option<String>,
    pub location_type: Option<LocationType>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    /// Brief summary of the resource or service
    pub description: Option<String>,
    /// Recurring schedule, e.g. Tuesdays 2:00 PM - 4:00 PM
    pub time_slots: Option<Vec<TimeSlot>>,
    pub time_zone: Option<String>,
    /// Target age group, e.g. "65 and older"
    pub age_range: Option<String>,
    /// Intended users, e.g. caregivers, people with dementia
    pub target_audience: Option<Vec<String>>,
    pub cost_tier: Option<CostTier>,
    /// Requirements to access the resource
    pub eligibility: Option<String>,
    pub languages: Option<Vec<String>>,
    pub accessibility_features: Option<Vec<String>>,
    /// Delivery format, e.g. In-person, Virtual, Hybrid
    pub format: Option<String>,
    pub dementia_types: Option<Vec<DementiaType>>,
    pub service_option: Option<ServiceOption>,
    /// Last updated date shown on the page, if any
    pub source_last_updated: Option<String>,
}

impl ExtractedResource {
    /// Converts into a record, or `None` when the model gave no usable name
    pub fn into_resource(self) -> Option<CareResource> {
        let name = self.resource_name?.trim().to_string();
        if name.is_empty() {
            return None;
        }

        Some(CareResource {
            provider_name: self.provider_name,
            resource_name: name,
            resource_category: self.resource_category,
            resource_subcategory: self.resource_subcategory,
            tags: BTreeSet::new(),
            location_type: self.location_type,
            city: self.city,
            state: self.state,
            country: self.country,
            zip: self.zip,
            phone: self.phone,
            email: self.email,
            website: self.website,
            description: self.description,
            time_slots: self.time_slots.unwrap_or_default(),
            time_zone: self.time_zone,
            age_range: self.age_range,
            target_audience: self.target_audience.unwrap_or_default(),
            cost_tier: self.cost_tier,
            eligibility: self.eligibility,
            languages: self.languages.unwrap_or_default(),
            accessibility_features: self.accessibility_features.unwrap_or_default(),
            format: self.format,
            dementia_types: self.dementia_types.unwrap_or_default(),
            service_option: self.service_option,
            source_url: None,
            source_origin: None,
            source_last_updated: self.source_last_updated,
            date_added_to_db: None,
            date_last_reviewed: None,
        })
    }
}

/// Response shape for resource-list extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResourceList {
    pub resources: Vec<ExtractedResource>,
}

/// Response shape for the merge/enrichment call
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MergedResources {
    /// Distinct merged resources, usually exactly one
    pub resources: Vec<ExtractedResource>,
}

/// Response shape for provider extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedProvider {
    /// Official name of the organization
    pub provider_name: Option<String>,
    pub resource_category: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    /// Full headquarters address, e.g. 123 N Walker St, Arlington VA, 22207
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

impl ExtractedProvider {
    pub fn into_provider(self) -> ResourceProvider {
        ResourceProvider {
            provider_name: self.provider_name,
            resource_category: self.resource_category,
            city: self.city,
            state: self.state,
            country: self.country,
            zip: self.zip,
            address: self.address,
            phone: self.phone,
            email: self.email,
            website: self.website,
            resources: Vec::new(),
        }
    }
}

/// Response shape for category classification
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CategoryOutput {
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

/// Response shape for tag classification
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TagOutput {
    pub tag: Option<ResourceTag>,
}

/// Links ordered from most to least promising for resource detail
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedUrlList {
    pub ranked_urls: Vec<String>,
}
