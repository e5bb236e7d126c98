//! Completeness and quality evaluation
//!
//! Two independent, pure predicates over a single record, and the policy
//! that turns them into a "this page needs a secondary crawl" decision.

use crate::config::SecondaryTrigger;
use crate::model::{CareResource, ResourceField};

/// Fields every usable record is expected to carry when present on the page
pub const SHOULD_HAVE_FIELDS: [ResourceField; 10] = [
    ResourceField::State,
    ResourceField::Description,
    ResourceField::TimeSlots,
    ResourceField::AgeRange,
    ResourceField::TargetAudience,
    ResourceField::CostTier,
    ResourceField::Eligibility,
    ResourceField::Format,
    ResourceField::Languages,
    ResourceField::AccessibilityFeatures,
];

/// Default fraction of should-have fields a record needs
pub const DEFAULT_MIN_FIELD_RATIO: f64 = 0.5;

/// Returns true iff every required field is present and non-empty
pub fn is_complete(resource: &CareResource, required: &[ResourceField]) -> bool {
    required.iter().all(|field| resource.has_field(*field))
}

/// Fraction of [`SHOULD_HAVE_FIELDS`] that carry a value
pub fn should_have_ratio(resource: &CareResource) -> f64 {
    let present = SHOULD_HAVE_FIELDS
        .iter()
        .filter(|field| resource.has_field(**field))
        .count();
    present as f64 / SHOULD_HAVE_FIELDS.len() as f64
}

/// Returns true iff fewer than half of the should-have fields are populated
pub fn is_missing_too_many_fields(resource: &CareResource) -> bool {
    is_missing_too_many_fields_with(resource, DEFAULT_MIN_FIELD_RATIO)
}

/// Same as [`is_missing_too_many_fields`] with a configurable threshold
pub fn is_missing_too_many_fields_with(resource: &CareResource, min_ratio: f64) -> bool {
    should_have_ratio(resource) < min_ratio
}

/// Applies the configured predicates to one page's candidates
#[derive(Debug, Clone)]
pub struct CompletenessEvaluator {
    required: Vec<ResourceField>,
    trigger: SecondaryTrigger,
    min_ratio: f64,
}

impl CompletenessEvaluator {
    pub fn new(required: Vec<ResourceField>, trigger: SecondaryTrigger, min_ratio: f64) -> Self {
        Self {
            required,
            trigger,
            min_ratio,
        }
    }

    /// Builds an evaluator from config keys, skipping names that do not parse
    ///
    /// Config validation rejects unknown keys, so nothing is skipped for a
    /// validated config.
    pub fn from_keys(keys: &[String], trigger: SecondaryTrigger, min_ratio: f64) -> Self {
        let required = keys.iter().filter_map(|k| k.parse().ok()).collect();
        Self::new(required, trigger, min_ratio)
    }

    pub fn is_complete(&self, resource: &CareResource) -> bool {
        is_complete(resource, &self.required)
    }

    pub fn is_missing_too_many_fields(&self, resource: &CareResource) -> bool {
        is_missing_too_many_fields_with(resource, self.min_ratio)
    }

    /// Decides whether a page's candidates are insufficient
    ///
    /// An empty candidate list always needs a secondary crawl.
    pub fn needs_secondary_crawl(&self, candidates: &[CareResource]) -> bool {
        if candidates.is_empty() {
            return true;
        }

        match self.trigger {
            SecondaryTrigger::TooSparse => candidates
                .iter()
                .any(|c| self.is_missing_too_many_fields(c)),
            SecondaryTrigger::NoComplete => !candidates.iter().any(|c| self.is_complete(c)),
        }
    }
}

impl Default for CompletenessEvaluator {
    fn default() -> Self {
        Self::new(
            vec![
                ResourceField::ResourceName,
                ResourceField::ResourceCategory,
                ResourceField::Description,
                ResourceField::SourceUrl,
            ],
            SecondaryTrigger::TooSparse,
            DEFAULT_MIN_FIELD_RATIO,
        )
    }
}
