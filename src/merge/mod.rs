//! Deduplication and merge engine
//!
//! Every observation of a resource name is kept in a per-name bucket while
//! the crawl runs. Once a seed's subtree is finished the buckets are folded:
//! first by the LLM merge call, falling back to a deterministic field-level
//! merge when that call fails or is disabled.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::llm::Extractor;
use crate::model::{CareResource, ResourceProvider};

/// Folds observations of one resource into a single record
///
/// The first observation supplies the name. For every other field:
/// - text fields prefer a non-empty value, then the longer one
/// - enum fields keep the first non-null value
/// - timestamps keep the later value
/// - list and set fields are unioned in first-seen order
/// - `source_url` and `source_origin` keep the first non-empty value, and
///   `source_last_updated` keeps the later date when both values parse
///
/// Returns `None` for an empty slice.
pub fn merge_observations(observations: &[CareResource]) -> Option<CareResource> {
    let (first, rest) = observations.split_first()?;
    Some(rest.iter().fold(first.clone(), merge_pair))
}

/// Merges `other` into `base` using the deterministic precedence rules
pub fn merge_pair(base: CareResource, other: &CareResource) -> CareResource {
    CareResource {
        provider_name: prefer_text(base.provider_name, &other.provider_name),
        resource_name: base.resource_name,
        resource_category: prefer_text(base.resource_category, &other.resource_category),
        resource_subcategory: prefer_text(base.resource_subcategory, &other.resource_subcategory),
        tags: base.tags.union(&other.tags).copied().collect::<BTreeSet<_>>(),
        location_type: base.location_type.or(other.location_type),
        city: prefer_text(base.city, &other.city),
        state: prefer_text(base.state, &other.state),
        country: prefer_text(base.country, &other.country),
        zip: prefer_text(base.zip, &other.zip),
        phone: prefer_text(base.phone, &other.phone),
        email: prefer_text(base.email, &other.email),
        website: prefer_text(base.website, &other.website),
        description: prefer_text(base.description, &other.description),
        time_slots: union(base.time_slots, &other.time_slots),
        time_zone: prefer_text(base.time_zone, &other.time_zone),
        age_range: prefer_text(base.age_range, &other.age_range),
        target_audience: union_text(base.target_audience, &other.target_audience),
        cost_tier: base.cost_tier.or(other.cost_tier),
        eligibility: prefer_text(base.eligibility, &other.eligibility),
        languages: union_text(base.languages, &other.languages),
        accessibility_features: union_text(
            base.accessibility_features,
            &other.accessibility_features,
        ),
        format: prefer_text(base.format, &other.format),
        dementia_types: union(base.dementia_types, &other.dementia_types),
        service_option: base.service_option.or(other.service_option),
        source_url: first_text(base.source_url, &other.source_url),
        source_origin: first_text(base.source_origin, &other.source_origin),
        source_last_updated: later_date_text(base.source_last_updated, &other.source_last_updated),
        date_added_to_db: later(base.date_added_to_db, other.date_added_to_db),
        date_last_reviewed: later(base.date_last_reviewed, other.date_last_reviewed),
    }
}

/// Copies values from `fallback` into fields `primary` leaves empty
///
/// Unlike [`merge_pair`], a value already on `primary` always wins.
pub fn fill_gaps(primary: CareResource, fallback: &CareResource) -> CareResource {
    fn fill(value: Option<String>, fallback: &Option<String>) -> Option<String> {
        if is_blank(&value) {
            fallback.clone().filter(|s| !s.trim().is_empty())
        } else {
            value
        }
    }

    fn fill_list<T: Clone>(value: Vec<T>, fallback: &[T]) -> Vec<T> {
        if value.is_empty() {
            fallback.to_vec()
        } else {
            value
        }
    }

    CareResource {
        provider_name: fill(primary.provider_name, &fallback.provider_name),
        resource_name: primary.resource_name,
        resource_category: fill(primary.resource_category, &fallback.resource_category),
        resource_subcategory: fill(primary.resource_subcategory, &fallback.resource_subcategory),
        tags: if primary.tags.is_empty() {
            fallback.tags.clone()
        } else {
            primary.tags
        },
        location_type: primary.location_type.or(fallback.location_type),
        city: fill(primary.city, &fallback.city),
        state: fill(primary.state, &fallback.state),
        country: fill(primary.country, &fallback.country),
        zip: fill(primary.zip, &fallback.zip),
        phone: fill(primary.phone, &fallback.phone),
        email: fill(primary.email, &fallback.email),
        website: fill(primary.website, &fallback.website),
        description: fill(primary.description, &fallback.description),
        time_slots: fill_list(primary.time_slots, &fallback.time_slots),
        time_zone: fill(primary.time_zone, &fallback.time_zone),
        age_range: fill(primary.age_range, &fallback.age_range),
        target_audience: fill_list(primary.target_audience, &fallback.target_audience),
        cost_tier: primary.cost_tier.or(fallback.cost_tier),
        eligibility: fill(primary.eligibility, &fallback.eligibility),
        languages: fill_list(primary.languages, &fallback.languages),
        accessibility_features: fill_list(
            primary.accessibility_features,
            &fallback.accessibility_features,
        ),
        format: fill(primary.format, &fallback.format),
        dementia_types: fill_list(primary.dementia_types, &fallback.dementia_types),
        service_option: primary.service_option.or(fallback.service_option),
        source_url: fill(primary.source_url, &fallback.source_url),
        source_origin: fill(primary.source_origin, &fallback.source_origin),
        source_last_updated: fill(primary.source_last_updated, &fallback.source_last_updated),
        date_added_to_db: primary.date_added_to_db.or(fallback.date_added_to_db),
        date_last_reviewed: primary.date_last_reviewed.or(fallback.date_last_reviewed),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

fn prefer_text(base: Option<String>, other: &Option<String>) -> Option<String> {
    match (is_blank(&base), is_blank(other)) {
        (true, true) => base.or_else(|| other.clone()),
        (true, false) => other.clone(),
        (false, true) => base,
        (false, false) => {
            let base_len = base.as_deref().map(|s| s.trim().chars().count()).unwrap_or(0);
            let other_len = other.as_deref().map(|s| s.trim().chars().count()).unwrap_or(0);
            if other_len > base_len {
                other.clone()
            } else {
                base
            }
        }
    }
}

fn first_text(base: Option<String>, other: &Option<String>) -> Option<String> {
    if is_blank(&base) && !is_blank(other) {
        other.clone()
    } else {
        base
    }
}

/// Parses the date formats pages use for "last updated" stamps
fn parse_page_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.date_naive());
    }
    ["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Keeps the later of two page dates; unparseable values never displace a set one
fn later_date_text(base: Option<String>, other: &Option<String>) -> Option<String> {
    if is_blank(&base) || is_blank(other) {
        return first_text(base, other);
    }
    let base_date = base.as_deref().and_then(parse_page_date);
    let other_date = other.as_deref().and_then(parse_page_date);
    match (base_date, other_date) {
        (Some(b), Some(o)) if o > b => other.clone(),
        (None, Some(_)) => other.clone(),
        _ => base,
    }
}

fn later(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

fn union<T: Clone + PartialEq>(mut base: Vec<T>, other: &[T]) -> Vec<T> {
    for item in other {
        if !base.contains(item) {
            base.push(item.clone());
        }
    }
    base
}

/// Union of string lists, comparing trimmed values case-insensitively
fn union_text(mut base: Vec<String>, other: &[String]) -> Vec<String> {
    for item in other {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !base.iter().any(|b| b.trim().eq_ignore_ascii_case(trimmed)) {
            base.push(trimmed.to_string());
        }
    }
    base
}

/// LLM-backed merge with a deterministic fallback
#[derive(Clone)]
pub struct MergeEngine {
    extractor: Extractor,
    enrich: bool,
}

impl MergeEngine {
    /// Creates an engine; with `enrich == false` only the deterministic merge runs
    pub fn new(extractor: Extractor, enrich: bool) -> Self {
        Self { extractor, enrich }
    }

    /// Asks the LLM to merge all observations of `key`
    ///
    /// Returns an empty list when the call fails or yields nothing usable;
    /// callers decide whether to fall back.
    pub async fn merge(
        &self,
        observations: &[CareResource],
        key: &str,
        provider: Option<&ResourceProvider>,
    ) -> Vec<CareResource> {
        if observations.is_empty() {
            return Vec::new();
        }

        let fallback_provider = ResourceProvider::default();
        let provider = provider.unwrap_or(&fallback_provider);

        match self
            .extractor
            .merge_resources(observations, key, provider)
            .await
        {
            Ok(merged) => merged,
            Err(e) => {
                warn!(key = %key, error = %e, "LLM merge failed");
                Vec::new()
            }
        }
    }

    /// Merges observations, falling back to [`merge_observations`]
    ///
    /// LLM output is backfilled from the deterministic merge so provenance
    /// and bookkeeping fields the model dropped are not lost. When the model
    /// splits the observations into several records, the one named after
    /// `key` (or the first) is backfilled in full; the others only receive
    /// provenance and the category, subcategory and tags.
    pub async fn merge_or_fallback(
        &self,
        observations: &[CareResource],
        key: &str,
        provider: Option<&ResourceProvider>,
    ) -> Vec<CareResource> {
        let Some(deterministic) = merge_observations(observations) else {
            return Vec::new();
        };

        if !self.enrich {
            return vec![deterministic];
        }

        let merged = self.merge(observations, key, provider).await;
        if merged.is_empty() {
            debug!(key = %key, "Using deterministic merge");
            return vec![deterministic];
        }

        let primary_idx = primary_index(&merged, key);
        merged
            .into_iter()
            .enumerate()
            .map(|(idx, record)| {
                if idx == primary_idx {
                    fill_gaps(record, &deterministic)
                } else {
                    fill_classification(fill_provenance(record, &deterministic), &deterministic)
                }
            })
            .collect()
    }

    /// Replaces each duplicated name in `flat` with its merged record
    ///
    /// Buckets with a single observation are left alone. The merged record
    /// whose name matches the bucket key (or the first one) takes the flat
    /// slot and keeps the key as its name; any further records are appended
    /// only if their name has not been seen yet, and are added to `seen`.
    pub async fn consolidate(
        &self,
        mut flat: Vec<CareResource>,
        buckets: &HashMap<String, Vec<CareResource>>,
        provider: Option<&ResourceProvider>,
        seen: &mut HashSet<String>,
    ) -> Vec<CareResource> {
        let mut keys: Vec<&String> = buckets
            .iter()
            .filter(|(_, observations)| observations.len() > 1)
            .map(|(key, _)| key)
            .collect();
        keys.sort();

        let mut merged_count = 0;
        for key in keys {
            let Some(slot) = flat.iter().position(|r| &r.resource_name == key) else {
                continue;
            };

            let mut merged = self.merge_or_fallback(&buckets[key], key, provider).await;
            if merged.is_empty() {
                continue;
            }

            let primary_idx = primary_index(&merged, key);
            let mut primary = merged.remove(primary_idx);
            primary.resource_name = key.clone();
            flat[slot] = primary;
            merged_count += 1;

            for extra in merged {
                if seen.insert(extra.resource_name.clone()) {
                    flat.push(extra);
                }
            }
        }

        if merged_count > 0 {
            info!(merged = merged_count, "Merged duplicate resource observations");
        }

        flat
    }
}

/// Record that takes the bucket's slot: the one named `key`, else the first
fn primary_index(records: &[CareResource], key: &str) -> usize {
    records
        .iter()
        .position(|r| r.resource_name == key)
        .unwrap_or(0)
}

fn fill_classification(mut record: CareResource, fallback: &CareResource) -> CareResource {
    if is_blank(&record.resource_category) {
        record.resource_category = fallback.resource_category.clone();
        if is_blank(&record.resource_subcategory) {
            record.resource_subcategory = fallback.resource_subcategory.clone();
        }
    }
    if record.tags.is_empty() {
        record.tags = fallback.tags.clone();
    }
    record
}

fn fill_provenance(mut record: CareResource, fallback: &CareResource) -> CareResource {
    if is_blank(&record.provider_name) {
        record.provider_name = fallback.provider_name.clone();
    }
    if is_blank(&record.source_url) {
        record.source_url = fallback.source_url.clone();
    }
    if is_blank(&record.source_origin) {
        record.source_origin = fallback.source_origin.clone();
    }
    record.date_added_to_db = record.date_added_to_db.or(fallback.date_added_to_db);
    record.date_last_reviewed = record.date_last_reviewed.or(fallback.date_last_reviewed);
    record
}
