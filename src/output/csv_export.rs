use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::Writer;
use tracing::{debug, info};

use crate::model::{CareResource, ResourceField};
use crate::output::{OutputError, OutputResult};

/// Separator used when flattening list-valued fields into one cell
pub const LIST_SEPARATOR: &str = ", ";

/// Writes one row per resource, columns in declaration order
///
/// List fields are joined with [`LIST_SEPARATOR`] and timestamps are
/// rendered as RFC 3339. The parent directory is created if missing.
pub fn write_resources_csv(resources: &[CareResource], path: &Path) -> OutputResult<()> {
    debug!(
        "Exporting {} resources to CSV: {}",
        resources.len(),
        path.display()
    );

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OutputError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let mut wtr = Writer::from_path(path)?;

    wtr.write_record(ResourceField::ALL.iter().map(|f| f.as_str()))?;

    for resource in resources {
        wtr.write_record(
            ResourceField::ALL
                .iter()
                .map(|field| render_field(resource, *field)),
        )?;
    }

    wtr.flush().map_err(|e| OutputError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    info!(
        "Exported {} resources to CSV: {}",
        resources.len(),
        path.display()
    );
    Ok(())
}

/// Renders one field of a resource as a CSV cell
pub fn render_field(resource: &CareResource, field: ResourceField) -> String {
    fn text(value: &Option<String>) -> String {
        value.clone().unwrap_or_default()
    }

    fn join<I, S>(items: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        items
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR)
    }

    fn timestamp(value: &Option<DateTime<Utc>>) -> String {
        value
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }

    match field {
        ResourceField::ProviderName => text(&resource.provider_name),
        ResourceField::ResourceName => resource.resource_name.clone(),
        ResourceField::ResourceCategory => text(&resource.resource_category),
        ResourceField::ResourceSubcategory => text(&resource.resource_subcategory),
        ResourceField::Tags => join(resource.tags.iter().map(|t| t.as_str())),
        ResourceField::LocationType => resource
            .location_type
            .map(|l| l.as_str().to_string())
            .unwrap_or_default(),
        ResourceField::City => text(&resource.city),
        ResourceField::State => text(&resource.state),
        ResourceField::Country => text(&resource.country),
        ResourceField::Zip => text(&resource.zip),
        ResourceField::Phone => text(&resource.phone),
        ResourceField::Email => text(&resource.email),
        ResourceField::Website => text(&resource.website),
        ResourceField::Description => text(&resource.description),
        ResourceField::TimeSlots => join(resource.time_slots.iter().map(|s| s.to_string())),
        ResourceField::TimeZone => text(&resource.time_zone),
        ResourceField::AgeRange => text(&resource.age_range),
        ResourceField::TargetAudience => join(&resource.target_audience),
        ResourceField::CostTier => resource
            .cost_tier
            .map(|c| c.as_str().to_string())
            .unwrap_or_default(),
        ResourceField::Eligibility => text(&resource.eligibility),
        ResourceField::Languages => join(&resource.languages),
        ResourceField::AccessibilityFeatures => join(&resource.accessibility_features),
        ResourceField::Format => text(&resource.format),
        ResourceField::DementiaTypes => join(resource.dementia_types.iter().map(|d| d.as_str())),
        ResourceField::ServiceOption => resource
            .service_option
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        ResourceField::SourceUrl => text(&resource.source_url),
        ResourceField::SourceOrigin => text(&resource.source_origin),
        ResourceField::SourceLastUpdated => text(&resource.source_last_updated),
        ResourceField::DateAddedToDb => timestamp(&resource.date_added_to_db),
        ResourceField::DateLastReviewed => timestamp(&resource.date_last_reviewed),
    }
}
