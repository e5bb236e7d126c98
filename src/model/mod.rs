//! Record and schema model
//!
//! Typed shapes for care resources, providers and the transient LLM
//! responses. Pure data; behavior lives in `evaluate`, `merge` and `crawler`.

mod extraction;
mod provider;
mod resource;
pub mod taxonomy;

pub use extraction::{
    CategoryOutput, ExtractedProvider, ExtractedResource, MergedResources, RankedUrlList,
    ResourceList, TagOutput,
};
pub use provider::ResourceProvider;
pub use resource::{
    CareResource, CostTier, DementiaType, LocationType, ResourceField, ServiceOption, TimeSlot,
    Weekday,
};
pub use taxonomy::ResourceTag;
