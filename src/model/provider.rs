use serde::{Deserialize, Serialize};

use crate::model::CareResource;

/// The organization owning the resources found from one seed URL
///
/// Created once per seed page; secondary pages reuse the parent's provider
/// and `resources` is only filled in when a crawl subtree finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceProvider {
    pub provider_name: Option<String>,
    pub resource_category: Option<String>,

    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub address: Option<String>,

    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,

    #[serde(default)]
    pub resources: Vec<CareResource>,
}

impl ResourceProvider {
    /// Returns a copy of this provider owning `resources`
    pub fn snapshot_with(&self, resources: Vec<CareResource>) -> Self {
        Self {
            resources,
            ..self.clone()
        }
    }

    /// Returns a copy of this provider without any resources
    pub fn without_resources(&self) -> Self {
        self.snapshot_with(Vec::new())
    }

    pub fn display_name(&self) -> &str {
        self.provider_name
            .as_deref()
            .or(self.website.as_deref())
            .unwrap_or("<unknown provider>")
    }
}
