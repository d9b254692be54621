//! Fixed catalog of selectable cloud providers

use serde::{Deserialize, Serialize};

use crate::models::deployment::ProviderStatus;

/// A provider that deployments may target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProvider {
    pub slug: String,
    pub name: String,
    pub status: ProviderStatus,
}

impl CatalogProvider {
    pub fn new(slug: &str, name: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            status: ProviderStatus::Up,
        }
    }
}

/// Read-only provider catalog
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    providers: Vec<CatalogProvider>,
}

impl ProviderCatalog {
    pub fn new(providers: Vec<CatalogProvider>) -> Self {
        Self { providers }
    }

    pub fn all(&self) -> &[CatalogProvider] {
        &self.providers
    }

    pub fn get(&self, slug: &str) -> Option<&CatalogProvider> {
        self.providers.iter().find(|p| p.slug == slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.get(slug).is_some()
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::new(vec![
            CatalogProvider::new("aws", "Amazon Web Services"),
            CatalogProvider::new("oracle", "Oracle Cloud"),
        ])
    }
}
