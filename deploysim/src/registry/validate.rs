//! Creation request validation

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::models::catalog::ProviderCatalog;

/// How creation treats slugs that are missing from the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogPolicy {
    #[default]
    RejectUnknown,
    AcceptUnknown,
}

const GITHUB_PREFIX: &str = "https://github.com/";

/// Accept only `https://github.com/<owner>/<repo>` with an optional trailing
/// slash. The URL is taken verbatim: no trimming, no case folding and no
/// dot-segment resolution.
pub fn validate_repo_url(repo_url: &str) -> Result<(), SimError> {
    let path = repo_url.strip_prefix(GITHUB_PREFIX).ok_or_else(|| invalid_url(repo_url))?;
    let path = path.strip_suffix('/').unwrap_or(path);

    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(owner), Some(repo), None) if is_repo_name(owner) && is_repo_name(repo) => Ok(()),
        _ => Err(invalid_url(repo_url)),
    }
}

fn invalid_url(repo_url: &str) -> SimError {
    SimError::ValidationError(format!(
        "'{}' is not a GitHub repository URL (https://github.com/<owner>/<repo>)",
        repo_url
    ))
}

fn is_repo_name(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Trim and lower-case the requested slugs, rejecting empty, duplicate and
/// (depending on `policy`) uncatalogued ones
pub fn normalize_slugs(
    slugs: &[String],
    catalog: &ProviderCatalog,
    policy: CatalogPolicy,
) -> Result<Vec<String>, SimError> {
    if slugs.is_empty() {
        return Err(SimError::ValidationError(
            "At least one provider is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let slug = slug.trim().to_lowercase();
        if slug.is_empty() {
            return Err(SimError::ValidationError(
                "Provider slug must not be empty".to_string(),
            ));
        }
        if policy == CatalogPolicy::RejectUnknown && !catalog.contains(&slug) {
            return Err(SimError::ValidationError(format!(
                "Unknown provider '{}'",
                slug
            )));
        }
        if !seen.insert(slug.clone()) {
            return Err(SimError::ValidationError(format!(
                "Provider '{}' selected more than once",
                slug
            )));
        }
        normalized.push(slug);
    }

    Ok(normalized)
}
