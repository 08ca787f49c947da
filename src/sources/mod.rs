//! Source adapters: one module per upstream job board, each implementing
//! [`SourceAdapter`] so the orchestrator can drive all six the same way
//! regardless of their wildly different pagination disciplines.

pub mod common;
pub mod himalayas;
pub mod python_dot_org;
pub mod remotive;
pub mod weworkremotely;
pub mod wellfound;
pub mod work_at_a_startup;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::Config;
use crate::http::HttpError;
use crate::parser::payload::PayloadFormat;
use crate::parser::ListingParser;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("failed to parse feed: {0}")]
    Feed(String),

    #[error("unexpected response shape from {source}: {detail}")]
    SchemaMismatch { source: String, detail: String },
}

/// A single upstream job board. `fetch` returning every listing discovered
/// newer than `cutoff` is NOT guaranteed — some adapters (RSS feeds, fixed
/// JSON dumps) return everything and let the orchestrator apply the recency
/// gate; paginated adapters apply an early-exit themselves.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key.
    fn name(&self) -> &'static str;

    /// Prefix used to derive `Job.portal_name` from a persisted link.
    fn base_url(&self) -> &'static str;

    /// Human-facing name stored as `Job.portal_name` when `base_url`
    /// matches.
    fn display_name(&self) -> &'static str;

    /// Wire format of the raw payload this adapter retains.
    fn payload_format(&self) -> PayloadFormat;

    async fn fetch(&self, cutoff: DateTime<Utc>) -> Result<Vec<Box<dyn ListingParser>>, SourceError>;
}

/// Derive `Job.portal_name` from a persisted link by matching it against
/// every registered adapter's `base_url`, longest prefix first so a more
/// specific base URL wins over a shorter one.
pub fn portal_name_for_link<'a>(
    sources: &'a BTreeMap<&'static str, Box<dyn SourceAdapter>>,
    link: &str,
) -> Option<&'a str> {
    sources
        .values()
        .filter(|adapter| link.starts_with(adapter.base_url()))
        .max_by_key(|adapter| adapter.base_url().len())
        .map(|adapter| adapter.display_name())
}

/// Build the full set of source adapters keyed by name.
pub fn registry(config: &Config) -> BTreeMap<&'static str, Box<dyn SourceAdapter>> {
    let mut sources: BTreeMap<&'static str, Box<dyn SourceAdapter>> = BTreeMap::new();
    sources.insert("remotive", Box::new(remotive::Remotive::new(config)));
    sources.insert("python_dot_org", Box::new(python_dot_org::PythonDotOrg::new(config)));
    sources.insert("weworkremotely", Box::new(weworkremotely::WeWorkRemotely::new(config)));
    sources.insert("himalayas", Box::new(himalayas::Himalayas::new(config)));
    sources.insert("wellfound", Box::new(wellfound::Wellfound::new(config)));
    sources.insert(
        "work_at_a_startup",
        Box::new(work_at_a_startup::WorkAtAStartup::new(config)),
    );
    sources
}
