//! Fetch orchestrator: drives one source run end to end — watermark load,
//! adapter fetch, recency/dedup filtering, parsing, store upsert, watermark
//! advance — and keeps failures scoped to their own source so a single
//! broken source never aborts the others.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::parser::{self, payload, salary};
use crate::reference::location;
use crate::sources::{SourceAdapter, SourceError};
use crate::store::{JobRecord, Store, StoreError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("cannot pass both --include-portals and --exclude-portals")]
    ConflictingFilters,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one source run, surfaced for CLI/scheduler logging.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub source: String,
    pub discovered: usize,
    pub kept: usize,
    pub new_jobs: usize,
}

/// Resolve the requested source name set against the full registry for the
/// `fetch --include-portals`/`--exclude-portals` CLI flags.
pub fn select_sources<'a>(
    registry: &'a BTreeMap<&'static str, Box<dyn SourceAdapter>>,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<&'a str>, OrchestratorError> {
    if !include.is_empty() && !exclude.is_empty() {
        return Err(OrchestratorError::ConflictingFilters);
    }

    if !include.is_empty() {
        for name in include {
            if !registry.contains_key(name.as_str()) {
                return Err(OrchestratorError::UnknownSource(name.clone()));
            }
        }
        return Ok(registry
            .keys()
            .copied()
            .filter(|k| include.iter().any(|n| n == k))
            .collect());
    }

    if !exclude.is_empty() {
        for name in exclude {
            if !registry.contains_key(name.as_str()) {
                return Err(OrchestratorError::UnknownSource(name.clone()));
            }
        }
        return Ok(registry
            .keys()
            .copied()
            .filter(|k| !exclude.iter().any(|n| n == k))
            .collect());
    }

    Ok(registry.keys().copied().collect())
}

/// Run the full pipeline for a single source.
pub async fn run_source(
    store: &Store,
    adapter: &dyn SourceAdapter,
    config: &Config,
) -> Result<RunSummary, OrchestratorError> {
    let watermark = store.get_or_create_watermark(adapter.name()).await?;

    let cutoff = match watermark.last_run_at {
        Some(last_run) => last_run - Duration::minutes(5),
        None => Utc::now() - config.job_age_limit(),
    };

    info!(source = adapter.name(), %cutoff, "starting source run");

    let discovered = adapter.fetch(cutoff).await?;
    let discovered_count = discovered.len();

    let mut kept = Vec::with_capacity(discovered.len());
    for listing in discovered {
        if parser::is_recent(listing.posted_on(), cutoff) {
            kept.push(listing);
        }
    }
    let kept_before_dedup = kept.len();

    let links: Vec<String> = kept.iter().map(|l| l.link().to_string()).collect();
    let existing = store.existing_links(&links).await?;
    let kept: Vec<_> = kept
        .into_iter()
        .filter(|l| !existing.contains(&l.link().to_lowercase()))
        .collect();

    let mut records = Vec::with_capacity(kept.len());
    for listing in &kept {
        let parsed = parser::parse_listing(
            listing.as_ref(),
            &config.default_locale,
            &config.default_currency,
        )
        .await;

        let record = build_job_record(
            &parsed,
            adapter.payload_format(),
            config,
        )
        .await;

        match record {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(source = adapter.name(), link = %parsed.link, error = %err, "dropping listing: payload render failed");
            }
        }
    }

    let new_ids = store.upsert_jobs(&records).await?;
    store.advance_watermark(adapter.name(), Utc::now()).await?;

    info!(
        source = adapter.name(),
        discovered = discovered_count,
        kept = kept_before_dedup,
        new_jobs = new_ids.len(),
        "source run complete"
    );

    Ok(RunSummary {
        source: adapter.name().to_string(),
        discovered: discovered_count,
        kept: kept_before_dedup,
        new_jobs: new_ids.len(),
    })
}

/// Build a store-ready [`JobRecord`] from a parsed listing: convert salary
/// into the default currency, drop any inverted range (defensive — the
/// parser should never emit one), and restrict locations to the closed
/// vocabulary.
async fn build_job_record(
    parsed: &parser::ParsedJob,
    format: payload::PayloadFormat,
    config: &Config,
) -> Result<JobRecord, payload::PayloadError> {
    let (min_salary, max_salary) = match &parsed.salary {
        Some(range) => {
            let min = match &range.min.amount {
                Some(_) => {
                    salary::convert_to_default_currency(
                        &range.min,
                        parsed.posted_on.date_naive(),
                        &config.default_currency,
                        config.default_http_timeout(),
                    )
                    .await
                }
                None => None,
            };
            let max = salary::convert_to_default_currency(
                &range.max,
                parsed.posted_on.date_naive(),
                &config.default_currency,
                config.default_http_timeout(),
            )
            .await;

            match (min, max) {
                (Some(min), Some(max)) if max < min => {
                    warn!(link = %parsed.link, "dropping inverted salary range");
                    (None, None)
                }
                other => other,
            }
        }
        None => (None, None),
    };

    let locations: Vec<String> = parsed
        .locations
        .iter()
        .filter(|code| location::is_valid_code(code))
        .cloned()
        .collect();

    let payload_body = serde_json::to_string(&serde_json::json!({
        "title": parsed.title,
        "link": parsed.link,
        "company_name": parsed.company_name,
    }))
    .unwrap_or_default();
    let rendered_payload = payload::render(format, &payload_body)?;

    Ok(JobRecord {
        title: parsed.title.clone(),
        description: Some(parsed.description.clone()).filter(|d| !d.is_empty()),
        link: parsed.link.clone(),
        min_salary,
        max_salary,
        posted_on: parsed.posted_on,
        is_remote: parsed.is_remote,
        locations,
        company_name: Some(parsed.company_name.clone()).filter(|c| !c.is_empty()),
        tags: parsed.tags.clone(),
        payload: rendered_payload,
        extra_info: None,
    })
}
