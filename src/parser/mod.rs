//! Parser framework (spec §4.4): turns a source-specific raw listing into a
//! normalized [`ParsedJob`] through a fixed discovered → kept → parsed →
//! emitted pipeline, shared by every source adapter.

pub mod jsonld;
pub mod payload;
pub mod salary;
pub mod tags;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::parser::salary::{Money, SalaryRange};
use crate::reference::location;

/// Where a listing currently sits in the per-source ingestion pipeline.
/// Adapters only ever move a listing forward; nothing transitions backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStage {
    /// Returned by the source adapter, not yet checked against the cutoff.
    Discovered,
    /// Passed the recency gate (`posted_on >= cutoff`).
    Kept,
    /// Field extraction (salary, tags, locations) has run.
    Parsed,
    /// Handed to the store for persistence.
    Emitted,
}

/// Extension points a source-specific raw listing implements so the shared
/// pipeline below can stay source-agnostic. Each of the six adapters
/// (spec §4.8) implements this for its own wire representation.
#[async_trait]
pub trait ListingParser: Send + Sync {
    fn link(&self) -> &str;
    fn title(&self) -> &str;
    fn description(&self) -> &str;

    /// `None` for sources whose raw items carry no posting date (spec §4.8);
    /// the recency gate is skipped for those and the store assigns ingestion
    /// time as the persisted `posted_on` (spec §3 Job lifecycle).
    fn posted_on(&self) -> Option<DateTime<Utc>>;
    fn raw_tags(&self) -> Vec<String>;
    fn raw_salary(&self) -> Option<String>;
    fn is_remote(&self) -> bool;
    fn raw_locations(&self) -> Vec<String>;
    fn company_name(&self) -> &str;

    /// Supplementary detail-page content, fetched lazily (and cached by the
    /// implementor after the first call) since most listings never need it
    /// — e.g. We Work Remotely's per-job detail page (spec §4.8).
    async fn extra_info(&self) -> Option<String>;
}

/// A listing after field extraction, ready for the store (spec §3 `Job`).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedJob {
    pub link: String,
    pub title: String,
    pub description: String,
    pub posted_on: DateTime<Utc>,
    pub tags: Vec<String>,
    pub salary: Option<SalaryRange>,
    pub is_remote: bool,
    pub locations: Vec<String>,
    pub company_name: String,
}

/// The recency gate: a discovered listing is kept only if it was posted on
/// or after `cutoff` (spec §4.4, §4.9 watermark semantics). A listing with
/// no posting date at all (spec §4.8) always passes the gate — the gate has
/// nothing to compare against, so it defers to the store's ingestion-time
/// default instead of dropping the listing.
pub fn is_recent(posted_on: Option<DateTime<Utc>>, cutoff: DateTime<Utc>) -> bool {
    match posted_on {
        Some(posted_on) => posted_on >= cutoff,
        None => true,
    }
}

/// Run a kept listing through field extraction (spec §4.4). Salary and
/// location parsing failures are non-fatal: an unparsable salary degrades
/// the listing to "salary unknown" rather than dropping it (spec §7
/// `InvalidSalary`/`InvalidLocation`). `posted_on` defaults to ingestion time
/// when the source provided none (spec §3 Job lifecycle, §4.8).
pub async fn parse_listing(
    listing: &dyn ListingParser,
    locale: &str,
    default_currency: &str,
) -> ParsedJob {
    // Prime any lazily-fetched detail page before the synchronous field
    // extractors run, so adapters whose salary/tags/remoteness live on a
    // detail page (e.g. We Work Remotely) see it populated (spec §4.4 "lazy
    // cached `extra_info`").
    let _ = listing.extra_info().await;

    // Try the range form first ("$100,000 - $150,000"); sources that only
    // ever report a single figure (e.g. Himalayas' `maxSalary`) fall back to
    // the single-amount parser and populate `max` only — this crate keeps
    // the range-shaped schema throughout rather than a separate single-value
    // column (spec §9 Open Question, resolved).
    let salary = match listing.raw_salary() {
        Some(text) => match salary::extract_salary_range(&text, locale, default_currency) {
            Ok(range) => Some(range),
            Err(_) => match salary::extract_salary(&text, locale, default_currency) {
                Ok(money) => Some(SalaryRange {
                    min: Money::default(),
                    max: money,
                }),
                Err(err) => {
                    debug!(link = listing.link(), error = %err, "salary parse failed, leaving unknown");
                    None
                }
            },
        },
        None => None,
    };

    let tags = tags::normalize_all(&listing.raw_tags());
    let locations = location::resolve_locations(&listing.raw_locations());

    ParsedJob {
        link: listing.link().to_string(),
        title: listing.title().to_string(),
        description: listing.description().to_string(),
        posted_on: listing.posted_on().unwrap_or_else(Utc::now),
        tags,
        salary,
        is_remote: listing.is_remote(),
        locations,
        company_name: listing.company_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;

    struct FakeListing {
        link: String,
        posted_on: Option<DateTime<Utc>>,
        salary: Option<String>,
        tags: Vec<String>,
        locations: Vec<String>,
    }

    #[async_trait]
    impl ListingParser for FakeListing {
        fn link(&self) -> &str {
            &self.link
        }
        fn title(&self) -> &str {
            "Senior Engineer"
        }
        fn description(&self) -> &str {
            "Build things."
        }
        fn posted_on(&self) -> Option<DateTime<Utc>> {
            self.posted_on
        }
        fn raw_tags(&self) -> Vec<String> {
            self.tags.clone()
        }
        fn raw_salary(&self) -> Option<String> {
            self.salary.clone()
        }
        fn is_remote(&self) -> bool {
            true
        }
        fn raw_locations(&self) -> Vec<String> {
            self.locations.clone()
        }
        fn company_name(&self) -> &str {
            "Acme"
        }
        async fn extra_info(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn recency_gate_keeps_posted_on_or_after_cutoff() {
        let cutoff = Utc::now() - Duration::days(1);
        assert!(is_recent(Some(Utc::now()), cutoff));
        assert!(is_recent(Some(cutoff), cutoff));
        assert!(!is_recent(Some(cutoff - Duration::seconds(1)), cutoff));
    }

    #[test]
    fn recency_gate_keeps_listings_with_no_posting_date() {
        let cutoff = Utc::now() - Duration::days(1);
        assert!(is_recent(None, cutoff));
    }

    #[tokio::test]
    async fn parse_listing_normalizes_tags_and_locations() {
        let listing = FakeListing {
            link: "https://example.com/job/1".to_string(),
            posted_on: Some(Utc::now()),
            salary: Some("$100,000 - $150,000".to_string()),
            tags: vec!["Back-end".to_string(), "backend".to_string()],
            locations: vec!["United States".to_string(), "Narnia".to_string()],
        };

        let parsed = parse_listing(&listing, "en_US", "USD").await;

        assert_eq!(parsed.tags, vec!["backend".to_string()]);
        assert_eq!(parsed.locations, vec!["US".to_string()]);
        assert!(parsed.salary.is_some());
    }

    #[tokio::test]
    async fn unparsable_salary_degrades_to_none_without_dropping_listing() {
        let listing = FakeListing {
            link: "https://example.com/job/2".to_string(),
            posted_on: Some(Utc::now()),
            salary: Some("competitive".to_string()),
            tags: vec![],
            locations: vec![],
        };

        let parsed = parse_listing(&listing, "en_US", "USD").await;
        assert_eq!(parsed.salary, None);
        assert_eq!(parsed.link, "https://example.com/job/2");
    }

    #[tokio::test]
    async fn missing_posted_on_defaults_to_ingestion_time() {
        let listing = FakeListing {
            link: "https://example.com/job/3".to_string(),
            posted_on: None,
            salary: None,
            tags: vec![],
            locations: vec![],
        };

        let before = Utc::now();
        let parsed = parse_listing(&listing, "en_US", "USD").await;
        assert!(parsed.posted_on >= before);
    }
}
