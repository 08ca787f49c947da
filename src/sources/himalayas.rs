//! Himalayas: cursor/offset JSON API with a total count, fetched in
//! concurrent batches with early-exit once a whole batch predates the
//! watermark cutoff.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::http::{ClientFactory, RetryPolicy};
use crate::parser::payload::PayloadFormat;
use crate::parser::ListingParser;

use super::common::{default_fetch_context, get_json};
use super::{SourceAdapter, SourceError};

const URL: &str = "https://himalayas.app/jobs/api";
const BASE_URL: &str = "https://himalayas.app";
const PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
struct HimalayasResponse {
    #[serde(rename = "totalCount")]
    total_count: u32,
    jobs: Vec<HimalayasJob>,
}

#[derive(Debug, Deserialize, Clone)]
struct HimalayasJob {
    title: String,
    description: String,
    guid: String,
    #[serde(rename = "pubDate")]
    pub_date: i64,
    #[serde(default, rename = "locationRestrictions")]
    location_restrictions: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default, rename = "parentCategories")]
    parent_categories: Vec<String>,
    #[serde(rename = "maxSalary")]
    max_salary: Option<Value>,
    currency: Option<String>,
}

impl HimalayasJob {
    fn posted_on(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.pub_date, 0).single().unwrap_or_else(Utc::now)
    }
}

pub struct Himalayas {
    factory: ClientFactory,
    policy: RetryPolicy,
    batch_size: usize,
}

impl Himalayas {
    pub fn new(config: &Config) -> Self {
        let (factory, policy) = default_fetch_context(config);
        Self {
            factory,
            policy,
            batch_size: config.himalayas_requests_batch_size,
        }
    }

    async fn fetch_page(&self, offset: u32) -> Result<HimalayasResponse, SourceError> {
        let url = format!("{URL}?offset={offset}&limit={PAGE_SIZE}");
        get_json("himalayas", &self.factory, &self.policy, &url).await
    }
}

#[async_trait]
impl SourceAdapter for Himalayas {
    fn name(&self) -> &'static str {
        "himalayas"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn display_name(&self) -> &'static str {
        "Himalayas"
    }

    fn payload_format(&self) -> PayloadFormat {
        PayloadFormat::Json
    }

    async fn fetch(&self, cutoff: DateTime<Utc>) -> Result<Vec<Box<dyn ListingParser>>, SourceError> {
        let first = self.fetch_page(0).await?;
        let total = first.total_count;
        let mut jobs = first.jobs;
        let mut fetched = jobs.len() as u32;

        info!(source = "himalayas", fetched, total, "fetched first page");

        while fetched < total {
            let offsets: Vec<u32> = (0..self.batch_size as u32)
                .map(|i| fetched + i * PAGE_SIZE)
                .take_while(|offset| *offset < total)
                .collect();

            if offsets.is_empty() {
                break;
            }

            let batch = try_join_all(offsets.iter().map(|offset| self.fetch_page(*offset))).await?;

            let batch_jobs: Vec<HimalayasJob> = batch.into_iter().flat_map(|page| page.jobs).collect();
            if batch_jobs.is_empty() {
                break;
            }

            // Early exit: if every job in this batch predates the cutoff,
            // there's nothing fresher further along in a descending-by-date
            // feed.
            if batch_jobs.iter().all(|job| job.posted_on() < cutoff) {
                info!(source = "himalayas", fetched, "early exit: batch entirely stale");
                return Ok(to_listings(jobs));
            }

            fetched += batch_jobs.len() as u32;
            jobs.extend(batch_jobs);

            info!(source = "himalayas", fetched, total, "fetched batch");
        }

        Ok(to_listings(jobs))
    }
}

fn to_listings(jobs: Vec<HimalayasJob>) -> Vec<Box<dyn ListingParser>> {
    jobs.into_iter()
        .map(|job| Box::new(HimalayasListing { job }) as Box<dyn ListingParser>)
        .collect()
}

struct HimalayasListing {
    job: HimalayasJob,
}

#[async_trait]
impl ListingParser for HimalayasListing {
    fn link(&self) -> &str {
        &self.job.guid
    }

    fn title(&self) -> &str {
        &self.job.title
    }

    fn description(&self) -> &str {
        &self.job.description
    }

    fn posted_on(&self) -> Option<DateTime<Utc>> {
        Some(self.job.posted_on())
    }

    fn raw_tags(&self) -> Vec<String> {
        // Categories arrive hyphen-joined, e.g. "Django-Python-Developer".
        let mut tags: Vec<String> = self
            .job
            .categories
            .iter()
            .flat_map(|c| c.split('-').map(|s| s.to_string()))
            .collect();
        tags.extend(self.job.parent_categories.clone());
        tags
    }

    fn raw_salary(&self) -> Option<String> {
        let amount = self.job.max_salary.as_ref()?;
        let currency = self.job.currency.as_deref().unwrap_or("USD");
        let amount_str = match amount {
            Value::Number(n) => match n.as_f64() {
                Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
                Some(v) => v.to_string(),
                None => n.to_string(),
            },
            Value::String(s) => s.clone(),
            _ => return None,
        };
        Some(format!("{amount_str} {currency}"))
    }

    fn is_remote(&self) -> bool {
        self.job.location_restrictions.is_empty()
    }

    fn raw_locations(&self) -> Vec<String> {
        self.job.location_restrictions.clone()
    }

    fn company_name(&self) -> &str {
        ""
    }

    async fn extra_info(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(pub_date: i64, max_salary: Option<f64>) -> HimalayasJob {
        HimalayasJob {
            title: "Engineer".to_string(),
            description: "Build things".to_string(),
            guid: "https://himalayas.app/jobs/1".to_string(),
            pub_date,
            location_restrictions: vec![],
            categories: vec!["Django-Python-Developer".to_string()],
            parent_categories: vec!["Engineering".to_string()],
            max_salary: max_salary.map(|v| serde_json::json!(v)),
            currency: Some("USD".to_string()),
        }
    }

    #[test]
    fn splits_hyphenated_categories_into_tags() {
        let listing = HimalayasListing { job: job(1_700_000_000, None) };
        assert_eq!(
            listing.raw_tags(),
            vec!["Django".to_string(), "Python".to_string(), "Developer".to_string(), "Engineering".to_string()]
        );
    }

    #[test]
    fn no_location_restrictions_means_remote() {
        let listing = HimalayasListing { job: job(1_700_000_000, None) };
        assert!(listing.is_remote());
    }

    #[test]
    fn max_salary_renders_as_amount_and_currency() {
        let listing = HimalayasListing { job: job(1_700_000_000, Some(120_000.0)) };
        assert_eq!(listing.raw_salary().as_deref(), Some("120000 USD"));
    }

    #[test]
    fn missing_max_salary_is_none() {
        let listing = HimalayasListing { job: job(1_700_000_000, None) };
        assert_eq!(listing.raw_salary(), None);
    }
}
