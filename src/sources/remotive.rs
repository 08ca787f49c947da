//! Remotive: fixed-page JSON feed, no pagination.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::http::{ClientFactory, RetryPolicy};
use crate::parser::payload::PayloadFormat;
use crate::parser::ListingParser;

use super::common::{default_fetch_context, get_json};
use super::{SourceAdapter, SourceError};

const URL: &str = "https://remotive.com/api/remote-jobs?category=software-dev&limit=500";
const BASE_URL: &str = "https://remotive.com";
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize)]
struct RemotiveResponse {
    jobs: Vec<RemotiveJob>,
}

#[derive(Debug, Deserialize, Clone)]
struct RemotiveJob {
    title: String,
    url: String,
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    candidate_required_location: String,
    publication_date: String,
}

pub struct Remotive {
    factory: ClientFactory,
    policy: RetryPolicy,
}

impl Remotive {
    pub fn new(config: &Config) -> Self {
        let (factory, policy) = default_fetch_context(config);
        Self { factory, policy }
    }
}

#[async_trait]
impl SourceAdapter for Remotive {
    fn name(&self) -> &'static str {
        "remotive"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn display_name(&self) -> &'static str {
        "Remotive"
    }

    fn payload_format(&self) -> PayloadFormat {
        PayloadFormat::Json
    }

    async fn fetch(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Box<dyn ListingParser>>, SourceError> {
        let response: RemotiveResponse = get_json("remotive", &self.factory, &self.policy, URL).await?;

        Ok(response
            .jobs
            .into_iter()
            .map(|job| Box::new(RemotiveListing { job }) as Box<dyn ListingParser>)
            .collect())
    }
}

struct RemotiveListing {
    job: RemotiveJob,
}

impl RemotiveListing {
    fn parsed_posted_on(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.job.publication_date, DATE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[async_trait]
impl ListingParser for RemotiveListing {
    fn link(&self) -> &str {
        &self.job.url
    }

    fn title(&self) -> &str {
        &self.job.title
    }

    fn description(&self) -> &str {
        &self.job.description
    }

    fn posted_on(&self) -> Option<DateTime<Utc>> {
        self.parsed_posted_on()
    }

    fn raw_tags(&self) -> Vec<String> {
        self.job.tags.clone()
    }

    fn raw_salary(&self) -> Option<String> {
        self.job.salary.clone().filter(|s| !s.trim().is_empty())
    }

    fn is_remote(&self) -> bool {
        // Remotive is a remote-only job board by construction.
        true
    }

    fn raw_locations(&self) -> Vec<String> {
        if self.job.candidate_required_location.trim().is_empty() {
            Vec::new()
        } else {
            vec![self.job.candidate_required_location.clone()]
        }
    }

    fn company_name(&self) -> &str {
        &self.job.company_name
    }

    async fn extra_info(&self) -> Option<String> {
        None
    }
}
