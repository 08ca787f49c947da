//! Work at a Startup: two independent requests — an Algolia search that
//! yields a page of company ids, then an authenticated company-fetch call
//! (session cookie + CSRF header) that returns each company's own jobs
//! inline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::http::{retry_with_policy, ClientFactory, HttpError, RequestOverrides, RetryPolicy};
use crate::parser::payload::PayloadFormat;
use crate::parser::ListingParser;

use super::SourceError;

const BASE_URL: &str = "https://www.workatastartup.com";
const COMPANIES_FETCH_URL: &str = "https://www.workatastartup.com/companies/fetch";
const ALGOLIA_URL: &str = "https://45bwzj1sgc-3.algolianet.com/1/indexes/*/queries";
const ALGOLIA_INDEX: &str = "WaaSPublicCompanyJob_created_at_desc_production";
const HITS_PER_PAGE: u32 = 100;

pub struct WorkAtAStartup {
    factory: ClientFactory,
    policy: RetryPolicy,
    cookie: Option<String>,
    csrf_token: Option<String>,
}

impl WorkAtAStartup {
    pub fn new(config: &Config) -> Self {
        Self {
            factory: ClientFactory::new(config.default_http_timeout()),
            policy: RetryPolicy::default(),
            cookie: config.work_at_a_startup_cookie.clone(),
            csrf_token: config.work_at_a_startup_csrf_token.clone(),
        }
    }

    async fn search_company_ids(&self) -> Result<Vec<Value>, SourceError> {
        let body = serde_json::json!({
            "requests": [{
                "indexName": ALGOLIA_INDEX,
                "params": format!("hitsPerPage={HITS_PER_PAGE}"),
            }]
        });

        let response: AlgoliaResponse = retry_with_policy(&self.policy, || async {
            let client = self.factory.build(&RequestOverrides::default())?;
            let response = client
                .post(ALGOLIA_URL)
                .json(&body)
                .send()
                .await
                .map_err(|e| HttpError::Request {
                    url: ALGOLIA_URL.to_string(),
                    source: e,
                })?;
            let status = response.status();
            if !status.is_success() {
                return Err(HttpError::Status {
                    status: status.as_u16(),
                    url: ALGOLIA_URL.to_string(),
                    message: response.text().await.unwrap_or_default(),
                    retryable: status.as_u16() == 429 || status.is_server_error(),
                });
            }
            response.json().await.map_err(|e| HttpError::Request {
                url: ALGOLIA_URL.to_string(),
                source: e,
            })
        })
        .await?;

        Ok(response
            .results
            .into_iter()
            .flat_map(|result| result.hits)
            .map(|hit| hit.company_id)
            .collect())
    }

    async fn fetch_companies(&self, company_ids: Vec<Value>) -> Result<CompaniesResponse, SourceError> {
        let mut headers = std::collections::HashMap::new();
        if let Some(token) = &self.csrf_token {
            headers.insert("x-csrf-token".to_string(), token.clone());
        }
        let mut cookies = std::collections::HashMap::new();
        if let Some(cookie) = &self.cookie {
            cookies.insert("_bf_session_key".to_string(), cookie.clone());
        }
        let overrides = RequestOverrides {
            headers,
            cookies,
            timeout: None,
        };

        let body = serde_json::json!({ "ids": company_ids });

        retry_with_policy(&self.policy, || async {
            let client = self.factory.build(&overrides)?;
            let mut request = client.post(COMPANIES_FETCH_URL).json(&body);
            if let Some(cookie) = &self.cookie {
                request = request.header(reqwest::header::COOKIE, format!("_bf_session_key={cookie}"));
            }
            let response = request.send().await.map_err(|e| HttpError::Request {
                url: COMPANIES_FETCH_URL.to_string(),
                source: e,
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(HttpError::Status {
                    status: status.as_u16(),
                    url: COMPANIES_FETCH_URL.to_string(),
                    message: response.text().await.unwrap_or_default(),
                    retryable: status.as_u16() == 429 || status.is_server_error(),
                });
            }
            response.json().await.map_err(|e| HttpError::Request {
                url: COMPANIES_FETCH_URL.to_string(),
                source: e,
            })
        })
        .await
        .map_err(SourceError::from)
    }
}

#[derive(Debug, Deserialize)]
struct AlgoliaResponse {
    results: Vec<AlgoliaResult>,
}

#[derive(Debug, Deserialize)]
struct AlgoliaResult {
    hits: Vec<AlgoliaHit>,
}

#[derive(Debug, Deserialize)]
struct AlgoliaHit {
    company_id: Value,
}

#[derive(Debug, Deserialize)]
struct CompaniesResponse {
    companies: Vec<Company>,
}

#[derive(Debug, Deserialize)]
struct Company {
    jobs: Vec<JobItem>,
}

#[derive(Debug, Deserialize, Clone)]
struct JobItem {
    id: Value,
    title: String,
    description: String,
    pretty_salary_range: Option<String>,
    remote: Option<String>,
    #[serde(default)]
    skills: Vec<Skill>,
    #[serde(default)]
    locations: Value,
}

#[derive(Debug, Deserialize, Clone)]
struct Skill {
    name: String,
}

#[async_trait]
impl super::SourceAdapter for WorkAtAStartup {
    fn name(&self) -> &'static str {
        "work_at_a_startup"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn display_name(&self) -> &'static str {
        "Work at a Startup"
    }

    fn payload_format(&self) -> PayloadFormat {
        PayloadFormat::Json
    }

    async fn fetch(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Box<dyn ListingParser>>, SourceError> {
        let company_ids = self.search_company_ids().await?;
        let companies = self.fetch_companies(company_ids).await?;

        Ok(companies
            .companies
            .into_iter()
            .flat_map(|company| company.jobs)
            .map(|job| Box::new(WorkAtAStartupListing::from(job)) as Box<dyn ListingParser>)
            .collect())
    }
}

struct WorkAtAStartupListing {
    link: String,
    title: String,
    description: String,
    salary: Option<String>,
    is_remote: bool,
    tags: Vec<String>,
    locations: Vec<String>,
}

impl From<JobItem> for WorkAtAStartupListing {
    fn from(job: JobItem) -> Self {
        let id = job.id.as_str().map(str::to_string).unwrap_or_else(|| job.id.to_string());
        let link = format!("{BASE_URL}/jobs/{id}");

        let is_remote = job
            .remote
            .as_deref()
            .map(|r| matches!(r.to_lowercase().as_str(), "yes" | "only"))
            .unwrap_or(false);

        let tags = job.skills.into_iter().map(|s| s.name).collect();

        // Occasionally returns nested garbage like [[["Remote - UK or Europe"]]]
        // instead of a flat string list; treat anything but a flat list of
        // strings as unusable.
        let locations = match job.locations.as_array() {
            Some(items) if items.iter().all(|v| v.is_string()) => {
                items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
            }
            _ => Vec::new(),
        };

        Self {
            link,
            title: job.title,
            description: job.description,
            salary: job.pretty_salary_range,
            is_remote,
            tags,
            locations,
        }
    }
}

#[async_trait]
impl ListingParser for WorkAtAStartupListing {
    fn link(&self) -> &str {
        &self.link
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn posted_on(&self) -> Option<DateTime<Utc>> {
        // The upstream API reports no posting date for this source; the
        // recency gate is skipped and the store assigns ingestion time.
        None
    }

    fn raw_tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn raw_salary(&self) -> Option<String> {
        self.salary.clone()
    }

    fn is_remote(&self) -> bool {
        self.is_remote
    }

    fn raw_locations(&self) -> Vec<String> {
        self.locations.clone()
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

    fn job(locations: Value) -> JobItem {
        JobItem {
            id: Value::String("42".to_string()),
            title: "Founding Engineer".to_string(),
            description: "Build the thing".to_string(),
            pretty_salary_range: Some("$100,000 - $150,000".to_string()),
            remote: Some("Only".to_string()),
            skills: vec![Skill { name: "Rust".to_string() }],
            locations,
        }
    }

    #[test]
    fn builds_link_from_job_id() {
        let listing = WorkAtAStartupListing::from(job(serde_json::json!(["San Francisco"])));
        assert_eq!(listing.link, "https://www.workatastartup.com/jobs/42");
    }

    #[test]
    fn remote_only_counts_as_remote() {
        let listing = WorkAtAStartupListing::from(job(serde_json::json!([])));
        assert!(listing.is_remote);
    }

    #[test]
    fn flat_string_locations_are_kept() {
        let listing = WorkAtAStartupListing::from(job(serde_json::json!(["San Francisco", "Remote"])));
        assert_eq!(listing.locations, vec!["San Francisco".to_string(), "Remote".to_string()]);
    }

    #[test]
    fn malformed_nested_locations_are_discarded() {
        let listing = WorkAtAStartupListing::from(job(serde_json::json!([[["Remote - UK or Europe"]]])));
        assert!(listing.locations.is_empty());
    }

    #[test]
    fn no_posting_date_is_reported() {
        let listing = WorkAtAStartupListing::from(job(serde_json::json!([])));
        assert_eq!(listing.posted_on(), None);
    }
}
