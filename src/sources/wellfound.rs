//! Wellfound: anti-bot-gated HTML pages embedding a Next.js `__NEXT_DATA__`
//! JSON blob, with `pageCount` revealed on the first page and the rest
//! fetched concurrently in configurable batches. Each listing's own detail
//! page additionally embeds a schema.org `JobPosting` JSON-LD block, fetched
//! lazily once per listing, that carries `applicantLocationRequirements`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::try_join_all;
use scraper::{Html, Selector};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::parser::jsonld;
use crate::parser::payload::PayloadFormat;
use crate::parser::ListingParser;
use crate::proxy::AntiBotProxy;

use super::{SourceAdapter, SourceError};

const BASE_URL: &str = "https://wellfound.com";
const SEARCH_URL: &str = "https://wellfound.com/role/r/python-developer";

pub struct Wellfound {
    proxy: Arc<AntiBotProxy>,
    batch_size: usize,
}

impl Wellfound {
    pub fn new(config: &Config) -> Self {
        Self {
            proxy: Arc::new(AntiBotProxy::new(config)),
            batch_size: config.wellfound_requests_batch_size,
        }
    }

    fn page_url(page: u32) -> String {
        if page <= 1 {
            SEARCH_URL.to_string()
        } else {
            format!("{SEARCH_URL}?page={page}")
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<String, SourceError> {
        Ok(self.proxy.fetch(&Self::page_url(page), true).await?)
    }
}

#[async_trait]
impl SourceAdapter for Wellfound {
    fn name(&self) -> &'static str {
        "wellfound"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn display_name(&self) -> &'static str {
        "Wellfound"
    }

    fn payload_format(&self) -> PayloadFormat {
        PayloadFormat::Json
    }

    async fn fetch(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Box<dyn ListingParser>>, SourceError> {
        let first_html = self.fetch_page(1).await?;
        let data = extract_next_data(&first_html).ok_or_else(|| SourceError::SchemaMismatch {
            source: "wellfound".to_string(),
            detail: "missing __NEXT_DATA__ script".to_string(),
        })?;

        let page_count = page_count(&data).max(1);
        let mut job_results = job_listing_results(&data);

        let remaining_pages: Vec<u32> = (2..=page_count).collect();
        for batch in remaining_pages.chunks(self.batch_size) {
            let pages = try_join_all(batch.iter().map(|page| self.fetch_page(*page))).await?;
            for html in pages {
                if let Some(data) = extract_next_data(&html) {
                    job_results.extend(job_listing_results(&data));
                }
            }
        }

        Ok(job_results
            .into_iter()
            .filter_map(|value| WellfoundListing::from_value(&value, self.proxy.clone()))
            .map(|listing| Box::new(listing) as Box<dyn ListingParser>)
            .collect())
    }
}

fn extract_next_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script#__NEXT_DATA__").ok()?;
    let script = document.select(&selector).next()?;
    serde_json::from_str(&script.inner_html()).ok()
}

fn page_count(data: &Value) -> u32 {
    data.pointer("/props/pageProps/pageCount")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32
}

/// Apollo's normalized cache stores every job under a
/// `JobListingSearchResult:<id>` key.
fn job_listing_results(data: &Value) -> Vec<Value> {
    let Some(apollo_state) = data.pointer("/props/pageProps/apolloState/data").and_then(Value::as_object) else {
        return Vec::new();
    };

    apollo_state
        .iter()
        .filter(|(key, _)| key.starts_with("JobListingSearchResult:"))
        .map(|(_, value)| value.clone())
        .collect()
}

struct WellfoundListing {
    link: String,
    title: String,
    description: String,
    posted_on: Option<DateTime<Utc>>,
    is_remote: bool,
    compensation: Option<String>,
    proxy: Arc<AntiBotProxy>,
    extra_info: OnceCell<Option<String>>,
}

impl WellfoundListing {
    fn from_value(value: &Value, proxy: Arc<AntiBotProxy>) -> Option<Self> {
        let slug = value.get("slug")?.as_str()?;
        let id = value.get("id")?;
        let id_str = id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string());
        let link = format!("{BASE_URL}/jobs/{id_str}-{slug}");

        let title = value.get("title")?.as_str()?.to_string();
        let description = value.get("description").and_then(Value::as_str).unwrap_or("").to_string();
        let is_remote = value.get("remote").and_then(Value::as_bool).unwrap_or(false);
        let posted_on = value
            .get("liveStartAt")
            .and_then(Value::as_i64)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
        let compensation = value.get("compensation").and_then(Value::as_str).map(str::to_string);

        Some(Self {
            link,
            title,
            description,
            posted_on,
            is_remote,
            compensation,
            proxy,
            extra_info: OnceCell::new(),
        })
    }

    async fn detail_html(&self) -> Option<&str> {
        self.extra_info
            .get_or_init(|| async {
                match self.proxy.fetch(&self.link, true).await {
                    Ok(html) => Some(html),
                    Err(err) => {
                        tracing::debug!(link = %self.link, error = %err, "detail page unavailable");
                        None
                    }
                }
            })
            .await
            .as_deref()
    }
}

#[async_trait]
impl ListingParser for WellfoundListing {
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
        self.posted_on
    }

    fn raw_tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn raw_salary(&self) -> Option<String> {
        self.compensation.clone()
    }

    fn is_remote(&self) -> bool {
        self.is_remote
    }

    fn raw_locations(&self) -> Vec<String> {
        // `applicantLocationRequirements` lives in the detail page's JSON-LD
        // block, not the search-result entry; `extra_info()` has already
        // primed the cache by the time this runs (spec §4.4 JSON-LD location
        // extraction).
        self.extra_info
            .get()
            .and_then(|cached| cached.as_deref())
            .map(jsonld::extract_locations)
            .unwrap_or_default()
    }

    fn company_name(&self) -> &str {
        ""
    }

    async fn extra_info(&self) -> Option<String> {
        self.detail_html().await.map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/jobmesh".to_string(),
            log_level: "INFO".to_string(),
            job_age_limit_days: 90,
            default_http_timeout: 30,
            default_currency: "USD".to_string(),
            default_locale: "en_US".to_string(),
            scrapfly_api_key: None,
            scrapfly_request_timeout: 500,
            wellfound_requests_batch_size: 5,
            himalayas_requests_batch_size: 5,
            work_at_a_startup_cookie: None,
            work_at_a_startup_csrf_token: None,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_read_timeout: 60,
            sentry_dsn: None,
            sentry_traces_sample_rate: 0.0,
            env: "production".to_string(),
        }
    }

    fn test_proxy() -> Arc<AntiBotProxy> {
        Arc::new(AntiBotProxy::new(&test_config()))
    }

    fn next_data_html(page_count: u32, jobs: Value) -> String {
        let data = serde_json::json!({
            "props": {
                "pageProps": {
                    "pageCount": page_count,
                    "apolloState": { "data": jobs }
                }
            }
        });
        format!(
            r#"<html><body><script id="__NEXT_DATA__" type="application/json">{data}</script></body></html>"#
        )
    }

    #[test]
    fn extracts_page_count_and_job_results() {
        let html = next_data_html(
            3,
            serde_json::json!({
                "JobListingSearchResult:1": {
                    "id": "1", "slug": "engineer", "title": "Engineer", "description": "Build things",
                    "remote": true, "liveStartAt": 1_700_000_000, "compensation": "$100,000 – $150,000"
                },
                "Company:99": { "name": "Acme" }
            }),
        );

        let data = extract_next_data(&html).unwrap();
        assert_eq!(page_count(&data), 3);

        let results = job_listing_results(&data);
        assert_eq!(results.len(), 1);

        let listing = WellfoundListing::from_value(&results[0], test_proxy()).unwrap();
        assert_eq!(listing.link, "https://wellfound.com/jobs/1-engineer");
        assert!(listing.is_remote);
    }

    #[test]
    fn missing_next_data_returns_none() {
        assert!(extract_next_data("<html><body>nothing</body></html>").is_none());
    }

    #[tokio::test]
    async fn raw_locations_resolves_json_ld_from_cached_detail_page() {
        let listing = WellfoundListing::from_value(
            &serde_json::json!({
                "id": "1", "slug": "engineer", "title": "Engineer", "description": "Build things",
            }),
            test_proxy(),
        )
        .unwrap();

        listing
            .extra_info
            .set(Some(
                r#"<html><head><script type="application/ld+json">
                    {"@type":"JobPosting","applicantLocationRequirements":{"name":"France"}}
                </script></head></html>"#
                    .to_string(),
            ))
            .unwrap();

        assert_eq!(listing.raw_locations(), vec!["FR".to_string()]);
    }
}
