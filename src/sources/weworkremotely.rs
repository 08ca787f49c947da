//! We Work Remotely: fixed-page RSS feed fetched through the anti-bot
//! gateway, with salary/tags/remoteness recovered from each listing's detail
//! page — fetched lazily and cached once per listing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::parser::jsonld;
use crate::parser::payload::PayloadFormat;
use crate::parser::ListingParser;
use crate::proxy::AntiBotProxy;

use super::{SourceAdapter, SourceError};

const BASE_URL: &str = "https://weworkremotely.com";
const FEED_URL: &str = "https://weworkremotely.com/categories/remote-programming-jobs.rss";

pub struct WeWorkRemotely {
    proxy: Arc<AntiBotProxy>,
}

impl WeWorkRemotely {
    pub fn new(config: &Config) -> Self {
        Self {
            proxy: Arc::new(AntiBotProxy::new(config)),
        }
    }
}

#[async_trait]
impl SourceAdapter for WeWorkRemotely {
    fn name(&self) -> &'static str {
        "weworkremotely"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn display_name(&self) -> &'static str {
        "We Work Remotely"
    }

    fn payload_format(&self) -> PayloadFormat {
        PayloadFormat::Xml
    }

    async fn fetch(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Box<dyn ListingParser>>, SourceError> {
        let body = self.proxy.fetch(FEED_URL, false).await?;
        let feed = feed_rs::parser::parse(body.as_bytes()).map_err(|e| SourceError::Feed(e.to_string()))?;

        Ok(feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let link = entry.links.first()?.href.clone();
                let title = entry.title.as_ref()?.content.clone();
                let description = entry
                    .summary
                    .as_ref()
                    .map(|t| t.content.clone())
                    .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
                    .unwrap_or_default();
                let posted_on = entry.published.or(entry.updated);

                Some(Box::new(WeWorkRemotelyListing {
                    link,
                    title,
                    description,
                    posted_on,
                    proxy: self.proxy.clone(),
                    extra_info: OnceCell::new(),
                }) as Box<dyn ListingParser>)
            })
            .collect())
    }
}

struct WeWorkRemotelyListing {
    link: String,
    title: String,
    description: String,
    posted_on: Option<DateTime<Utc>>,
    proxy: Arc<AntiBotProxy>,
    extra_info: OnceCell<Option<String>>,
}

impl WeWorkRemotelyListing {
    async fn detail_html(&self) -> Option<&str> {
        self.extra_info
            .get_or_init(|| async {
                match self.proxy.fetch(&self.link, false).await {
                    Ok(html) => Some(html),
                    Err(err) => {
                        // A 410 means the listing was retired; degrade
                        // gracefully rather than failing the whole run.
                        tracing::debug!(link = %self.link, error = %err, "detail page unavailable");
                        None
                    }
                }
            })
            .await
            .as_deref()
    }

    fn parse_is_remote(html: &str) -> bool {
        html.to_lowercase().contains("anywhere in the world")
    }

    fn parse_tags(html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("span.box--multi.box--blue") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn parse_salary(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("li") else {
            return None;
        };
        document.select(&selector).find_map(|el| {
            let text = el.text().collect::<String>();
            if text.to_lowercase().contains("salary") {
                Some(text.trim().to_string())
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl ListingParser for WeWorkRemotelyListing {
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
        // `extra_info()` is always awaited before these synchronous
        // extractors run, so the cache is already populated; absence
        // (detail page unreachable, e.g. retired listing) degrades to an
        // empty tag list rather than blocking.
        self.extra_info
            .get()
            .and_then(|cached| cached.as_deref())
            .map(Self::parse_tags)
            .unwrap_or_default()
    }

    fn raw_salary(&self) -> Option<String> {
        self.extra_info
            .get()
            .and_then(|cached| cached.as_deref())
            .and_then(Self::parse_salary)
    }

    fn is_remote(&self) -> bool {
        self.extra_info
            .get()
            .and_then(|cached| cached.as_deref())
            .map(Self::parse_is_remote)
            .unwrap_or(false)
    }

    fn raw_locations(&self) -> Vec<String> {
        // Location names live in a `JobPosting` JSON-LD block on the detail
        // page, not the RSS entry itself; `extra_info()` has already primed
        // the cache by the time this runs (spec §4.4 JSON-LD location
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

    fn listing_with_detail_html(html: &str) -> WeWorkRemotelyListing {
        let cache = OnceCell::new();
        cache.set(Some(html.to_string())).unwrap();
        WeWorkRemotelyListing {
            link: "https://weworkremotely.com/remote-jobs/acme-engineer".to_string(),
            title: "Engineer".to_string(),
            description: "Build things".to_string(),
            posted_on: None,
            proxy: Arc::new(AntiBotProxy::new(&test_config())),
            extra_info: cache,
        }
    }

    const DETAIL_HTML: &str = r#"
        <html><body>
            <ul>
                <li>Region: <span>Anywhere in the World</span></li>
                <li>Skills: <span class="box box--multi box--blue">rust</span>
                    <span class="box box--multi box--blue">postgres</span></li>
                <li>Salary: $100,000 - $150,000</li>
            </ul>
        </body></html>
    "#;

    #[test]
    fn parses_is_remote_from_detail_page() {
        assert!(WeWorkRemotelyListing::parse_is_remote(DETAIL_HTML));
        assert!(!WeWorkRemotelyListing::parse_is_remote("<html>Onsite in NYC</html>"));
    }

    #[test]
    fn parses_tags_from_detail_page() {
        let tags = WeWorkRemotelyListing::parse_tags(DETAIL_HTML);
        assert_eq!(tags, vec!["rust".to_string(), "postgres".to_string()]);
    }

    #[test]
    fn parses_salary_line_from_detail_page() {
        let salary = WeWorkRemotelyListing::parse_salary(DETAIL_HTML).unwrap();
        assert!(salary.contains("100,000"));
    }

    #[test]
    fn missing_salary_element_yields_none() {
        assert_eq!(WeWorkRemotelyListing::parse_salary("<html><li>No info</li></html>"), None);
    }

    #[tokio::test]
    async fn raw_locations_resolves_json_ld_from_detail_page() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type":"JobPosting","applicantLocationRequirements":{"name":"Germany"}}
        </script></head><body></body></html>"#;
        let listing = listing_with_detail_html(html);

        // Prime the cache the same way `parse_listing` does before reading
        // the synchronous extractors.
        let _ = listing.extra_info().await;

        assert_eq!(listing.raw_locations(), vec!["DE".to_string()]);
    }

    #[tokio::test]
    async fn raw_locations_is_empty_without_json_ld_block() {
        let listing = listing_with_detail_html(DETAIL_HTML);
        let _ = listing.extra_info().await;

        assert!(listing.raw_locations().is_empty());
    }
}
