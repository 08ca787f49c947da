//! python.org job board: fixed-page RSS feed, no proxy, no pagination —
//! the simplest of the six adapters.
//!
//! The RSS feed itself carries no posting date, so a second request against
//! the human-facing listing page is used to recover `<time datetime=...>`
//! per link — the one quirk this adapter has to work around.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use crate::config::Config;
use crate::http::{ClientFactory, RetryPolicy};
use crate::parser::payload::PayloadFormat;
use crate::parser::ListingParser;

use super::common::{default_fetch_context, get_text};
use super::{SourceAdapter, SourceError};

const BASE_URL: &str = "https://www.python.org";
const JOBS_URL: &str = "https://www.python.org/jobs/";
const FEED_URL: &str = "https://www.python.org/jobs/feed/rss/";

pub struct PythonDotOrg {
    factory: ClientFactory,
    policy: RetryPolicy,
}

impl PythonDotOrg {
    pub fn new(config: &Config) -> Self {
        let (factory, policy) = default_fetch_context(config);
        Self { factory, policy }
    }

    async fn fetch_posted_on_by_link(&self) -> Result<HashMap<String, DateTime<Utc>>, SourceError> {
        let html = get_text(&self.factory, &self.policy, JOBS_URL).await?;
        Ok(extract_posted_on_by_link(&html))
    }
}

/// Every `<li>` with both an `<a href>` and a `<time datetime>` contributes
/// one link → posted-on mapping.
fn extract_posted_on_by_link(html: &str) -> HashMap<String, DateTime<Utc>> {
    let document = Html::parse_document(html);
    let Ok(li_selector) = Selector::parse("li") else {
        return HashMap::new();
    };
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return HashMap::new();
    };
    let Ok(time_selector) = Selector::parse("time[datetime]") else {
        return HashMap::new();
    };

    let mut out = HashMap::new();
    for li in document.select(&li_selector) {
        let Some(link_el) = li.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link_el.value().attr("href") else {
            continue;
        };
        let Some(time_el) = li.select(&time_selector).next() else {
            continue;
        };
        let Some(datetime) = time_el.value().attr("datetime") else {
            continue;
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(datetime) {
            let link = resolve_link(href);
            out.insert(link, parsed.with_timezone(&Utc));
        }
    }
    out
}

fn resolve_link(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{BASE_URL}{href}")
    }
}

#[async_trait]
impl SourceAdapter for PythonDotOrg {
    fn name(&self) -> &'static str {
        "python_dot_org"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn display_name(&self) -> &'static str {
        "Python.org Job Board"
    }

    fn payload_format(&self) -> PayloadFormat {
        PayloadFormat::Xml
    }

    async fn fetch(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Box<dyn ListingParser>>, SourceError> {
        let posted_on_by_link = self.fetch_posted_on_by_link().await?;

        let body = get_text(&self.factory, &self.policy, FEED_URL).await?;
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
                let posted_on = posted_on_by_link.get(&link).copied();

                Some(Box::new(PythonDotOrgListing {
                    link,
                    title,
                    description,
                    posted_on,
                }) as Box<dyn ListingParser>)
            })
            .collect())
    }
}

struct PythonDotOrgListing {
    link: String,
    title: String,
    description: String,
    posted_on: Option<DateTime<Utc>>,
}

#[async_trait]
impl ListingParser for PythonDotOrgListing {
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
        // python.org's RSS carries no tags; the fill-missing-tags task
        // backfills these later via the LLM extractor.
        Vec::new()
    }

    fn raw_salary(&self) -> Option<String> {
        // The RSS description occasionally embeds a salary figure, but
        // python.org postings are overwhelmingly unpaid community listings
        // or link out for compensation details; treated as unknown here.
        None
    }

    fn is_remote(&self) -> bool {
        self.description.to_lowercase().contains("remote")
    }

    fn raw_locations(&self) -> Vec<String> {
        Vec::new()
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

    #[test]
    fn extracts_posted_on_keyed_by_absolute_link() {
        let html = r#"
            <ul>
                <li><a href="/jobs/1234/">Engineer</a><time datetime="2024-03-01T00:00:00+00:00">March 1</time></li>
                <li><a href="https://www.python.org/jobs/5678/">Other</a><time datetime="2024-02-01T00:00:00+00:00"></time></li>
                <li>no link here</li>
            </ul>
        "#;

        let map = extract_posted_on_by_link(html);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("https://www.python.org/jobs/1234/"));
        assert!(map.contains_key("https://www.python.org/jobs/5678/"));
    }

    #[test]
    fn missing_time_tag_is_skipped() {
        let html = r#"<ul><li><a href="/jobs/1/">Engineer</a></li></ul>"#;
        assert!(extract_posted_on_by_link(html).is_empty());
    }
}
