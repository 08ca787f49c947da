//! End-to-end coverage of the relational store against a real Postgres
//! instance, provisioned per test by `sqlx::test` from `./migrations`.

use chrono::{Duration, Utc};
use jobmesh::config::Config;
use jobmesh::llm::LlmTagExtractor;
use jobmesh::store::{JobRecord, Store};
use rust_decimal::Decimal;
use sqlx::PgPool;

fn record(link: &str, posted_on: chrono::DateTime<Utc>) -> JobRecord {
    JobRecord {
        title: "Senior Backend Engineer".to_string(),
        description: Some("Build and operate our ingestion pipeline".to_string()),
        link: link.to_string(),
        min_salary: Some(Decimal::from(120_000)),
        max_salary: Some(Decimal::from(160_000)),
        posted_on,
        is_remote: true,
        locations: vec!["US".to_string()],
        company_name: Some("Acme".to_string()),
        tags: vec!["backend".to_string(), "rust".to_string()],
        payload: r#"{"title":"Senior Backend Engineer"}"#.to_string(),
        extra_info: None,
    }
}

fn test_config() -> Config {
    Config {
        database_url: String::new(),
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

#[sqlx::test(migrations = "./migrations")]
async fn upserting_the_same_link_twice_is_idempotent(db: PgPool) {
    let store = Store::from_pool(db);
    let job = record("https://example.com/jobs/1", Utc::now());

    let first = store.upsert_jobs(&[job.clone()]).await.unwrap();
    assert_eq!(first.len(), 1);

    let second = store.upsert_jobs(&[job]).await.unwrap();
    assert!(second.is_empty(), "re-inserting an existing link must not produce a new row");

    let existing = store
        .existing_links(&["https://example.com/jobs/1".to_string()])
        .await
        .unwrap();
    assert_eq!(existing.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn existing_links_is_case_insensitive(db: PgPool) {
    let store = Store::from_pool(db);
    store
        .upsert_jobs(&[record("https://example.com/jobs/CaSeD", Utc::now())])
        .await
        .unwrap();

    let existing = store
        .existing_links(&["https://EXAMPLE.com/jobs/cased".to_string()])
        .await
        .unwrap();
    assert_eq!(existing.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn watermark_starts_unset_and_advances(db: PgPool) {
    let store = Store::from_pool(db);

    let initial = store.get_or_create_watermark("remotive").await.unwrap();
    assert_eq!(initial.last_run_at, None);

    let now = Utc::now();
    store.advance_watermark("remotive", now).await.unwrap();

    let advanced = store.get_or_create_watermark("remotive").await.unwrap();
    assert_eq!(advanced.last_run_at.unwrap().timestamp(), now.timestamp());
}

#[sqlx::test(migrations = "./migrations")]
async fn purge_removes_jobs_older_than_retention_and_their_payloads(db: PgPool) {
    let store = Store::from_pool(db);
    let stale = record("https://example.com/jobs/stale", Utc::now() - Duration::days(120));
    let fresh = record("https://example.com/jobs/fresh", Utc::now());
    store.upsert_jobs(&[stale, fresh]).await.unwrap();

    let deleted = store.purge_old_jobs(Duration::days(90)).await.unwrap();
    assert_eq!(deleted, 1);

    let remaining = store
        .existing_links(&[
            "https://example.com/jobs/stale".to_string(),
            "https://example.com/jobs/fresh".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains("https://example.com/jobs/fresh"));
}

#[sqlx::test(migrations = "./migrations")]
async fn fill_missing_tags_skips_batches_without_an_api_key(db: PgPool) {
    let store = Store::from_pool(db);
    let mut job = record("https://example.com/jobs/tagless", Utc::now());
    job.tags.clear();
    store.upsert_jobs(&[job]).await.unwrap();

    let llm = LlmTagExtractor::new(&test_config());
    let filled = store.fill_missing_tags(&llm).await.unwrap();
    assert_eq!(filled, 0, "without OPENAI_API_KEY the backfill must skip, not fail, the run");
}
