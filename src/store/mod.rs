//! Relational store (spec §4.7): batched idempotent upserts, purge, and the
//! tag-backfill job, all against a Postgres pool held process-wide
//! (spec §5 "one database connection pool, lazy-initialized").

mod error;
pub mod models;
pub mod schema;

pub use error::{Result, StoreError};
pub use models::{JobRecord, JobRow, PayloadRow, SourceWatermarkRow, TagRow};

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::{PgPool, QueryBuilder, Row};
use tracing::{debug, info, warn};

use crate::llm::{LlmTagExtractor, TagBatchInput};
use crate::reference::location;

const JOB_BATCH_SIZE: usize = 500;
const PAYLOAD_BATCH_SIZE: usize = 200;
const FILL_TAGS_BATCH_SIZE: usize = 20;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Lazily-initialized, process-wide pool (spec §5): the pool is built
    /// immediately but defers the first real connection attempt to first use.
    pub fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// One-off DB bootstrap (spec §6 CLI `setup-db`, §3 "[AMBIENT] Schema
    /// migrations"): idempotent `CREATE TABLE IF NOT EXISTS` plus seeding the
    /// closed location-code vocabulary.
    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::raw_sql(schema::SCHEMA_SQL).execute(&self.pool).await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO valid_location_codes (code) ",
        );
        builder.push_values(location::all_codes(), |mut b, code| {
            b.push_bind(*code);
        });
        builder.push(" ON CONFLICT (code) DO NOTHING");
        builder.build().execute(&self.pool).await?;

        info!("schema setup complete");
        Ok(())
    }

    /// Open a read-only transaction (spec §4.7 "Read-only vs read-write
    /// sessions"). Any INSERT/UPDATE/DELETE issued against it is rejected by
    /// Postgres itself; the transaction is rolled back on drop if never
    /// committed, guaranteeing commit-or-rollback on every exit path.
    pub async fn read_only_transaction(&self) -> Result<sqlx::Transaction<'_, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
        Ok(tx)
    }

    // -- Watermark ---------------------------------------------------------

    /// Load a source's watermark, creating a zero row on first run
    /// (spec §3 SourceWatermark lifecycle, §4.6 step 1).
    pub async fn get_or_create_watermark(&self, source_name: &str) -> Result<SourceWatermarkRow> {
        if let Some(row) = sqlx::query_as::<_, SourceWatermarkRow>(
            "SELECT id, name, last_run_at FROM source_watermark WHERE lower(name) = lower($1)",
        )
        .bind(source_name)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(row);
        }

        sqlx::query_as::<_, SourceWatermarkRow>(
            "INSERT INTO source_watermark (name, last_run_at) VALUES ($1, NULL)
             ON CONFLICT (lower(name)) DO UPDATE SET name = EXCLUDED.name
             RETURNING id, name, last_run_at",
        )
        .bind(source_name)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Advance the watermark to `at`, only after the run's store upsert has
    /// already succeeded (spec §4.6 step 6, §5 ordering guarantee).
    pub async fn advance_watermark(&self, source_name: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE source_watermark SET last_run_at = $2 WHERE lower(name) = lower($1)",
        )
        .bind(source_name)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- Dedup lookup -------------------------------------------------------

    /// Which of `links` already have a Job row, compared case-insensitively
    /// (spec §4.6 step 4). Runs on a read-only session since it's query-only.
    pub async fn existing_links(&self, links: &[String]) -> Result<HashSet<String>> {
        if links.is_empty() {
            return Ok(HashSet::new());
        }

        let lowered: Vec<String> = links.iter().map(|l| l.to_lowercase()).collect();
        let mut tx = self.read_only_transaction().await?;
        let rows = sqlx::query("SELECT lower(link) AS link FROM job WHERE lower(link) = ANY($1)")
            .bind(&lowered)
            .fetch_all(&mut *tx)
            .await?;
        tx.rollback().await?;

        Ok(rows.into_iter().map(|row| row.get::<String, _>("link")).collect())
    }

    // -- Upsert --------------------------------------------------------------

    /// Batched idempotent upsert of jobs, tags, job↔tag links, and payloads
    /// (spec §4.7). Returns the ids of newly-inserted job rows for logging;
    /// conflicting (already-seen) links are silently skipped, which is what
    /// makes re-running the same batch idempotent (spec §8 Idempotence).
    pub async fn upsert_jobs(&self, records: &[JobRecord]) -> Result<Vec<i64>> {
        let mut new_ids = Vec::new();

        for chunk in records.chunks(JOB_BATCH_SIZE) {
            let ids = self.upsert_job_chunk(chunk).await?;
            new_ids.extend(ids);
        }

        for chunk in records.chunks(PAYLOAD_BATCH_SIZE) {
            self.upsert_payload_chunk(chunk).await?;
        }

        Ok(new_ids)
    }

    async fn upsert_job_chunk(&self, chunk: &[JobRecord]) -> Result<Vec<i64>> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO job (title, description, link, min_salary, max_salary, posted_on, \
             is_remote, locations, company_name) ",
        );
        builder.push_values(chunk, |mut b, record| {
            b.push_bind(&record.title)
                .push_bind(&record.description)
                .push_bind(&record.link)
                .push_bind(record.min_salary)
                .push_bind(record.max_salary)
                .push_bind(record.posted_on)
                .push_bind(record.is_remote)
                .push_bind(&record.locations)
                .push_bind(&record.company_name);
        });
        builder.push(" ON CONFLICT (lower(link)) DO NOTHING RETURNING id, link");

        let inserted = builder.build().fetch_all(&self.pool).await?;
        let new_ids: Vec<i64> = inserted.iter().map(|row| row.get::<i64, _>("id")).collect();
        debug!(inserted = new_ids.len(), attempted = chunk.len(), "job chunk upserted");

        if new_ids.is_empty() {
            return Ok(new_ids);
        }

        let inserted_links: HashSet<String> = inserted
            .iter()
            .map(|row| row.get::<String, _>("link").to_lowercase())
            .collect();

        let tagged: Vec<&JobRecord> = chunk
            .iter()
            .filter(|r| inserted_links.contains(&r.link.to_lowercase()) && !r.tags.is_empty())
            .collect();

        if !tagged.is_empty() {
            self.link_tags_for_records(&tagged).await?;
        }

        Ok(new_ids)
    }

    /// Insert any new tags, then link them to their job (spec §4.7): one
    /// tag-insert pass per batch, then job_tag links, both conflict-safe.
    async fn link_tags_for_records(&self, records: &[&JobRecord]) -> Result<()> {
        let all_tags: Vec<&str> = records
            .iter()
            .flat_map(|r| r.tags.iter().map(|t| t.as_str()))
            .collect();
        let tag_ids = self.upsert_tags(&all_tags).await?;

        let job_ids: HashMap<String, i64> = sqlx::query(
            "SELECT id, lower(link) AS link FROM job WHERE lower(link) = ANY($1)",
        )
        .bind(
            records
                .iter()
                .map(|r| r.link.to_lowercase())
                .collect::<Vec<_>>(),
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| (row.get::<String, _>("link"), row.get::<i64, _>("id")))
        .collect();

        let mut pairs: Vec<(i64, i64)> = Vec::new();
        for record in records {
            let Some(&job_id) = job_ids.get(&record.link.to_lowercase()) else {
                continue;
            };
            for tag in &record.tags {
                if let Some(&tag_id) = tag_ids.get(&tag.to_lowercase()) {
                    pairs.push((job_id, tag_id));
                }
            }
        }

        self.insert_job_tag_pairs(&pairs).await
    }

    /// Insert any tags not already present, returning lower(name) → id for
    /// every tag in `names` (spec §4.7 "Tags inserted in one pass per batch").
    async fn upsert_tags(&self, names: &[&str]) -> Result<HashMap<String, i64>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let unique: Vec<&str> = {
            let mut seen = HashSet::new();
            names
                .iter()
                .copied()
                .filter(|n| seen.insert(n.to_lowercase()))
                .collect()
        };

        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO tag (name) ");
        builder.push_values(&unique, |mut b, name| {
            b.push_bind(*name);
        });
        builder.push(" ON CONFLICT (lower(name)) DO NOTHING");
        builder.build().execute(&self.pool).await?;

        let lowered: Vec<String> = unique.iter().map(|n| n.to_lowercase()).collect();
        let rows = sqlx::query("SELECT id, lower(name) AS name FROM tag WHERE lower(name) = ANY($1)")
            .bind(&lowered)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("name"), row.get::<i64, _>("id")))
            .collect())
    }

    async fn insert_job_tag_pairs(&self, pairs: &[(i64, i64)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO job_tag (job_id, tag_id) ");
        builder.push_values(pairs, |mut b, (job_id, tag_id)| {
            b.push_bind(job_id).push_bind(tag_id);
        });
        builder.push(" ON CONFLICT (job_id, tag_id) DO NOTHING");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_payload_chunk(&self, chunk: &[JobRecord]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO payload (link, payload, extra_info) ",
        );
        builder.push_values(chunk, |mut b, record| {
            b.push_bind(&record.link)
                .push_bind(&record.payload)
                .push_bind(&record.extra_info);
        });
        builder.push(" ON CONFLICT (lower(link)) DO NOTHING");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    // -- Purge -----------------------------------------------------------------

    /// Delete jobs older than the retention window, then any payload whose
    /// link no longer has a surviving job (spec §4.7 "Purge").
    pub async fn purge_old_jobs(&self, retention: Duration) -> Result<u64> {
        let cutoff = Utc::now() - retention;

        let jobs_deleted = sqlx::query("DELETE FROM job WHERE posted_on < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let payloads_deleted = sqlx::query(
            "DELETE FROM payload p WHERE NOT EXISTS (
                SELECT 1 FROM job j WHERE lower(j.link) = lower(p.link)
             )",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        info!(jobs_deleted, payloads_deleted, "purge complete");
        Ok(jobs_deleted)
    }

    // -- Tag backfill ------------------------------------------------------

    /// Drain active, tagless jobs through the LLM tag extractor in batches
    /// (spec §4.7 "Fill-missing-tags", §4.8). Returns how many jobs received
    /// at least one tag.
    pub async fn fill_missing_tags(&self, llm: &LlmTagExtractor) -> Result<usize> {
        let candidates = sqlx::query(
            "SELECT j.id, j.link, j.title, j.description FROM job j
             LEFT JOIN job_tag jt ON jt.job_id = j.id
             WHERE j.is_active AND jt.job_id IS NULL
             ORDER BY j.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut filled = 0usize;

        for batch in candidates.chunks(FILL_TAGS_BATCH_SIZE) {
            let inputs: Vec<TagBatchInput> = batch
                .iter()
                .map(|row| TagBatchInput {
                    link: row.get::<String, _>("link"),
                    title: row.get::<String, _>("title"),
                    description: row.get::<Option<String>, _>("description").unwrap_or_default(),
                })
                .collect();

            let links: Vec<String> = inputs.iter().map(|i| i.link.clone()).collect();
            let extracted = match llm.extract_tags(&inputs).await {
                Ok(map) => map,
                Err(err) => {
                    warn!(error = %err, "llm tag extraction failed for batch, skipping");
                    continue;
                }
            };

            let job_id_by_link: HashMap<String, i64> = batch
                .iter()
                .map(|row| (row.get::<String, _>("link"), row.get::<i64, _>("id")))
                .collect();

            let mut all_tags: Vec<String> = Vec::new();
            for link in &links {
                if let Some(tags) = extracted.get(link) {
                    all_tags.extend(tags.iter().cloned());
                }
            }
            let tag_id_by_name = self
                .upsert_tags(&all_tags.iter().map(|t| t.as_str()).collect::<Vec<_>>())
                .await?;

            let mut pairs = Vec::new();
            for (link, job_id) in &job_id_by_link {
                let Some(tags) = extracted.get(link) else { continue };
                for tag in tags {
                    if let Some(&tag_id) = tag_id_by_name.get(&tag.to_lowercase()) {
                        pairs.push((*job_id, tag_id));
                    }
                }
                if !tags.is_empty() {
                    filled += 1;
                }
            }
            self.insert_job_tag_pairs(&pairs).await?;
        }

        Ok(filled)
    }
}
