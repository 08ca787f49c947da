//! Idempotent table/index definitions (spec §6 "Persisted state layout",
//! §3 "[AMBIENT] Schema migrations"). Run once by the `setup-db` CLI command
//! rather than through an external migration runner — this crate's schema
//! has no revision history to replay.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS source_watermark (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    last_run_at TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS source_watermark_name_lower_idx
    ON source_watermark (lower(name));

CREATE TABLE IF NOT EXISTS job (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    link TEXT NOT NULL,
    min_salary NUMERIC,
    max_salary NUMERIC,
    posted_on TIMESTAMPTZ NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_remote BOOLEAN NOT NULL DEFAULT FALSE,
    locations TEXT[] NOT NULL DEFAULT '{}',
    company_name TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    edited_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT job_salary_non_negative CHECK (
        (min_salary IS NULL OR min_salary >= 0) AND
        (max_salary IS NULL OR max_salary >= 0)
    ),
    CONSTRAINT job_salary_range_ordered CHECK (
        min_salary IS NULL OR max_salary IS NULL OR max_salary >= min_salary
    )
);
CREATE UNIQUE INDEX IF NOT EXISTS job_link_lower_idx ON job (lower(link));
CREATE INDEX IF NOT EXISTS job_locations_gin_idx ON job USING GIN (locations);
CREATE INDEX IF NOT EXISTS job_posted_on_idx ON job (posted_on);

CREATE TABLE IF NOT EXISTS tag (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS tag_name_lower_idx ON tag (lower(name));

CREATE TABLE IF NOT EXISTS job_tag (
    job_id BIGINT NOT NULL REFERENCES job (id) ON DELETE CASCADE,
    tag_id BIGINT NOT NULL REFERENCES tag (id) ON DELETE CASCADE,
    PRIMARY KEY (job_id, tag_id)
);

CREATE TABLE IF NOT EXISTS payload (
    id BIGSERIAL PRIMARY KEY,
    link TEXT NOT NULL,
    payload TEXT NOT NULL,
    extra_info TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS payload_link_lower_idx ON payload (lower(link));

CREATE TABLE IF NOT EXISTS valid_location_codes (
    code TEXT PRIMARY KEY
);
"#;
