//! Row types for the five owned tables (spec §3 "Data Model").

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub min_salary: Option<Decimal>,
    pub max_salary: Option<Decimal>,
    pub posted_on: DateTime<Utc>,
    pub is_active: bool,
    pub is_remote: bool,
    pub locations: Vec<String>,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct PayloadRow {
    pub id: i64,
    pub link: String,
    pub payload: String,
    pub extra_info: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SourceWatermarkRow {
    pub id: i64,
    pub name: String,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// A fully-normalized listing plus its raw payload, ready for the store's
/// batched upsert (spec §4.6 step 5, §4.7).
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub min_salary: Option<Decimal>,
    pub max_salary: Option<Decimal>,
    pub posted_on: DateTime<Utc>,
    pub is_remote: bool,
    pub locations: Vec<String>,
    pub company_name: Option<String>,
    pub tags: Vec<String>,
    pub payload: String,
    pub extra_info: Option<String>,
}
