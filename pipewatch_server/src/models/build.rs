//! builds — one execution record of a pipeline run, mutated in place as
//! the same external run progresses through states.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::builds;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = builds)]
pub struct Build {
    pub id: i64,
    pub provider_id: i64,
    pub external_id: String,
    pub status: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub triggered_by: Option<String>,
    pub url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub raw_payload: Option<serde_json::Value>,
    pub create_date: Option<DateTime<Utc>>,
    pub write_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = builds)]
pub struct NewBuild {
    pub provider_id: i64,
    pub external_id: String,
    pub status: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub triggered_by: Option<String>,
    pub url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub raw_payload: Option<serde_json::Value>,
}
