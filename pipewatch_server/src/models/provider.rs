//! providers — one row per monitored CI system instance.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::providers;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = providers)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub config: Option<serde_json::Value>,
    pub is_active: bool,
    pub create_date: Option<DateTime<Utc>>,
    pub write_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = providers)]
pub struct NewProvider {
    pub name: String,
    pub kind: String,
    pub is_active: bool,
}
