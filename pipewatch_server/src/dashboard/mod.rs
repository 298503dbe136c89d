//! Dashboard read models.

pub mod kpi;
