//! KPI queries for the dashboard — success/failure rates and build times
//! over a rolling window.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::models::error::StoreError;
use crate::schema::builds;

/// Aggregated health metrics over a rolling window of days.
#[derive(Debug, Serialize)]
pub struct MetricsSummary {
    pub window_days: i32,
    pub success_rate: f64,
    pub failure_rate: f64,
    /// Mean duration over builds with a derived duration in the window;
    /// absent when no such build exists.
    pub avg_build_time_seconds: Option<f64>,
    /// Status of the most recently started build overall, not windowed.
    pub last_build_status: Option<String>,
    /// Builds still queued or running inside the window.
    pub in_flight: i64,
}

#[derive(Debug, QueryableByName)]
struct WindowCounts {
    #[diesel(sql_type = BigInt)]
    terminal: i64,
    #[diesel(sql_type = BigInt)]
    success: i64,
    #[diesel(sql_type = BigInt)]
    failed: i64,
    #[diesel(sql_type = BigInt)]
    in_flight: i64,
    #[diesel(sql_type = Nullable<Double>)]
    avg_duration: Option<f64>,
}

/// Fold raw window counts into the summary shape. Rates are computed over
/// terminal builds only; an empty window yields zero rates and no average.
fn summarize(days: i32, counts: &WindowCounts, last_build_status: Option<String>) -> MetricsSummary {
    let (success_rate, failure_rate) = if counts.terminal > 0 {
        let total = counts.terminal as f64;
        (
            counts.success as f64 / total,
            counts.failed as f64 / total,
        )
    } else {
        (0.0, 0.0)
    };

    MetricsSummary {
        window_days: days,
        success_rate,
        failure_rate,
        avg_build_time_seconds: counts.avg_duration,
        last_build_status,
        in_flight: counts.in_flight,
    }
}

/// Compute the metrics summary for builds started within the last N days.
pub async fn query_summary(
    conn: &mut AsyncPgConnection,
    days: i32,
) -> Result<MetricsSummary, StoreError> {
    let counts: WindowCounts = diesel::sql_query(format!(
        "SELECT \
            COUNT(*) FILTER (WHERE status IN ('success', 'failed')) AS terminal, \
            COUNT(*) FILTER (WHERE status = 'success') AS success, \
            COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
            COUNT(*) FILTER (WHERE status IN ('queued', 'running')) AS in_flight, \
            AVG(duration_seconds)::float AS avg_duration \
         FROM builds \
         WHERE started_at >= NOW() - INTERVAL '{days} days'"
    ))
    .get_result(conn)
    .await?;

    let last_build_status: Option<String> = builds::table
        .order(builds::started_at.desc().nulls_last())
        .select(builds::status)
        .first::<String>(conn)
        .await
        .optional()?;

    Ok(summarize(days, &counts, last_build_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_split_terminal_builds() {
        let counts = WindowCounts {
            terminal: 10,
            success: 7,
            failed: 3,
            in_flight: 2,
            avg_duration: Some(120.0),
        };
        let summary = summarize(7, &counts, Some("success".into()));

        assert_eq!(summary.success_rate, 0.7);
        assert_eq!(summary.failure_rate, 0.3);
        assert_eq!(summary.avg_build_time_seconds, Some(120.0));
        assert_eq!(summary.in_flight, 2);
    }

    #[test]
    fn empty_window_yields_null_average_not_zero() {
        let counts = WindowCounts {
            terminal: 0,
            success: 0,
            failed: 0,
            in_flight: 1,
            avg_duration: None,
        };
        let summary = summarize(7, &counts, None);

        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.failure_rate, 0.0);
        assert!(summary.avg_build_time_seconds.is_none());
        assert!(summary.last_build_status.is_none());
    }
}
