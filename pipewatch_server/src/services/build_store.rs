//! Idempotent persistence for providers and builds.
//!
//! All build/provider mutation goes through this module. The uniqueness
//! constraint on `builds (provider_id, external_id)` is the concurrency
//! mechanism: the upsert runs in a transaction, takes a row lock on the
//! existing build, and falls back to re-reading under the lock when a
//! concurrent insert wins the race. No application-level locking.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::models::build::{Build, NewBuild};
use crate::models::error::StoreError;
use crate::models::event::{BuildEvent, BuildStatus, ProviderKind};
use crate::models::provider::{NewProvider, Provider};
use crate::schema::{builds, providers};

/// Result of one upsert: the stored row plus the transition signals the
/// alert dispatcher keys on.
#[derive(Debug)]
pub struct UpsertOutcome {
    pub build: Build,
    pub is_new: bool,
    pub newly_failed: bool,
    pub newly_succeeded: bool,
}

/// Planned update for an existing build row. Pure, so the ordering and
/// idempotence rules are testable without a database.
#[derive(Debug, PartialEq)]
pub struct TransitionPlan {
    pub status: BuildStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub newly_failed: bool,
    pub newly_succeeded: bool,
}

/// Derived duration in whole seconds, recomputed whenever both endpoints
/// are known. Provider-reported durations are never trusted.
pub fn derive_duration(
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
) -> Option<i64> {
    match (started_at, finished_at) {
        (Some(start), Some(finish)) => Some((finish - start).num_seconds()),
        _ => None,
    }
}

/// Decide how an incoming event mutates an existing row.
///
/// Rules, in order:
/// - a terminal row keeps its status, whatever the delivery order was:
///   neither a stale non-terminal event nor the other terminal outcome
///   can rewrite it (a provider re-run arrives as a new external id)
/// - `started_at` and `finished_at` are write-once
/// - `newly_failed`/`newly_succeeded` fire only on the transition into the
///   terminal status with a finish time present, never on a redelivery
pub fn plan_transition(existing: &Build, event: &BuildEvent) -> TransitionPlan {
    let old_status: BuildStatus = existing.status.parse().unwrap_or(BuildStatus::Queued);

    let status = if old_status.is_terminal() {
        old_status
    } else {
        event.status
    };

    let started_at = existing.started_at.or(event.started_at);
    let finished_at = existing.finished_at.or(if status.is_terminal() {
        event.finished_at
    } else {
        None
    });
    let duration_seconds = derive_duration(started_at, finished_at);

    let finished_now = existing.finished_at.is_none() && finished_at.is_some();
    let newly_failed = status == BuildStatus::Failed && old_status != BuildStatus::Failed && finished_now;
    let newly_succeeded =
        status == BuildStatus::Success && old_status != BuildStatus::Success && finished_now;

    TransitionPlan {
        status,
        started_at,
        finished_at,
        duration_seconds,
        newly_failed,
        newly_succeeded,
    }
}

/// Return the provider row for `name`, creating it on first sight.
pub async fn upsert_provider(
    conn: &mut AsyncPgConnection,
    name: &str,
    kind: ProviderKind,
) -> Result<Provider, StoreError> {
    let new_provider = NewProvider {
        name: name.to_string(),
        kind: kind.as_str().to_string(),
        is_active: true,
    };

    // A concurrent creation loses the insert but wins the re-select.
    diesel::insert_into(providers::table)
        .values(&new_provider)
        .on_conflict(providers::name)
        .do_nothing()
        .execute(conn)
        .await?;

    let provider = providers::table
        .filter(providers::name.eq(name))
        .first::<Provider>(conn)
        .await?;
    Ok(provider)
}

/// Insert or update the build identified by `(provider_id, external_id)`.
pub async fn upsert_build(
    conn: &mut AsyncPgConnection,
    provider_id: i64,
    event: &BuildEvent,
) -> Result<UpsertOutcome, StoreError> {
    conn.transaction::<UpsertOutcome, StoreError, _>(|conn| {
        async move {
            let existing: Option<Build> = builds::table
                .filter(builds::provider_id.eq(provider_id))
                .filter(builds::external_id.eq(&event.external_id))
                .for_update()
                .first(conn)
                .await
                .optional()?;

            if let Some(build) = existing {
                return apply_event(conn, build, event).await;
            }

            let duration_seconds = derive_duration(event.started_at, event.finished_at);
            let new_build = NewBuild {
                provider_id,
                external_id: event.external_id.clone(),
                status: event.status.as_str().to_string(),
                branch: event.branch.clone(),
                commit_sha: event.commit_sha.clone(),
                triggered_by: event.triggered_by.clone(),
                url: event.url.clone(),
                started_at: event.started_at,
                finished_at: event.finished_at,
                duration_seconds,
                raw_payload: Some(event.raw_payload.clone()),
            };

            let inserted: Option<Build> = diesel::insert_into(builds::table)
                .values(&new_build)
                .on_conflict((builds::provider_id, builds::external_id))
                .do_nothing()
                .get_result(conn)
                .await
                .optional()?;

            match inserted {
                Some(build) => {
                    crate::metrics::build_upserted(event.status.as_str());
                    let terminal_now = build.finished_at.is_some();
                    Ok(UpsertOutcome {
                        newly_failed: event.status == BuildStatus::Failed && terminal_now,
                        newly_succeeded: event.status == BuildStatus::Success && terminal_now,
                        is_new: true,
                        build,
                    })
                }
                None => {
                    // Lost the insert race; the row now exists, lock and update it.
                    let build: Build = builds::table
                        .filter(builds::provider_id.eq(provider_id))
                        .filter(builds::external_id.eq(&event.external_id))
                        .for_update()
                        .first(conn)
                        .await?;
                    apply_event(conn, build, event).await
                }
            }
        }
        .scope_boxed()
    })
    .await
}

/// Apply a planned transition to a locked existing row.
async fn apply_event(
    conn: &mut AsyncPgConnection,
    existing: Build,
    event: &BuildEvent,
) -> Result<UpsertOutcome, StoreError> {
    let plan = plan_transition(&existing, event);

    let build: Build = diesel::update(builds::table.find(existing.id))
        .set((
            builds::status.eq(plan.status.as_str()),
            builds::started_at.eq(plan.started_at),
            builds::finished_at.eq(plan.finished_at),
            builds::duration_seconds.eq(plan.duration_seconds),
            builds::url.eq(event.url.clone().or(existing.url)),
            builds::raw_payload.eq(Some(event.raw_payload.clone())),
            builds::write_date.eq(diesel::dsl::now),
        ))
        .get_result(conn)
        .await?;

    crate::metrics::build_upserted(plan.status.as_str());

    Ok(UpsertOutcome {
        build,
        is_new: false,
        newly_failed: plan.newly_failed,
        newly_succeeded: plan.newly_succeeded,
    })
}

/// Flat projection of a build joined to its provider. Queries return this
/// instead of ORM-style lazy relations so the join cost is explicit.
#[derive(Debug, Clone, Queryable, Serialize)]
pub struct BuildRow {
    pub id: i64,
    pub provider_name: String,
    pub provider_kind: String,
    pub external_id: String,
    pub status: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub triggered_by: Option<String>,
    pub url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

type BuildRowSelect = (
    builds::id,
    providers::name,
    providers::kind,
    builds::external_id,
    builds::status,
    builds::branch,
    builds::commit_sha,
    builds::triggered_by,
    builds::url,
    builds::started_at,
    builds::finished_at,
    builds::duration_seconds,
);

const BUILD_ROW_SELECT: BuildRowSelect = (
    builds::id,
    providers::name,
    providers::kind,
    builds::external_id,
    builds::status,
    builds::branch,
    builds::commit_sha,
    builds::triggered_by,
    builds::url,
    builds::started_at,
    builds::finished_at,
    builds::duration_seconds,
);

/// List builds ordered by `started_at` descending (nulls last), with the
/// matching total for pagination.
pub async fn list_builds(
    conn: &mut AsyncPgConnection,
    limit: i64,
    offset: i64,
    status: Option<&str>,
    branch: Option<&str>,
) -> Result<(Vec<BuildRow>, i64), StoreError> {
    let mut query = builds::table.inner_join(providers::table).into_boxed();
    let mut count_query = builds::table.inner_join(providers::table).into_boxed();

    if let Some(status) = status {
        query = query.filter(builds::status.eq(status.to_string()));
        count_query = count_query.filter(builds::status.eq(status.to_string()));
    }
    if let Some(branch) = branch {
        query = query.filter(builds::branch.eq(branch.to_string()));
        count_query = count_query.filter(builds::branch.eq(branch.to_string()));
    }

    let items = query
        .select(BUILD_ROW_SELECT)
        .order(builds::started_at.desc().nulls_last())
        .limit(limit)
        .offset(offset)
        .load::<BuildRow>(conn)
        .await?;

    let total: i64 = count_query.count().get_result(conn).await?;

    Ok((items, total))
}

/// Fetch a single build by id.
pub async fn get_build(conn: &mut AsyncPgConnection, id: i64) -> Result<BuildRow, StoreError> {
    let row = builds::table
        .inner_join(providers::table)
        .filter(builds::id.eq(id))
        .select(BUILD_ROW_SELECT)
        .first::<BuildRow>(conn)
        .await?;
    Ok(row)
}

/// List all providers.
pub async fn list_providers(conn: &mut AsyncPgConnection) -> Result<Vec<Provider>, StoreError> {
    let rows = providers::table
        .order(providers::id.asc())
        .load::<Provider>(conn)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_705_312_800 + secs, 0).unwrap()
    }

    fn row(status: &str, started_at: Option<DateTime<Utc>>, finished_at: Option<DateTime<Utc>>) -> Build {
        Build {
            id: 1,
            provider_id: 1,
            external_id: "123".into(),
            status: status.into(),
            branch: Some("main".into()),
            commit_sha: None,
            triggered_by: None,
            url: None,
            started_at,
            finished_at,
            duration_seconds: derive_duration(started_at, finished_at),
            raw_payload: None,
            create_date: None,
            write_date: None,
        }
    }

    fn event(status: BuildStatus, started_at: Option<DateTime<Utc>>, finished_at: Option<DateTime<Utc>>) -> BuildEvent {
        BuildEvent {
            provider_name: "repo".into(),
            provider_kind: ProviderKind::GithubActions,
            external_id: "123".into(),
            status,
            branch: Some("main".into()),
            commit_sha: None,
            triggered_by: None,
            url: None,
            started_at,
            finished_at,
            raw_payload: serde_json::json!({}),
        }
    }

    #[test]
    fn running_then_failed_transitions_and_signals_once() {
        let existing = row("running", Some(ts(0)), None);
        let plan = plan_transition(&existing, &event(BuildStatus::Failed, Some(ts(0)), Some(ts(60))));

        assert_eq!(plan.status, BuildStatus::Failed);
        assert_eq!(plan.duration_seconds, Some(60));
        assert!(plan.newly_failed);
        assert!(!plan.newly_succeeded);
    }

    #[test]
    fn terminal_status_never_regresses() {
        // A late "running" event after the failure must not reopen the build.
        let existing = row("failed", Some(ts(0)), Some(ts(60)));
        let plan = plan_transition(&existing, &event(BuildStatus::Running, Some(ts(0)), None));

        assert_eq!(plan.status, BuildStatus::Failed);
        assert_eq!(plan.finished_at, Some(ts(60)));
        assert!(!plan.newly_failed);
    }

    #[test]
    fn redelivery_of_failed_event_does_not_resignal() {
        let existing = row("failed", Some(ts(0)), Some(ts(60)));
        let plan = plan_transition(&existing, &event(BuildStatus::Failed, Some(ts(0)), Some(ts(60))));

        assert!(!plan.newly_failed);
    }

    #[test]
    fn failed_refresh_with_different_finish_time_does_not_resignal() {
        let existing = row("failed", Some(ts(0)), Some(ts(60)));
        let plan = plan_transition(&existing, &event(BuildStatus::Failed, Some(ts(0)), Some(ts(90))));

        // finished_at is write-once, and no second alert fires
        assert_eq!(plan.finished_at, Some(ts(60)));
        assert!(!plan.newly_failed);
    }

    #[test]
    fn terminal_status_never_flips_to_other_terminal() {
        // A "success" delivery against an already-failed row is a stale or
        // crossed delivery, not a re-run; the recorded outcome stands.
        let existing = row("failed", Some(ts(0)), Some(ts(60)));
        let plan = plan_transition(&existing, &event(BuildStatus::Success, Some(ts(0)), Some(ts(90))));

        assert_eq!(plan.status, BuildStatus::Failed);
        assert_eq!(plan.finished_at, Some(ts(60)));
        assert!(!plan.newly_succeeded);
        assert!(!plan.newly_failed);
    }

    #[test]
    fn started_at_never_regresses() {
        let existing = row("running", Some(ts(0)), None);
        let plan = plan_transition(&existing, &event(BuildStatus::Running, Some(ts(30)), None));

        assert_eq!(plan.started_at, Some(ts(0)));
    }

    #[test]
    fn out_of_order_failed_then_running_stays_failed() {
        // Failure delivered first, stale "running" second.
        let fresh = row("queued", None, None);
        let failed_plan =
            plan_transition(&fresh, &event(BuildStatus::Failed, Some(ts(0)), Some(ts(60))));
        assert!(failed_plan.newly_failed);

        let after_failure = row("failed", Some(ts(0)), Some(ts(60)));
        let stale_plan = plan_transition(&after_failure, &event(BuildStatus::Running, Some(ts(0)), None));
        assert_eq!(stale_plan.status, BuildStatus::Failed);
        assert!(!stale_plan.newly_failed);
    }

    #[test]
    fn success_transition_signals_newly_succeeded() {
        let existing = row("running", Some(ts(0)), None);
        let plan = plan_transition(&existing, &event(BuildStatus::Success, Some(ts(0)), Some(ts(180))));

        assert!(plan.newly_succeeded);
        assert!(!plan.newly_failed);
        assert_eq!(plan.duration_seconds, Some(180));
    }

    #[test]
    fn duration_is_derived_not_trusted() {
        // 180 seconds between the fixture timestamps, whatever the payload said.
        assert_eq!(derive_duration(Some(ts(0)), Some(ts(180))), Some(180));
        assert_eq!(derive_duration(Some(ts(0)), None), None);
        assert_eq!(derive_duration(None, Some(ts(180))), None);
    }

    #[test]
    fn failed_without_finish_time_does_not_signal() {
        let existing = row("running", Some(ts(0)), None);
        let plan = plan_transition(&existing, &event(BuildStatus::Failed, Some(ts(0)), None));

        assert_eq!(plan.status, BuildStatus::Failed);
        assert!(!plan.newly_failed);
    }
}
