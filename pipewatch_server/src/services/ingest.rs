//! Ingestion pipeline — one request-scoped unit of work per incoming
//! event: normalize, persist, maybe alert.

use diesel_async::AsyncPgConnection;

use crate::models::error::IngestError;
use crate::models::event::ProviderKind;
use crate::services::alert_dispatcher::AlertDispatcher;
use crate::services::build_store::{self, UpsertOutcome};

/// Process one raw provider payload end to end.
///
/// Ingestion succeeds or fails on normalization and storage alone; alert
/// delivery happens after the build is persisted and cannot affect the
/// returned result.
pub async fn ingest_event(
    conn: &mut AsyncPgConnection,
    dispatcher: &AlertDispatcher,
    kind: ProviderKind,
    payload: &serde_json::Value,
) -> Result<UpsertOutcome, IngestError> {
    let event = crate::normalize::normalize(kind, payload)?;

    let provider = build_store::upsert_provider(conn, &event.provider_name, kind).await?;
    let outcome = build_store::upsert_build(conn, provider.id, &event).await?;

    crate::metrics::event_ingested(kind.as_str());
    tracing::info!(
        build_id = outcome.build.id,
        provider = %provider.name,
        external_id = %outcome.build.external_id,
        status = %outcome.build.status,
        is_new = outcome.is_new,
        newly_failed = outcome.newly_failed,
        "Build event ingested"
    );

    dispatcher.evaluate(conn, &outcome, &provider.name).await;

    Ok(outcome)
}
