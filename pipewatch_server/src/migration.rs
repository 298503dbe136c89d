//! Schema migration for the Pipewatch tables.

use diesel_async::AsyncPgConnection;
use diesel_async::SimpleAsyncConnection;

/// SQL migration for the dashboard tables.
///
/// The `builds` uniqueness constraint and the partial unique index on
/// `alert_records` are load-bearing: the upsert and the alert debounce
/// both rely on the database enforcing them under concurrent delivery.
pub const MIGRATION_SQL: &str = r#"
-- ================================================================
-- Pipewatch Tables
-- ================================================================

CREATE TABLE IF NOT EXISTS providers (
    id              BIGSERIAL PRIMARY KEY,
    name            VARCHAR(255) NOT NULL UNIQUE,
    kind            VARCHAR(32) NOT NULL,
    config          JSONB,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    create_date     TIMESTAMPTZ DEFAULT NOW(),
    write_date      TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS builds (
    id               BIGSERIAL PRIMARY KEY,
    provider_id      BIGINT NOT NULL REFERENCES providers(id),
    external_id      VARCHAR(100) NOT NULL,
    status           VARCHAR(32) NOT NULL DEFAULT 'queued',
    branch           VARCHAR(255),
    commit_sha       VARCHAR(100),
    triggered_by     VARCHAR(255),
    url              VARCHAR(500),
    started_at       TIMESTAMPTZ,
    finished_at      TIMESTAMPTZ,
    duration_seconds BIGINT,
    raw_payload      JSONB,
    create_date      TIMESTAMPTZ DEFAULT NOW(),
    write_date       TIMESTAMPTZ DEFAULT NOW(),
    CONSTRAINT builds_provider_external UNIQUE (provider_id, external_id)
);

CREATE INDEX IF NOT EXISTS idx_builds_status ON builds (status);
CREATE INDEX IF NOT EXISTS idx_builds_branch ON builds (branch);
CREATE INDEX IF NOT EXISTS idx_builds_started ON builds (started_at DESC);

CREATE TABLE IF NOT EXISTS alert_records (
    id              BIGSERIAL PRIMARY KEY,
    build_id        BIGINT NOT NULL REFERENCES builds(id) ON DELETE CASCADE,
    channel         VARCHAR(32) NOT NULL,
    success         BOOLEAN NOT NULL DEFAULT FALSE,
    error_detail    TEXT,
    message         TEXT NOT NULL,
    sent_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- At most one successful send per (build, channel), ever.
CREATE UNIQUE INDEX IF NOT EXISTS idx_alert_records_sent_once
    ON alert_records (build_id, channel) WHERE success;

CREATE INDEX IF NOT EXISTS idx_alert_records_build ON alert_records (build_id);
"#;

/// Run the dashboard migration.
pub async fn run_migration(conn: &mut AsyncPgConnection) -> anyhow::Result<()> {
    conn.batch_execute(MIGRATION_SQL)
        .await
        .map_err(|e| anyhow::anyhow!("pipewatch migration failed: {e}"))?;
    Ok(())
}
