//! Diesel table definitions for the Pipewatch dashboard backend.
//!
//! Tables: providers, builds, alert_records.
//! `builds (provider_id, external_id)` carries the uniqueness constraint
//! that makes webhook redelivery idempotent; `alert_records` carries a
//! partial unique index on `(build_id, channel) WHERE success` that backs
//! alert deduplication.

diesel::table! {
    providers (id) {
        id -> Int8,
        name -> Varchar,
        kind -> Varchar,
        config -> Nullable<Jsonb>,
        is_active -> Bool,
        create_date -> Nullable<Timestamptz>,
        write_date -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    builds (id) {
        id -> Int8,
        provider_id -> Int8,
        external_id -> Varchar,
        status -> Varchar,
        branch -> Nullable<Varchar>,
        commit_sha -> Nullable<Varchar>,
        triggered_by -> Nullable<Varchar>,
        url -> Nullable<Varchar>,
        started_at -> Nullable<Timestamptz>,
        finished_at -> Nullable<Timestamptz>,
        duration_seconds -> Nullable<Int8>,
        raw_payload -> Nullable<Jsonb>,
        create_date -> Nullable<Timestamptz>,
        write_date -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    alert_records (id) {
        id -> Int8,
        build_id -> Int8,
        channel -> Varchar,
        success -> Bool,
        error_detail -> Nullable<Text>,
        message -> Text,
        sent_at -> Timestamptz,
    }
}

// Foreign key relationships
diesel::joinable!(builds -> providers (provider_id));
diesel::joinable!(alert_records -> builds (build_id));

diesel::allow_tables_to_appear_in_same_query!(providers, builds, alert_records);
