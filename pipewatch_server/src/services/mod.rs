//! Dashboard services — ingestion, persistence, and alerting logic.

pub mod alert_dispatcher;
pub mod build_store;
pub mod channels;
pub mod ingest;
pub mod signature;
