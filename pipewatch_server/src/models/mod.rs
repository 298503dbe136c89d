//! Dashboard data models — canonical build records, providers, alerts.

pub mod alert;
pub mod build;
pub mod error;
pub mod event;
pub mod provider;
