//! Provider API clients. Each fetch returns raw payloads already wrapped
//! in the envelope shape the server's normalizers expect.

pub mod github;
pub mod jenkins;
