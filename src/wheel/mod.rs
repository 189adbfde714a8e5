//! Master-side key management backend.
//!
//! `WheelClient` is the seam between the dispatcher and whatever actually
//! touches the key store. `SaltApiClient` implements it over salt-api's
//! `/run` endpoint; tests substitute a recording fake.
//!
use crate::cmd::minion::MinionId;
use serde_json::Value;

pub mod salt_api;

pub use salt_api::{LazySaltApiClient, SaltApiClient};

pub type Result<T = Value> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request error")]
    Request(#[from] reqwest::Error),
    #[error("salt-api returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected salt-api response: {0}")]
    Envelope(String),
    #[error("wheel function failed: {0}")]
    Remote(Value),
    #[error("failed to start client runtime")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),
}

/// Key operations exposed by the master's wheel subsystem.
///
/// Results are opaque: callers serialize them without inspection.
pub trait WheelClient {
    /// Generate a key pair for `ids` and accept it. Blocks until the wheel
    /// function returns.
    fn gen_accept(&self, ids: &[MinionId]) -> Result;

    /// Submit an async `key.delete` job for every key matching `pattern`.
    ///
    /// Returns the job acknowledgement (tag and jid), not the outcome.
    fn delete_by_match(&self, pattern: &str) -> Result;

    /// Submit an async `key.delete_dict` job for exactly `ids`.
    ///
    /// Returns the job acknowledgement (tag and jid), not the outcome.
    fn delete_by_set(&self, ids: &[MinionId]) -> Result;
}

impl<C: WheelClient + ?Sized> WheelClient for &C {
    fn gen_accept(&self, ids: &[MinionId]) -> Result {
        (**self).gen_accept(ids)
    }

    fn delete_by_match(&self, pattern: &str) -> Result {
        (**self).delete_by_match(pattern)
    }

    fn delete_by_set(&self, ids: &[MinionId]) -> Result {
        (**self).delete_by_set(ids)
    }
}
