//! # Record Store
//!
//! Store backends plus the typed helpers built on the `Store` trait.
//! `run_transaction` is the optimistic read-modify-write primitive every counter goes through.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::domain::error::BoardError;
use crate::domain::traits::Store;

pub const USERS: &str = "users";
pub const SUBMISSIONS: &str = "submissions";
pub const COMMENTS: &str = "comments";
pub const RATE_LIMITS: &str = "rate_limits";
pub const COUNTERS: &str = "counters";

const BACKOFF_BASE_MS: u64 = 2;
const BACKOFF_MAX_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("transaction on {collection}/{key} gave up after {attempts} attempts")]
    Contention {
        collection: String,
        key: String,
        attempts: u32,
    },
    #[error(transparent)]
    Aborted(#[from] BoardError),
}

impl From<anyhow::Error> for TxError {
    fn from(e: anyhow::Error) -> Self {
        TxError::Aborted(BoardError::Store(e))
    }
}

impl From<TxError> for BoardError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::Aborted(inner) => inner,
            contention @ TxError::Contention { .. } => BoardError::Store(contention.into()),
        }
    }
}

pub async fn load<T: DeserializeOwned>(
    store: &dyn Store,
    collection: &str,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match store.get(collection, key).await? {
        Some(raw) => decode(collection, key, &raw).map(Some),
        None => Ok(None),
    }
}

pub async fn save<T: Serialize>(
    store: &dyn Store,
    collection: &str,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value).context("Failed to encode record")?;
    store.set(collection, key, &raw).await
}

/// Inserts a record only if the key is free.
pub async fn insert<T: Serialize>(
    store: &dyn Store,
    collection: &str,
    key: &str,
    value: &T,
) -> anyhow::Result<bool> {
    let raw = serde_json::to_string(value).context("Failed to encode record")?;
    store.compare_and_set(collection, key, None, &raw).await
}

pub async fn load_all<T: DeserializeOwned>(
    store: &dyn Store,
    collection: &str,
) -> anyhow::Result<Vec<T>> {
    store
        .list(collection)
        .await?
        .iter()
        .map(|raw| decode(collection, "*", raw))
        .collect()
}

/// Reads the record, applies `apply` and commits with compare-and-set, retrying with
/// exponential backoff when a concurrent writer wins. `apply` may run several times and
/// must not have side effects; an `Err` from it aborts without writing.
pub async fn run_transaction<T, R, F>(
    store: &dyn Store,
    collection: &str,
    key: &str,
    attempts: u32,
    mut apply: F,
) -> Result<R, TxError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> Result<(T, R), BoardError>,
{
    for attempt in 1..=attempts {
        let current = store.get(collection, key).await?;
        let parsed = match &current {
            Some(raw) => Some(decode::<T>(collection, key, raw)?),
            None => None,
        };

        let (next, output) = apply(parsed)?;
        let encoded = serde_json::to_string(&next).context("Failed to encode record")?;

        if store
            .compare_and_set(collection, key, current.as_deref(), &encoded)
            .await?
        {
            if attempt > 1 {
                tracing::debug!(collection, key, attempt, "transaction committed after retry");
            }
            return Ok(output);
        }

        tracing::debug!(collection, key, attempt, "transaction conflict");
        if attempt < attempts {
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
    }

    Err(TxError::Contention {
        collection: collection.to_string(),
        key: key.to_string(),
        attempts,
    })
}

fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6);
    let ms = BACKOFF_BASE_MS * u64::pow(2, exponent);
    Duration::from_millis(ms.min(BACKOFF_MAX_MS))
}

fn decode<T: DeserializeOwned>(collection: &str, key: &str, raw: &str) -> anyhow::Result<T> {
    serde_json::from_str(raw).with_context(|| format!("Corrupt record {collection}/{key}"))
}
