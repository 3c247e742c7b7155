//! # Rate Limiter
//!
//! Per-user action timestamps kept in the store (one record per user and action kind).
//! Answers two questions: has the cooldown since the last occurrence elapsed, and is there
//! room left in the sliding window. Expired timestamps are evicted lazily on write.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::error::{BoardError, Result};
use crate::domain::traits::{Clock, Store};
use crate::infrastructure::store::{RATE_LIMITS, load, save};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    Submit,
    Comment,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateAction::Submit => "submit",
            RateAction::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RateRecord {
    #[serde(default)]
    timestamps: Vec<i64>,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn key(user: &str, action: RateAction) -> String {
        format!("{}:{}", user, action.as_str())
    }

    async fn record_for(&self, user: &str, action: RateAction) -> Result<RateRecord> {
        Ok(load(&*self.store, RATE_LIMITS, &Self::key(user, action))
            .await?
            .unwrap_or_default())
    }

    /// Fails with `CooldownActive` if the last occurrence is younger than `cooldown_ms`.
    pub async fn check_cooldown(&self, user: &str, action: RateAction, cooldown_ms: i64) -> Result<()> {
        if cooldown_ms <= 0 {
            return Ok(());
        }
        let now = self.clock.now_ms();
        let record = self.record_for(user, action).await?;
        if let Some(last) = record.timestamps.iter().copied().max() {
            let elapsed = now - last;
            if elapsed < cooldown_ms {
                return Err(BoardError::CooldownActive {
                    remaining_ms: cooldown_ms - elapsed,
                });
            }
        }
        Ok(())
    }

    /// Fails with `RateLimited` if `limit` occurrences already fall inside the window.
    pub async fn check_window(
        &self,
        user: &str,
        action: RateAction,
        limit: u32,
        window_ms: i64,
    ) -> Result<()> {
        let now = self.clock.now_ms();
        let record = self.record_for(user, action).await?;
        let recent: Vec<i64> = record
            .timestamps
            .into_iter()
            .filter(|t| now - t < window_ms)
            .collect();
        if recent.len() >= limit as usize {
            let oldest = recent.iter().copied().min().unwrap_or(now);
            return Err(BoardError::RateLimited {
                retry_after_ms: window_ms - (now - oldest),
            });
        }
        Ok(())
    }

    /// Records an occurrence, keeping at most `keep` timestamps younger than `horizon_ms`.
    pub async fn record(
        &self,
        user: &str,
        action: RateAction,
        keep: usize,
        horizon_ms: i64,
    ) -> Result<()> {
        let now = self.clock.now_ms();
        let key = Self::key(user, action);
        let mut record = self.record_for(user, action).await?;
        record.timestamps.retain(|t| now - t < horizon_ms);
        record.timestamps.push(now);
        let keep = keep.max(1);
        if record.timestamps.len() > keep {
            let excess = record.timestamps.len() - keep;
            record.timestamps.drain(..excess);
        }
        save(&*self.store, RATE_LIMITS, &key, &record).await?;
        Ok(())
    }
}
