//! # Sequence Allocator
//!
//! Hands out the public numbers of approved submissions. The counter lives in the store and
//! every allocation is one compare-and-set transaction, so concurrent approvals (even across
//! processes) get distinct, gap-free numbers. There is no in-process cache of the counter.
//!
//! A number allocated for a submission is reserved in the same record until the approval is
//! stored, so a retried approval gets the same number back instead of burning a new one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::error::{BoardError, Result};
use crate::domain::traits::Store;
use crate::domain::types::{Submission, SubmissionState};
use crate::infrastructure::store::{COUNTERS, SUBMISSIONS, TxError, load, load_all, run_transaction};

pub const SEQUENCE_KEY: &str = "sequence";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceCounter {
    pub last: u64,
    /// Submission id -> number allocated but not yet stored on the submission.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reserved: BTreeMap<String, u64>,
}

impl SequenceCounter {
    pub fn at(last: u64) -> Self {
        Self {
            last,
            reserved: BTreeMap::new(),
        }
    }
}

/// Outcome of `allocate_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub number: u64,
    /// `false` when an earlier reservation for the same owner was handed back.
    pub fresh: bool,
}

#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn Store>,
    attempts: u32,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn Store>, attempts: u32) -> Self {
        Self { store, attempts }
    }

    /// Returns the next number without reserving it.
    #[cfg(test)]
    pub async fn allocate_next(&self) -> Result<u64> {
        Ok(self.allocate(None).await?.number)
    }

    /// Returns the next number and reserves it for `owner`. While the reservation stands,
    /// further calls for the same owner return the same number. Fails with
    /// `AllocationFailed` once the retry budget is spent.
    pub async fn allocate_for(&self, owner: &str) -> Result<Allocation> {
        self.allocate(Some(owner)).await
    }

    async fn allocate(&self, owner: Option<&str>) -> Result<Allocation> {
        let seed = match load::<SequenceCounter>(&*self.store, COUNTERS, SEQUENCE_KEY).await? {
            Some(_) => 0,
            None => self.bootstrap().await?,
        };

        let (number, reused) = self
            .transact(|current| {
                let mut counter = current.unwrap_or_else(|| SequenceCounter::at(seed));
                if let Some(&number) = owner.and_then(|o| counter.reserved.get(o)) {
                    return Ok((counter, (number, true)));
                }
                counter.last += 1;
                let number = counter.last;
                if let Some(owner) = owner {
                    counter.reserved.insert(owner.to_string(), number);
                }
                Ok((counter, (number, false)))
            })
            .await?;

        if reused {
            tracing::info!(number, owner = owner.unwrap_or_default(), "reusing reserved sequence number");
        } else {
            tracing::info!(number, "allocated sequence number");
        }
        Ok(Allocation {
            number,
            fresh: !reused,
        })
    }

    /// Number currently reserved for `owner`, if any.
    pub async fn reservation(&self, owner: &str) -> Result<Option<u64>> {
        Ok(load::<SequenceCounter>(&*self.store, COUNTERS, SEQUENCE_KEY)
            .await?
            .and_then(|c| c.reserved.get(owner).copied()))
    }

    /// Drops the reservation once the number is stored on the submission.
    pub async fn settle(&self, owner: &str) -> Result<()> {
        if self.reservation(owner).await?.is_none() {
            return Ok(());
        }
        self.transact(|current| {
            let mut counter = current.unwrap_or_default();
            counter.reserved.remove(owner);
            Ok((counter, ()))
        })
        .await
    }

    /// Gives back `number` if it is still reserved for `owner`. Returns `false` when the
    /// number has been overtaken by a later allocation and is lost.
    pub async fn unwind(&self, owner: &str, number: u64) -> Result<bool> {
        if self.reservation(owner).await? != Some(number) {
            return Ok(true);
        }
        let returned = self
            .transact(|current| {
                let mut counter = current.unwrap_or_default();
                if counter.reserved.get(owner) != Some(&number) {
                    return Ok((counter, true));
                }
                counter.reserved.remove(owner);
                let returned = counter.last == number;
                if returned {
                    counter.last -= 1;
                }
                Ok((counter, returned))
            })
            .await?;
        if returned {
            tracing::info!(number, owner, "sequence number returned");
        } else {
            tracing::error!(target: "reconcile", number, owner, "reserved sequence number skipped");
        }
        Ok(returned)
    }

    /// Last number handed out, without allocating.
    pub async fn current(&self) -> Result<u64> {
        match load::<SequenceCounter>(&*self.store, COUNTERS, SEQUENCE_KEY).await? {
            Some(counter) => Ok(counter.last),
            None => self.bootstrap().await,
        }
    }

    async fn transact<R, F>(&self, f: F) -> Result<R>
    where
        F: FnMut(Option<SequenceCounter>) -> Result<(SequenceCounter, R)>,
    {
        run_transaction(&*self.store, COUNTERS, SEQUENCE_KEY, self.attempts, f)
            .await
            .map_err(|e| match e {
                TxError::Contention { attempts, .. } => BoardError::AllocationFailed { attempts },
                TxError::Aborted(inner) => inner,
            })
    }

    /// Highest number already present among approved submissions, for a store that has
    /// submissions but no counter record yet.
    async fn bootstrap(&self) -> Result<u64> {
        let submissions: Vec<Submission> = load_all(&*self.store, SUBMISSIONS).await?;
        let max = submissions
            .iter()
            .filter(|s| s.state == SubmissionState::Approved)
            .filter_map(|s| s.number)
            .max()
            .unwrap_or(0);
        tracing::info!(max, "bootstrapping sequence counter");
        Ok(max)
    }
}
