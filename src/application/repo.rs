//! # Repository
//!
//! Typed access to users, submissions and comments on top of the raw `Store`.
//! Every mutation of a shared record goes through `run_transaction`.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::error::{BoardError, Result};
use crate::domain::traits::{Clock, Store};
use crate::domain::types::{Comment, Submission, SubmissionState, User};
use crate::infrastructure::store::{
    COMMENTS, SUBMISSIONS, USERS, insert, load, load_all, run_transaction,
};

/// Collision suffixes tried before giving up on a submission id.
const MAX_ID_SUFFIX: u32 = 32;

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    tx_attempts: u32,
    id_key: Uuid,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, tx_attempts: u32, id_key: Uuid) -> Self {
        Self {
            store,
            clock,
            tx_attempts,
            id_key,
        }
    }

    /// Id key from a configured secret, or a random one when none is set.
    pub fn id_key(secret: Option<&str>) -> Uuid {
        match secret {
            Some(secret) => Uuid::new_v5(&Uuid::NAMESPACE_OID, secret.as_bytes()),
            None => Uuid::new_v4(),
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    pub async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(load(&*self.store, USERS, id).await?)
    }

    /// Loads a user, creating the record on first interaction.
    pub async fn user(&self, id: &str) -> Result<User> {
        if let Some(user) = self.find_user(id).await? {
            return Ok(user);
        }
        let fresh = User::new(id, self.now());
        if insert(&*self.store, USERS, id, &fresh).await? {
            tracing::info!(user = id, "registered new user");
            return Ok(fresh);
        }
        // Lost the race to a concurrent first interaction.
        self.find_user(id)
            .await?
            .ok_or_else(|| BoardError::NotFound(format!("user {id}")))
    }

    /// Applies `f` to the user record inside a transaction, creating it if missing.
    pub async fn update_user<R, F>(&self, id: &str, mut f: F) -> Result<R>
    where
        F: FnMut(&mut User) -> R,
    {
        let now = self.now();
        let out = run_transaction(
            &*self.store,
            USERS,
            id,
            self.tx_attempts,
            |current: Option<User>| {
                let mut user = current.unwrap_or_else(|| User::new(id, now));
                let out = f(&mut user);
                Ok((user, out))
            },
        )
        .await?;
        Ok(out)
    }

    pub async fn submission(&self, id: &str) -> Result<Option<Submission>> {
        Ok(load(&*self.store, SUBMISSIONS, id).await?)
    }

    /// Persists a new submission under a fresh id derived from author and creation time.
    /// Ids are public (deep links, post controls) and reveal nothing about the author.
    pub async fn insert_submission(&self, mut submission: Submission) -> Result<Submission> {
        for attempt in 0..MAX_ID_SUFFIX {
            submission.id =
                submission_id(&self.id_key, &submission.author, submission.created_at, attempt);
            if insert(&*self.store, SUBMISSIONS, &submission.id, &submission).await? {
                return Ok(submission);
            }
        }
        Err(BoardError::Store(anyhow::anyhow!(
            "No free submission id for {} at {}",
            submission.author,
            submission.created_at
        )))
    }

    /// Applies `f` to an existing submission inside a transaction.
    /// `f` returning `Err` aborts without writing.
    pub async fn update_submission<R, F>(&self, id: &str, mut f: F) -> Result<R>
    where
        F: FnMut(&mut Submission) -> Result<R>,
    {
        let out = run_transaction(
            &*self.store,
            SUBMISSIONS,
            id,
            self.tx_attempts,
            |current: Option<Submission>| {
                let mut submission =
                    current.ok_or_else(|| BoardError::NotFound(format!("submission {id}")))?;
                let out = f(&mut submission)?;
                Ok((submission, out))
            },
        )
        .await?;
        Ok(out)
    }

    pub async fn submissions(&self) -> Result<Vec<Submission>> {
        let mut all: Vec<Submission> = load_all(&*self.store, SUBMISSIONS).await?;
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }

    pub async fn submissions_in(&self, state: SubmissionState) -> Result<Vec<Submission>> {
        Ok(self
            .submissions()
            .await?
            .into_iter()
            .filter(|s| s.state == state)
            .collect())
    }

    pub async fn find_by_number(&self, number: u64) -> Result<Option<Submission>> {
        Ok(self
            .submissions()
            .await?
            .into_iter()
            .find(|s| s.number == Some(number)))
    }

    pub async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        if !insert(&*self.store, COMMENTS, &comment.id, comment).await? {
            return Err(BoardError::Store(anyhow::anyhow!(
                "Duplicate comment id {}",
                comment.id
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub async fn comments_for(&self, submission_id: &str) -> Result<Vec<Comment>> {
        let all: Vec<Comment> = load_all(&*self.store, COMMENTS).await?;
        let mut comments: Vec<Comment> = all
            .into_iter()
            .filter(|c| c.submission_id == submission_id)
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }
}

/// Keyed name-based uuid over the whole `(author, time, attempt)` tuple.
fn submission_id(key: &Uuid, author: &str, created_at: i64, attempt: u32) -> String {
    let name = format!("{author}\n{created_at}\n{attempt}");
    Uuid::new_v5(key, name.as_bytes()).simple().to_string()
}
