//! # Submission Lifecycle
//!
//! Owns the `pending -> approved | rejected` transitions and their side effects.
//!
//! Approval order:
//! 1. claim the pending record for the moderator (transactional),
//! 2. allocate the number (exactly once per successful claim),
//! 3. store `approved` + number,
//! 4. publish, then store the publish reference,
//! 5. notify the author once the post is live, and award reputation.
//!
//! A publish failure after step 3 leaves the number in place and is logged for reconciliation.
//! The number is reserved for the submission until step 3 lands, so an approval interrupted
//! between steps 2 and 3 can be retried by the claiming moderator (or by anyone after
//! `release`) without skipping a number.

use std::sync::Arc;

use crate::application::fanout::Fanout;
use crate::application::rate_limiter::{RateAction, RateLimiter};
use crate::application::repo::Repository;
use crate::application::sequence::SequenceAllocator;
use crate::application::text;
use crate::domain::config::AppConfig;
use crate::domain::error::{BoardError, Result};
use crate::domain::events::{Action, Control};
use crate::domain::traits::Publisher;
use crate::domain::types::{Achievement, Submission, SubmissionState};
use crate::strings::messages;

/// Counts shown by `.stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub last_number: u64,
}

#[derive(Clone)]
pub struct SubmissionService {
    repo: Repository,
    allocator: SequenceAllocator,
    limiter: RateLimiter,
    fanout: Fanout,
    publisher: Arc<dyn Publisher>,
    config: Arc<AppConfig>,
}

impl SubmissionService {
    pub fn new(
        repo: Repository,
        allocator: SequenceAllocator,
        limiter: RateLimiter,
        fanout: Fanout,
        publisher: Arc<dyn Publisher>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            repo,
            allocator,
            limiter,
            fanout,
            publisher,
            config,
        }
    }

    /// Validates and stores a new pending submission, then sends review cards to the admins.
    pub async fn submit(&self, author: &str, raw: &str) -> Result<Submission> {
        let policy = &self.config.policy.submission;
        // Bounds first: an out-of-policy text must not touch the store.
        text::check_length(raw, policy.min_len, policy.max_len, "Submission")?;

        if self.repo.find_user(author).await?.is_some_and(|u| u.blocked) {
            return Err(BoardError::Unauthorized(format!("{author} is blocked")));
        }
        self.limiter
            .check_cooldown(author, RateAction::Submit, policy.cooldown_ms)
            .await?;

        let clean = text::sanitize(raw);
        text::check_length(&clean, policy.min_len, policy.max_len, "Submission")?;
        let hashtags = text::hashtags(&clean);

        let submission = self
            .repo
            .insert_submission(Submission::pending(author, clean, hashtags, self.repo.now()))
            .await?;
        self.repo.update_user(author, |u| u.submitted += 1).await?;
        self.limiter
            .record(author, RateAction::Submit, 1, policy.cooldown_ms)
            .await?;

        tracing::info!(id = %submission.id, author, "submission received");

        let report = self
            .fanout
            .notify(
                &self.config.board.admins,
                &messages::review_card(&submission),
                &review_controls(&submission.id),
            )
            .await;
        if !report.all_delivered() {
            tracing::warn!(
                id = %submission.id,
                failed = report.failed.len(),
                "review card not delivered to every admin"
            );
        }
        Ok(submission)
    }

    /// Approves a pending submission and publishes it to the channel.
    pub async fn approve(&self, id: &str, moderator: &str) -> Result<Submission> {
        self.repo
            .update_submission(id, |sub| {
                if !sub.is_claimable_by(moderator) {
                    return Err(BoardError::NotFound(format!("Pending submission {id}")));
                }
                sub.review_claim = Some(moderator.to_string());
                Ok(())
            })
            .await?;

        let allocation = match self.allocator.allocate_for(id).await {
            Ok(allocation) => allocation,
            Err(err) => {
                self.release_claim(id, moderator).await;
                return Err(err);
            }
        };
        let number = allocation.number;

        let stored = self
            .repo
            .update_submission(id, |sub| {
                if sub.state != SubmissionState::Pending {
                    return Err(BoardError::NotFound(format!("Pending submission {id}")));
                }
                sub.state = SubmissionState::Approved;
                sub.number = Some(number);
                sub.review_claim = None;
                sub.reviewed_by = Some(moderator.to_string());
                sub.reviewed_at = Some(self.repo.now());
                Ok(sub.clone())
            })
            .await;
        let approved = match stored {
            Ok(approved) => approved,
            Err(err @ BoardError::NotFound(_)) => {
                // A retry of the same claim won; only a number this call allocated goes back.
                if allocation.fresh {
                    if let Err(e) = self.allocator.unwind(id, number).await {
                        tracing::error!(target: "reconcile", id, number, "failed to return number: {e}");
                    }
                }
                return Err(err);
            }
            Err(err) => {
                // Claim and reservation stay, so the next approve reuses the number.
                tracing::error!(
                    target: "reconcile",
                    id,
                    number,
                    moderator,
                    "number reserved but approval not stored: {err}"
                );
                return Err(err);
            }
        };
        tracing::info!(id, number, moderator, "submission approved");
        if let Err(e) = self.allocator.settle(id).await {
            tracing::warn!(id, number, "failed to settle number reservation: {e}");
        }

        let published = self.publish(&approved).await;
        if published.is_ok() {
            self.notify_published(&approved.author, number).await;
        }

        let reputation = self.config.policy.reputation.approved;
        match self
            .repo
            .update_user(&approved.author, |u| {
                u.approved += 1;
                u.reputation += reputation;
                u.unlock_achievements()
            })
            .await
        {
            Ok(unlocked) => announce(&self.fanout, &approved.author, &unlocked).await,
            Err(e) => tracing::error!(id, number, "failed to reward author: {e}"),
        }

        match published {
            Ok(submission) => Ok(submission),
            Err(reason) => Err(BoardError::PublishFailed { number, reason }),
        }
    }

    /// Drops a moderator's claim on a pending submission, e.g. after an interrupted approval.
    /// A number already reserved for it is kept for the next approval.
    pub async fn release(&self, id: &str) -> Result<(Submission, Option<u64>)> {
        let released = self
            .repo
            .update_submission(id, |sub| {
                if sub.state != SubmissionState::Pending || sub.review_claim.is_none() {
                    return Err(BoardError::NotFound(format!("Claimed submission {id}")));
                }
                sub.review_claim = None;
                Ok(sub.clone())
            })
            .await?;
        let reserved = self.allocator.reservation(id).await?;
        tracing::info!(id, reserved = ?reserved, "review claim released");
        Ok((released, reserved))
    }

    /// Rejects a pending submission. Never touches the sequence counter.
    pub async fn reject(&self, id: &str, moderator: &str, reason: &str) -> Result<Submission> {
        let reason = text::sanitize(reason);
        text::check_length(&reason, 1, self.config.policy.submission.max_len, "Reason")?;

        let rejected = self
            .repo
            .update_submission(id, |sub| {
                if !sub.is_reviewable() {
                    return Err(BoardError::NotFound(format!("Pending submission {id}")));
                }
                sub.state = SubmissionState::Rejected;
                sub.rejection_reason = Some(reason.clone());
                sub.reviewed_by = Some(moderator.to_string());
                sub.reviewed_at = Some(self.repo.now());
                Ok(sub.clone())
            })
            .await?;
        tracing::info!(id, moderator, "submission rejected");

        // Left over from an interrupted approval that was released.
        if let Some(number) = self.allocator.reservation(id).await? {
            if let Err(e) = self.allocator.unwind(id, number).await {
                tracing::error!(target: "reconcile", id, number, "failed to return number: {e}");
            }
        }

        self.repo.update_user(&rejected.author, |u| u.rejected += 1).await?;
        let _ = self
            .fanout
            .notify_one(&rejected.author, &messages::rejected_notice(&reason), &[])
            .await;
        Ok(rejected)
    }

    /// Posts an approved submission that has no publish reference yet.
    pub async fn republish(&self, number: u64) -> Result<Submission> {
        let submission = self
            .repo
            .find_by_number(number)
            .await?
            .ok_or_else(|| BoardError::NotFound(format!("Post #{number}")))?;
        if submission.publish_ref.is_some() {
            return Err(BoardError::Validation(format!("#{number} is already published")));
        }
        let published = self
            .publish(&submission)
            .await
            .map_err(|reason| BoardError::PublishFailed { number, reason })?;
        self.notify_published(&published.author, number).await;
        Ok(published)
    }

    /// Re-renders the post controls after the comment counter changed. Best effort.
    pub async fn refresh_post(&self, submission: &Submission) {
        let (Some(number), Some(message_ref)) = (submission.number, &submission.publish_ref) else {
            return;
        };
        let body = messages::channel_post(number, submission, &self.config.board.bot_handle);
        if let Err(e) = self
            .publisher
            .update_controls(
                &self.config.board.channel,
                message_ref,
                &body,
                &post_controls(submission),
            )
            .await
        {
            tracing::warn!(number, "failed to refresh post controls: {e}");
        }
    }

    pub async fn pending(&self) -> Result<Vec<Submission>> {
        self.repo.submissions_in(SubmissionState::Pending).await
    }

    /// Approved submissions that never reached the channel.
    pub async fn unpublished(&self) -> Result<Vec<Submission>> {
        Ok(self
            .repo
            .submissions_in(SubmissionState::Approved)
            .await?
            .into_iter()
            .filter(|s| s.publish_ref.is_none())
            .collect())
    }

    pub async fn stats(&self) -> Result<BoardStats> {
        let all = self.repo.submissions().await?;
        let count = |state: SubmissionState| all.iter().filter(|s| s.state == state).count();
        Ok(BoardStats {
            pending: count(SubmissionState::Pending),
            approved: count(SubmissionState::Approved),
            rejected: count(SubmissionState::Rejected),
            last_number: self.allocator.current().await?,
        })
    }

    async fn publish(&self, submission: &Submission) -> std::result::Result<Submission, String> {
        let number = submission.number.unwrap_or_default();
        let body = messages::channel_post(number, submission, &self.config.board.bot_handle);
        let message_ref = match self
            .publisher
            .post(&self.config.board.channel, &body, &post_controls(submission))
            .await
        {
            Ok(message_ref) => message_ref,
            Err(reason) => {
                tracing::error!(
                    target: "reconcile",
                    id = %submission.id,
                    number,
                    "{}",
                    BoardError::PublishFailed { number, reason: reason.clone() }
                );
                return Err(reason);
            }
        };

        self.repo
            .update_submission(&submission.id, |sub| {
                sub.publish_ref = Some(message_ref.clone());
                Ok(sub.clone())
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    target: "reconcile",
                    id = %submission.id,
                    number,
                    message_ref = %message_ref,
                    "published but reference not stored: {e}"
                );
                e.to_string()
            })
    }

    async fn notify_published(&self, author: &str, number: u64) {
        let _ = self
            .fanout
            .notify_one(author, &messages::approved_notice(number), &[])
            .await;
    }

    async fn release_claim(&self, id: &str, moderator: &str) {
        let released = self
            .repo
            .update_submission(id, |sub| {
                if sub.review_claim.as_deref() == Some(moderator) {
                    sub.review_claim = None;
                }
                Ok(())
            })
            .await;
        if let Err(e) = released {
            tracing::error!(id, moderator, "failed to release review claim: {e}");
        }
    }
}

/// Controls attached to an admin review card.
pub fn review_controls(id: &str) -> Vec<Control> {
    vec![
        Control::new("✅ Approve", Action::Approve(id.to_string())),
        Control::new("❌ Reject", Action::Reject(id.to_string())),
        Control::new("✉️ Message author", Action::MessageAuthor(id.to_string())),
    ]
}

/// Controls attached to a channel post.
pub fn post_controls(submission: &Submission) -> Vec<Control> {
    vec![
        Control::new(
            messages::comment_label(submission.comment_count),
            Action::Comment(submission.id.clone()),
        ),
        Control::new("✉️ Reply privately", Action::Private(submission.id.clone())),
    ]
}

/// Tells a user about newly unlocked achievements.
pub async fn announce(fanout: &Fanout, user: &str, unlocked: &[Achievement]) {
    for achievement in unlocked {
        tracing::info!(user, achievement = achievement.title(), "achievement unlocked");
        let _ = fanout
            .notify_one(user, &messages::achievement_unlocked(*achievement), &[])
            .await;
    }
}
