//! # Comments & Private Messages
//!
//! Appends public comments and anonymous private relays to an approved submission.

use std::sync::Arc;
use uuid::Uuid;

use crate::application::fanout::Fanout;
use crate::application::lifecycle::{SubmissionService, announce};
use crate::application::rate_limiter::{RateAction, RateLimiter};
use crate::application::repo::Repository;
use crate::application::text;
use crate::domain::config::AppConfig;
use crate::domain::error::{BoardError, Result};
use crate::domain::types::{Comment, Visibility};
use crate::strings::messages;

#[derive(Clone)]
pub struct CommentService {
    repo: Repository,
    limiter: RateLimiter,
    fanout: Fanout,
    submissions: SubmissionService,
    config: Arc<AppConfig>,
}

impl CommentService {
    pub fn new(
        repo: Repository,
        limiter: RateLimiter,
        fanout: Fanout,
        submissions: SubmissionService,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            repo,
            limiter,
            fanout,
            submissions,
            config,
        }
    }

    pub async fn add_comment(
        &self,
        submission_id: &str,
        author: &str,
        raw: &str,
        visibility: Visibility,
    ) -> Result<Comment> {
        let submission = self
            .repo
            .submission(submission_id)
            .await?
            .filter(|s| s.is_approved())
            .ok_or_else(|| BoardError::NotFound(format!("Post {submission_id}")))?;

        let policy = &self.config.policy.comment;
        text::check_length(raw, policy.min_len, policy.max_len, "Comment")?;
        if self.repo.find_user(author).await?.is_some_and(|u| u.blocked) {
            return Err(BoardError::Unauthorized(format!("{author} is blocked")));
        }
        self.limiter
            .check_window(author, RateAction::Comment, policy.limit, policy.window_ms)
            .await?;

        let clean = text::sanitize(raw);
        text::check_length(&clean, policy.min_len, policy.max_len, "Comment")?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            submission_id: submission.id.clone(),
            author: author.to_string(),
            text: clean,
            visibility,
            created_at: self.repo.now(),
        };
        self.repo.insert_comment(&comment).await?;
        self.limiter
            .record(
                author,
                RateAction::Comment,
                policy.limit as usize,
                policy.window_ms,
            )
            .await?;

        let number = submission.number.unwrap_or_default();
        let own_post = submission.author == author;

        match visibility {
            Visibility::Public => {
                let updated = self
                    .repo
                    .update_submission(&submission.id, |sub| {
                        sub.comment_count += 1;
                        Ok(sub.clone())
                    })
                    .await?;

                let reputation = self.config.policy.reputation.comment;
                let unlocked = self
                    .repo
                    .update_user(author, |u| {
                        u.comments += 1;
                        u.reputation += reputation;
                        u.unlock_achievements()
                    })
                    .await?;
                announce(&self.fanout, author, &unlocked).await;

                self.submissions.refresh_post(&updated).await;

                if !own_post {
                    let _ = self
                        .fanout
                        .notify_one(
                            &submission.author,
                            &messages::comment_notice(number, &comment.text),
                            &[],
                        )
                        .await;
                }
                tracing::info!(number, count = updated.comment_count, "comment added");
            }
            Visibility::Private => {
                if !own_post {
                    let _ = self
                        .fanout
                        .notify_one(
                            &submission.author,
                            &messages::private_notice(number, &comment.text),
                            &[],
                        )
                        .await;
                }
                tracing::info!(number, "private message relayed");
            }
        }

        Ok(comment)
    }
}
