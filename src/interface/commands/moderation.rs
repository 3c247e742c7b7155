//! # Moderation Actions
//!
//! Approve, reject (with a reason collected as the moderator's next message) and
//! message-author actions from the review card.

use crate::application::state::Session;
use crate::domain::error::{BoardError, Result};
use crate::domain::types::Submission;
use crate::interface::commands::Context;
use crate::strings::messages;

pub async fn handle_approve(ctx: &Context<'_>, id: &str) -> Result<()> {
    let approved = ctx.board.submissions.approve(id, ctx.sender).await?;
    ctx.reply(&messages::approved_ack(approved.number.unwrap_or_default()))
        .await;
    Ok(())
}

pub async fn start_rejection(ctx: &Context<'_>, id: &str) -> Result<()> {
    reviewable(ctx, id).await?;
    ctx.start_session(Session::AwaitingRejectionReason(id.to_string()))
        .await;
    ctx.reply(messages::REJECTION_REASON_PROMPT).await;
    Ok(())
}

pub async fn handle_rejection_reason(ctx: &Context<'_>, id: &str, reason: &str) -> Result<()> {
    ctx.require_admin()?;
    ctx.board.submissions.reject(id, ctx.sender, reason).await?;
    ctx.reply(&messages::rejected_ack(id)).await;
    Ok(())
}

/// The author's id never reaches the moderator; the session carries it.
pub async fn start_author_message(ctx: &Context<'_>, id: &str) -> Result<()> {
    let submission = ctx
        .board
        .repo
        .submission(id)
        .await?
        .ok_or_else(|| BoardError::NotFound(format!("Submission {id}")))?;
    ctx.start_session(Session::AwaitingAdminMessage(submission.author))
        .await;
    ctx.reply(messages::ADMIN_MESSAGE_PROMPT).await;
    Ok(())
}

async fn reviewable(ctx: &Context<'_>, id: &str) -> Result<Submission> {
    ctx.board
        .repo
        .submission(id)
        .await?
        .filter(Submission::is_reviewable)
        .ok_or_else(|| BoardError::NotFound(format!("Pending submission {id}")))
}
