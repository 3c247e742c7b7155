//! # Admin Commands
//!
//! Moderator-only commands: `.stats`, `.pending`, `.block`, `.unblock`, `.msg`,
//! `.unpublished`, `.republish` and `.release`. The router checks the allow-list before calling these.

use crate::application::lifecycle::review_controls;
use crate::application::state::Session;
use crate::application::text;
use crate::domain::error::{BoardError, Result};
use crate::interface::commands::Context;
use crate::strings::messages;

pub async fn handle_stats(ctx: &Context<'_>) -> Result<()> {
    let stats = ctx.board.submissions.stats().await?;
    let sessions = ctx.board.state.lock().await.active_count();
    ctx.reply(&messages::stats(
        stats.pending,
        stats.approved,
        stats.rejected,
        stats.last_number,
        sessions,
    ))
    .await;
    Ok(())
}

/// Re-sends a review card for every pending submission.
pub async fn handle_pending(ctx: &Context<'_>) -> Result<()> {
    let pending = ctx.board.submissions.pending().await?;
    if pending.is_empty() {
        ctx.reply(messages::NO_PENDING).await;
        return Ok(());
    }
    for submission in &pending {
        ctx.reply_with(
            &messages::review_card(submission),
            &review_controls(&submission.id),
        )
        .await;
    }
    Ok(())
}

pub async fn handle_block(ctx: &Context<'_>, arg: Option<&str>, blocked: bool) -> Result<()> {
    let target = arg.ok_or_else(|| BoardError::Validation(messages::BLOCK_USAGE.to_string()))?;
    ctx.board
        .repo
        .update_user(target, |u| u.blocked = blocked)
        .await?;
    tracing::info!(moderator = ctx.sender, target, blocked, "user block changed");

    if blocked {
        ctx.board.state.lock().await.clear(target);
        let _ = ctx
            .board
            .fanout
            .notify_one(target, messages::BLOCKED_NOTICE, &[])
            .await;
    }
    ctx.reply(&messages::block_changed(target, blocked)).await;
    Ok(())
}

pub async fn handle_msg_command(ctx: &Context<'_>, arg: Option<&str>) -> Result<()> {
    let target = arg.ok_or_else(|| BoardError::Validation(messages::MSG_USAGE.to_string()))?;
    ctx.start_session(Session::AwaitingAdminMessage(target.to_string()))
        .await;
    ctx.reply(messages::ADMIN_MESSAGE_PROMPT).await;
    Ok(())
}

pub async fn handle_admin_message(ctx: &Context<'_>, target: &str, body: &str) -> Result<()> {
    ctx.require_admin()?;
    let body = text::sanitize(body);
    text::check_length(&body, 1, ctx.board.config.policy.submission.max_len, "Message")?;
    ctx.board
        .fanout
        .notify_one(target, &messages::admin_message(&body), &[])
        .await?;
    tracing::info!(moderator = ctx.sender, "admin message delivered");
    ctx.reply(messages::ADMIN_MESSAGE_SENT).await;
    Ok(())
}

pub async fn handle_unpublished(ctx: &Context<'_>) -> Result<()> {
    let missing = ctx.board.submissions.unpublished().await?;
    if missing.is_empty() {
        ctx.reply(messages::NOTHING_UNPUBLISHED).await;
        return Ok(());
    }
    let entries: Vec<(u64, String)> = missing
        .into_iter()
        .map(|s| (s.number.unwrap_or_default(), s.id))
        .collect();
    ctx.reply(&messages::unpublished(&entries)).await;
    Ok(())
}

pub async fn handle_republish(ctx: &Context<'_>, arg: Option<&str>) -> Result<()> {
    let number = arg
        .map(|a| a.trim_start_matches('#'))
        .and_then(|a| a.parse::<u64>().ok())
        .ok_or_else(|| BoardError::Validation(messages::REPUBLISH_USAGE.to_string()))?;
    ctx.board.submissions.republish(number).await?;
    ctx.reply(&messages::republished_ack(number)).await;
    Ok(())
}

/// Reopens a submission whose approval was interrupted.
pub async fn handle_release(ctx: &Context<'_>, arg: Option<&str>) -> Result<()> {
    let id = arg.ok_or_else(|| BoardError::Validation(messages::RELEASE_USAGE.to_string()))?;
    let (released, reserved) = ctx.board.submissions.release(id).await?;
    tracing::info!(moderator = ctx.sender, id = %released.id, "claim released by command");
    ctx.reply(&messages::claim_released(&released.id, reserved)).await;
    Ok(())
}
