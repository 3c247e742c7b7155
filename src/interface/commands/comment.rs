//! # Comment & Private Reply
//!
//! Starts the comment / private-message flows for a published post and handles the text
//! that completes them.

use crate::application::state::Session;
use crate::domain::error::{BoardError, Result};
use crate::domain::types::Visibility;
use crate::interface::commands::Context;
use crate::strings::messages;

pub async fn start_flow(ctx: &Context<'_>, submission_id: &str, visibility: Visibility) -> Result<()> {
    let number = ctx
        .board
        .repo
        .submission(submission_id)
        .await?
        .filter(|s| s.is_approved())
        .and_then(|s| s.number)
        .ok_or_else(|| BoardError::NotFound(format!("Post {submission_id}")))?;

    let id = submission_id.to_string();
    match visibility {
        Visibility::Public => {
            ctx.start_session(Session::AwaitingComment(id)).await;
            ctx.reply(&messages::comment_prompt(number)).await;
        }
        Visibility::Private => {
            ctx.start_session(Session::AwaitingPrivateMessage(id)).await;
            ctx.reply(&messages::private_prompt(number)).await;
        }
    }
    Ok(())
}

pub async fn handle_text(
    ctx: &Context<'_>,
    submission_id: &str,
    text: &str,
    visibility: Visibility,
) -> Result<()> {
    ctx.board
        .comments
        .add_comment(submission_id, ctx.sender, text, visibility)
        .await?;
    let ack = match visibility {
        Visibility::Public => messages::COMMENT_ADDED,
        Visibility::Private => messages::PRIVATE_SENT,
    };
    ctx.reply(ack).await;
    Ok(())
}
