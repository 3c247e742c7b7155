//! # Submit Command
//!
//! `.submit` opens the submission flow; the next free text becomes the submission.

use crate::application::state::Session;
use crate::domain::error::Result;
use crate::interface::commands::Context;
use crate::strings::messages;

pub async fn handle_submit_command(ctx: &Context<'_>) -> Result<()> {
    ctx.start_session(Session::AwaitingSubmission).await;
    ctx.reply(messages::SUBMIT_PROMPT).await;
    Ok(())
}

pub async fn handle_submission(ctx: &Context<'_>, text: &str) -> Result<()> {
    ctx.board.submissions.submit(ctx.sender, text).await?;
    ctx.reply(messages::SUBMISSION_RECEIVED).await;
    Ok(())
}
