//! # Start, Help, Cancel & Profile
//!
//! Handles `.start [deep-link]`, `.help`, `.cancel` and `.me`.

use crate::application::state::Session;
use crate::domain::error::Result;
use crate::domain::types::Visibility;
use crate::interface::commands::{Context, comment};
use crate::strings::{help, menu, messages};

pub async fn handle_start(ctx: &Context<'_>, arg: Option<&str>) -> Result<()> {
    let Some(link) = arg else {
        ctx.reply(&messages::welcome(&[menu::SUBMIT, menu::PROFILE, menu::HELP]))
            .await;
        return Ok(());
    };

    if let Some(id) = link.strip_prefix("comment_") {
        comment::start_flow(ctx, id, Visibility::Public).await
    } else if let Some(id) = link.strip_prefix("reply_") {
        comment::start_flow(ctx, id, Visibility::Private).await
    } else {
        ctx.reply(messages::UNKNOWN_DEEP_LINK).await;
        Ok(())
    }
}

pub async fn handle_help(ctx: &Context<'_>) -> Result<()> {
    if ctx.board.is_admin(ctx.sender) {
        ctx.reply(&format!("{}{}", help::MAIN, help::ADMIN)).await;
    } else {
        ctx.reply(help::MAIN).await;
    }
    Ok(())
}

pub async fn handle_cancel(ctx: &Context<'_>) -> Result<()> {
    let cleared = ctx.board.state.lock().await.clear(ctx.sender);
    match cleared {
        Some(session) if session != Session::Idle => {
            tracing::info!(sender = ctx.sender, flow = session.label(), "flow cancelled");
            ctx.reply(messages::SESSION_CANCELLED).await;
        }
        _ => ctx.reply(messages::NOTHING_TO_CANCEL).await,
    }
    Ok(())
}

pub async fn handle_profile(ctx: &Context<'_>) -> Result<()> {
    let user = ctx.board.repo.user(ctx.sender).await?;
    ctx.reply(&messages::profile(&user)).await;
    Ok(())
}
