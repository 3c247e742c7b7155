//! # Command Router
//!
//! Routes decoded inbound events to the appropriate handler (in `interface/commands`).
//! Commands and menu labels start flows; free text goes to whatever flow the sender's
//! session is waiting on, or becomes a new submission when the session is idle.

use anyhow::Result;
use std::sync::Arc;

use crate::application::Board;
use crate::application::state::Session;
use crate::domain::error::BoardError;
use crate::domain::events::{Action, InboundEvent};
use crate::domain::types::Visibility;
use crate::interface::commands::{self, Context};
use crate::strings::{menu, messages};

pub struct CommandRouter {
    board: Arc<Board>,
}

impl CommandRouter {
    pub fn new(board: Arc<Board>) -> Self {
        Self { board }
    }

    pub async fn route(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Command {
                name,
                arg,
                from,
                chat,
            } => {
                tracing::info!(
                    "Router dispatching cmd='{}' args='{}' sender='{}'",
                    name,
                    arg.as_deref().unwrap_or(""),
                    from
                );
                let ctx = Context::new(&self.board, &from, &chat);
                let result = self.dispatch_command(&ctx, &name, arg.as_deref()).await;
                report(&ctx, result).await
            }
            InboundEvent::FreeText { text, from, chat } => {
                let ctx = Context::new(&self.board, &from, &chat);
                let result = match menu::command_for_label(&text) {
                    Some(name) => {
                        tracing::info!("Router dispatching menu '{}' sender='{}'", name, from);
                        self.dispatch_command(&ctx, name, None).await
                    }
                    None => self.dispatch_text(&ctx, &text).await,
                };
                report(&ctx, result).await
            }
            InboundEvent::ButtonPress { action, from, .. } => {
                tracing::info!("Router dispatching action='{}' sender='{}'", action, from);
                // Button presses have no reply room of their own; answer in the sender's DM.
                let ctx = Context::new(&self.board, &from, &from);
                let result = self.dispatch_action(&ctx, action).await;
                report(&ctx, result).await
            }
        }
    }

    async fn dispatch_command(
        &self,
        ctx: &Context<'_>,
        name: &str,
        arg: Option<&str>,
    ) -> Result<(), BoardError> {
        match name {
            "start" => commands::start::handle_start(ctx, arg).await,
            "help" => commands::start::handle_help(ctx).await,
            "cancel" => commands::start::handle_cancel(ctx).await,
            "me" => commands::start::handle_profile(ctx).await,
            "submit" => commands::submit::handle_submit_command(ctx).await,
            "do" => {
                // A well-formed `.do` never gets here; surface the parse error.
                arg.unwrap_or_default().parse::<Action>()?;
                Ok(())
            }
            "stats" | "pending" | "block" | "unblock" | "msg" | "unpublished" | "republish"
            | "release" => {
                ctx.require_admin()?;
                match name {
                    "stats" => commands::admin::handle_stats(ctx).await,
                    "pending" => commands::admin::handle_pending(ctx).await,
                    "block" => commands::admin::handle_block(ctx, arg, true).await,
                    "unblock" => commands::admin::handle_block(ctx, arg, false).await,
                    "msg" => commands::admin::handle_msg_command(ctx, arg).await,
                    "unpublished" => commands::admin::handle_unpublished(ctx).await,
                    "release" => commands::admin::handle_release(ctx, arg).await,
                    _ => commands::admin::handle_republish(ctx, arg).await,
                }
            }
            _ => {
                ctx.reply(messages::UNKNOWN_COMMAND).await;
                Ok(())
            }
        }
    }

    async fn dispatch_action(&self, ctx: &Context<'_>, action: Action) -> Result<(), BoardError> {
        if action.is_moderation() {
            ctx.require_admin()?;
        }
        match action {
            Action::Approve(id) => commands::moderation::handle_approve(ctx, &id).await,
            Action::Reject(id) => commands::moderation::start_rejection(ctx, &id).await,
            Action::MessageAuthor(id) => commands::moderation::start_author_message(ctx, &id).await,
            Action::Comment(id) => commands::comment::start_flow(ctx, &id, Visibility::Public).await,
            Action::Private(id) => commands::comment::start_flow(ctx, &id, Visibility::Private).await,
            Action::Cancel => commands::start::handle_cancel(ctx).await,
        }
    }

    /// Hands free text to the sender's pending flow. The flow ends on success and on any
    /// error the user cannot fix by resending.
    async fn dispatch_text(&self, ctx: &Context<'_>, text: &str) -> Result<(), BoardError> {
        let session = ctx.session().await;
        tracing::debug!(sender = ctx.sender, flow = session.label(), "routing free text");

        let result = match &session {
            Session::Idle | Session::AwaitingSubmission => {
                commands::submit::handle_submission(ctx, text).await
            }
            Session::AwaitingComment(id) => {
                commands::comment::handle_text(ctx, id, text, Visibility::Public).await
            }
            Session::AwaitingPrivateMessage(id) => {
                commands::comment::handle_text(ctx, id, text, Visibility::Private).await
            }
            Session::AwaitingRejectionReason(id) => {
                commands::moderation::handle_rejection_reason(ctx, id, text).await
            }
            Session::AwaitingAdminMessage(target) => {
                commands::admin::handle_admin_message(ctx, target, text).await
            }
        };

        let keep = matches!(&result, Err(e) if e.keeps_session());
        if !keep && !session.is_idle() {
            self.board.state.lock().await.finish(ctx.sender, &session);
        }
        result
    }
}

/// Tells the user how their request failed. Store failures are also returned to the caller.
async fn report(ctx: &Context<'_>, result: Result<(), BoardError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(BoardError::Store(e)) => {
            tracing::error!(sender = ctx.sender, "store failure: {e:#}");
            ctx.reply(messages::INTERNAL_ERROR).await;
            Err(e)
        }
        Err(e) => {
            tracing::info!(sender = ctx.sender, "request failed: {e}");
            ctx.reply(&messages::error_reply(&e)).await;
            Ok(())
        }
    }
}
