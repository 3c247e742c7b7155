//! # Command Handlers
//!
//! Contains specific handler functions for each supported command and action
//! (e.g., .start, .submit, .pending, approve). These handlers are invoked by the Router.

pub mod admin;
pub mod comment;
pub mod moderation;
pub mod start;
pub mod submit;

use crate::application::Board;
use crate::application::state::Session;
use crate::domain::error::{BoardError, Result};
use crate::domain::events::Control;

/// The board plus who is asking and where to answer.
pub struct Context<'a> {
    pub board: &'a Board,
    pub sender: &'a str,
    pub reply_to: &'a str,
}

impl<'a> Context<'a> {
    pub fn new(board: &'a Board, sender: &'a str, reply_to: &'a str) -> Self {
        Self {
            board,
            sender,
            reply_to,
        }
    }

    /// Delivery failures are logged by the fanout and otherwise ignored.
    pub async fn reply(&self, text: &str) {
        self.reply_with(text, &[]).await;
    }

    pub async fn reply_with(&self, text: &str, controls: &[Control]) {
        let _ = self
            .board
            .fanout
            .notify_one(self.reply_to, text, controls)
            .await;
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.board.is_admin(self.sender) {
            Ok(())
        } else {
            tracing::warn!(sender = self.sender, "non-admin attempted a moderator action");
            Err(BoardError::Unauthorized(format!(
                "{} is not a moderator",
                self.sender
            )))
        }
    }

    pub async fn session(&self) -> Session {
        let now = self.board.now();
        self.board.state.lock().await.session(self.sender, now)
    }

    /// Puts the sender into `session`, discarding whatever flow was pending.
    pub async fn start_session(&self, session: Session) {
        let now = self.board.now();
        let label = session.label();
        let replaced = self.board.state.lock().await.start(self.sender, session, now);
        if let Some(previous) = replaced.filter(|p| !p.is_idle()) {
            tracing::debug!(
                sender = self.sender,
                from = previous.label(),
                to = label,
                "replacing pending flow"
            );
        }
    }
}
