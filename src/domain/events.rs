//! # Inbound Events & Actions
//!
//! The three event shapes the router consumes, and the typed action carried by button presses.
//! Raw chat text is decoded into these once, at the transport boundary.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::BoardError;

/// Prefix that marks a button press in plain-text transports.
pub const ACTION_PREFIX: &str = ".do";

/// A control action keyed by the entity it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Approve(String),
    Reject(String),
    /// Moderator writes to the author of a submission.
    MessageAuthor(String),
    Comment(String),
    Private(String),
    Cancel,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Approve(_) => "approve",
            Action::Reject(_) => "reject",
            Action::MessageAuthor(_) => "message",
            Action::Comment(_) => "comment",
            Action::Private(_) => "private",
            Action::Cancel => "cancel",
        }
    }

    /// Whether only moderators may trigger this action.
    pub fn is_moderation(&self) -> bool {
        matches!(
            self,
            Action::Approve(_) | Action::Reject(_) | Action::MessageAuthor(_)
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Approve(id)
            | Action::Reject(id)
            | Action::MessageAuthor(id)
            | Action::Comment(id)
            | Action::Private(id) => write!(f, "{}:{}", self.kind(), id),
            Action::Cancel => f.write_str("cancel"),
        }
    }
}

impl FromStr for Action {
    type Err = BoardError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token == "cancel" {
            return Ok(Action::Cancel);
        }
        let (kind, id) = token
            .split_once(':')
            .ok_or_else(|| BoardError::Validation(format!("malformed action `{token}`")))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(BoardError::Validation(format!("action `{kind}` needs an id")));
        }
        let id = id.to_string();
        match kind {
            "approve" => Ok(Action::Approve(id)),
            "reject" => Ok(Action::Reject(id)),
            "message" => Ok(Action::MessageAuthor(id)),
            "comment" => Ok(Action::Comment(id)),
            "private" => Ok(Action::Private(id)),
            _ => Err(BoardError::Validation(format!("unknown action `{kind}`"))),
        }
    }
}

/// A labelled control attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub label: String,
    pub action: Action,
}

impl Control {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        name: String,
        arg: Option<String>,
        from: String,
        chat: String,
    },
    FreeText {
        text: String,
        from: String,
        chat: String,
    },
    ButtonPress {
        action: Action,
        from: String,
        message_ref: Option<String>,
    },
}

impl InboundEvent {
    /// Decodes a raw chat message. `.do <token>` is a button press, `.<name> [arg]` a command,
    /// anything else free text. A malformed action token stays a `do` command so the router
    /// can report it.
    pub fn decode(body: &str, from: &str, chat: &str, message_ref: Option<String>) -> Self {
        let msg = body.trim();
        let Some(rest) = msg.strip_prefix('.') else {
            return InboundEvent::FreeText {
                text: msg.to_string(),
                from: from.to_string(),
                chat: chat.to_string(),
            };
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        if !name.starts_with(|c: char| c.is_alphanumeric()) {
            return InboundEvent::FreeText {
                text: msg.to_string(),
                from: from.to_string(),
                chat: chat.to_string(),
            };
        }

        if name == ACTION_PREFIX.trim_start_matches('.') {
            if let Some(Ok(action)) = arg.map(Action::from_str) {
                return InboundEvent::ButtonPress {
                    action,
                    from: from.to_string(),
                    message_ref,
                };
            }
        }

        InboundEvent::Command {
            name: name.to_lowercase(),
            arg: arg.map(str::to_string),
            from: from.to_string(),
            chat: chat.to_string(),
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            InboundEvent::Command { from, .. }
            | InboundEvent::FreeText { from, .. }
            | InboundEvent::ButtonPress { from, .. } => from,
        }
    }
}
