//! # Messages
//!
//! Constant strings and format functions for user-facing messages: replies, review cards,
//! channel posts and notifications.

use crate::domain::error::BoardError;
use crate::domain::types::{Achievement, Submission, User};

pub const AUTH_DENIED: &str = "🚫 **Authorization Denied**.";
pub const UNKNOWN_COMMAND: &str = "❓ Unknown command. Try `.help`.";
pub const INTERNAL_ERROR: &str = "❌ Something went wrong on our side. Please try again later.";

pub const SUBMIT_PROMPT: &str = "📝 Send the text you want to share. It stays anonymous.";
pub const SUBMISSION_RECEIVED: &str = "✅ Thanks! Your submission is waiting for review.";
pub const SESSION_CANCELLED: &str = "❌ Cancelled.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
pub const REJECTION_REASON_PROMPT: &str = "✍️ Send the reason for rejecting this submission.";
pub const ADMIN_MESSAGE_PROMPT: &str = "✉️ Send the message for this user.";
pub const ADMIN_MESSAGE_SENT: &str = "📨 Message delivered.";
pub const COMMENT_ADDED: &str = "💬 Comment posted.";
pub const PRIVATE_SENT: &str = "📨 Your message was passed on anonymously.";
pub const NO_PENDING: &str = "🎉 No submissions waiting for review.";
pub const NOTHING_UNPUBLISHED: &str = "All approved submissions are in the channel.";
pub const BLOCKED_NOTICE: &str = "🚫 You can no longer post here.";
pub const MSG_USAGE: &str = "Usage: `.msg <user>`";
pub const BLOCK_USAGE: &str = "Usage: `.block <user>` / `.unblock <user>`";
pub const REPUBLISH_USAGE: &str = "Usage: `.republish <number>`";
pub const RELEASE_USAGE: &str = "Usage: `.release <submission id>`";
pub const UNKNOWN_DEEP_LINK: &str = "That link is not valid anymore.";

pub fn welcome(menu: &[&str]) -> String {
    format!(
        "👋 **Welcome to Murmur.**\nShare something anonymously: just send it.\n\nMenu: {}",
        menu.join(" · ")
    )
}

pub fn review_card(submission: &Submission) -> String {
    let mut card = format!(
        "🆕 **New submission** `{}`\n\n{}",
        submission.id, submission.text
    );
    if !submission.hashtags.is_empty() {
        card.push_str(&format!("\n\nTags: {}", submission.hashtags.join(" ")));
    }
    if let Some(moderator) = &submission.review_claim {
        card.push_str(&format!("\n\n_Under review by {moderator}_"));
    }
    card
}

/// Body of the broadcast post. Always carries `#<number>`.
pub fn channel_post(number: u64, submission: &Submission, bot_handle: &str) -> String {
    format!(
        "**#{}**\n\n{}\n\n💬 {}",
        number,
        submission.text,
        deep_link(bot_handle, &format!("comment_{}", submission.id))
    )
}

pub fn comment_label(count: u64) -> String {
    format!("💬 Comment ({count})")
}

pub fn deep_link(bot_handle: &str, arg: &str) -> String {
    if bot_handle.is_empty() {
        return format!("`.start {arg}`");
    }
    format!("https://matrix.to/#/{bot_handle} (`.start {arg}`)")
}

pub fn approved_notice(number: u64) -> String {
    format!("🎉 Your submission was approved and published as **#{number}**.")
}

pub fn approved_ack(number: u64) -> String {
    format!("✅ Approved as **#{number}**.")
}

pub fn rejected_notice(reason: &str) -> String {
    format!("🙅 Your submission was not approved.\n**Reason**: {reason}")
}

pub fn rejected_ack(id: &str) -> String {
    format!("🗑️ Submission `{id}` rejected.")
}

pub fn republished_ack(number: u64) -> String {
    format!("📢 **#{number}** is now in the channel.")
}

pub fn comment_prompt(number: u64) -> String {
    format!("💬 Send your comment for **#{number}**.")
}

pub fn private_prompt(number: u64) -> String {
    format!("✉️ Send your private message to the author of **#{number}**. They won't see who you are.")
}

pub fn comment_notice(number: u64, text: &str) -> String {
    format!("💬 New comment on **#{number}**:\n\n{text}")
}

pub fn private_notice(number: u64, text: &str) -> String {
    format!("✉️ Private message about **#{number}**:\n\n{text}")
}

pub fn admin_message(text: &str) -> String {
    format!("📣 **Message from the moderators**:\n\n{text}")
}

pub fn achievement_unlocked(achievement: Achievement) -> String {
    format!("🏆 Achievement unlocked: **{}**", achievement.title())
}

pub fn profile(user: &User) -> String {
    let achievements = if user.achievements.is_empty() {
        "none yet".to_string()
    } else {
        user.achievements
            .iter()
            .map(|a| a.title())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "**👤 Your profile**\n**Submitted**: {}\n**Approved**: {}\n**Rejected**: {}\n**Comments**: {}\n**Reputation**: {}\n**Achievements**: {}",
        user.submitted, user.approved, user.rejected, user.comments, user.reputation, achievements
    )
}

pub fn stats(pending: usize, approved: usize, rejected: usize, last_number: u64, sessions: usize) -> String {
    format!(
        "**📊 Board**\n**Pending**: {pending}\n**Approved**: {approved}\n**Rejected**: {rejected}\n**Last number**: #{last_number}\n**Open flows**: {sessions}"
    )
}

pub fn unpublished(entries: &[(u64, String)]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .map(|(number, id)| format!("* #{number} (`{id}`)"))
        .collect();
    format!("**⚠️ Approved but not in the channel**\n{}", lines.join("\n"))
}

pub fn claim_released(id: &str, reserved: Option<u64>) -> String {
    match reserved {
        Some(number) => format!(
            "🔓 `{id}` is open for review again. Approving it will reuse **#{number}**."
        ),
        None => format!("🔓 `{id}` is open for review again."),
    }
}

pub fn block_changed(user: &str, blocked: bool) -> String {
    if blocked {
        format!("🚫 {user} is blocked.")
    } else {
        format!("✅ {user} is unblocked.")
    }
}

fn seconds(ms: i64) -> i64 {
    (ms.max(0) + 999) / 1000
}

/// User-facing text for a failed operation.
pub fn error_reply(err: &BoardError) -> String {
    match err {
        BoardError::Validation(msg) => format!("⚠️ {msg}. Please try again."),
        BoardError::CooldownActive { remaining_ms } => format!(
            "⏳ Please wait {}s before submitting again.",
            seconds(*remaining_ms)
        ),
        BoardError::RateLimited { retry_after_ms } => format!(
            "⏳ Slow down, you can comment again in {}s.",
            seconds(*retry_after_ms)
        ),
        BoardError::NotFound(what) => format!("❓ {what} not found or already handled."),
        BoardError::Unauthorized(_) => AUTH_DENIED.to_string(),
        BoardError::AllocationFailed { .. } => {
            "❌ Could not assign a number right now. The submission is still pending, please approve it again.".to_string()
        }
        BoardError::DeliveryFailed { reason, .. } => {
            format!("⚠️ The message could not be delivered: {reason}")
        }
        BoardError::PublishFailed { number, reason } => format!(
            "⚠️ Approved as **#{number}** but the channel post failed: {reason}\nUse `.republish {number}` to retry."
        ),
        BoardError::Store(_) => INTERNAL_ERROR.to_string(),
    }
}
