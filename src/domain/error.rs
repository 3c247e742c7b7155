//! # Board Errors
//!
//! The failure taxonomy shared by every board operation.
//! Handlers decide from the variant whether the user can retry inside the same flow.

use thiserror::Error;

/// Errors raised by the board's domain operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Input outside policy bounds. The user can correct it and resend.
    #[error("validation error: {0}")]
    Validation(String),

    /// The same action was performed too recently.
    #[error("cooldown active, {remaining_ms}ms remaining")]
    CooldownActive { remaining_ms: i64 },

    /// Too many actions inside the sliding window.
    #[error("rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: i64 },

    /// Entity missing, or already in a terminal state.
    #[error("{0} not found")]
    NotFound(String),

    /// Caller is blocked or not on the moderator allow-list.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The counter transaction kept conflicting until the retry budget ran out.
    #[error("sequence allocation failed after {attempts} attempts")]
    AllocationFailed { attempts: u32 },

    /// A single recipient could not be reached.
    #[error("delivery to {recipient} failed: {reason}")]
    DeliveryFailed { recipient: String, reason: String },

    /// The number was assigned but the broadcast post was not created.
    #[error("publishing #{number} failed: {reason}")]
    PublishFailed { number: u64, reason: String },

    /// Backing store or serialization failure.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl BoardError {
    /// Whether a pending conversation flow should stay open after this error.
    pub fn keeps_session(&self) -> bool {
        matches!(
            self,
            BoardError::Validation(_)
                | BoardError::CooldownActive { .. }
                | BoardError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;
