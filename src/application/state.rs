//! # Bot State
//!
//! Per-user conversation sessions. Each user holds exactly one `Session` slot, so being in
//! two flows at once is unrepresentable: starting a flow overwrites whatever was pending.
//! Sessions are process-local and deliberately not persisted.

use std::collections::HashMap;

/// The multi-step flow waiting for a user's next free-text message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Idle,
    AwaitingSubmission,
    AwaitingComment(String),
    AwaitingPrivateMessage(String),
    AwaitingRejectionReason(String),
    /// Moderator writing to a user.
    AwaitingAdminMessage(String),
}

impl Session {
    pub fn is_idle(&self) -> bool {
        matches!(self, Session::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Session::Idle => "idle",
            Session::AwaitingSubmission => "awaiting-submission",
            Session::AwaitingComment(_) => "awaiting-comment",
            Session::AwaitingPrivateMessage(_) => "awaiting-private-message",
            Session::AwaitingRejectionReason(_) => "awaiting-rejection-reason",
            Session::AwaitingAdminMessage(_) => "awaiting-admin-message",
        }
    }
}

#[derive(Debug, Clone)]
struct SessionSlot {
    session: Session,
    started_at: i64,
}

/// Session slots keyed by user id.
#[derive(Debug, Default)]
pub struct BotState {
    sessions: HashMap<String, SessionSlot>,
    ttl_ms: Option<i64>,
}

impl BotState {
    pub fn new(ttl_secs: Option<u64>) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl_ms: ttl_secs.map(|s| (s as i64).saturating_mul(1000)),
        }
    }

    /// Current session of a user. Expired slots read as idle and are dropped.
    pub fn session(&mut self, user: &str, now: i64) -> Session {
        let expired = match (self.sessions.get(user), self.ttl_ms) {
            (None, _) => return Session::Idle,
            (Some(slot), Some(ttl)) => now - slot.started_at >= ttl,
            (Some(_), None) => false,
        };
        if expired {
            if let Some(slot) = self.sessions.remove(user) {
                tracing::debug!(user, flow = slot.session.label(), "session expired");
            }
            return Session::Idle;
        }
        self.sessions
            .get(user)
            .map(|slot| slot.session.clone())
            .unwrap_or_default()
    }

    /// Starts a flow, returning the pending one it replaced, if any.
    pub fn start(&mut self, user: &str, session: Session, now: i64) -> Option<Session> {
        if session.is_idle() {
            return self.sessions.remove(user).map(|s| s.session);
        }
        self.sessions
            .insert(
                user.to_string(),
                SessionSlot {
                    session,
                    started_at: now,
                },
            )
            .map(|s| s.session)
    }

    pub fn clear(&mut self, user: &str) -> Option<Session> {
        self.sessions.remove(user).map(|s| s.session)
    }

    /// Clears the slot only if it still holds `finished`, so a flow started meanwhile survives.
    pub fn finish(&mut self, user: &str, finished: &Session) {
        if self
            .sessions
            .get(user)
            .is_some_and(|slot| &slot.session == finished)
        {
            self.sessions.remove(user);
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
