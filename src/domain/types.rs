//! # Domain Types
//!
//! Records persisted by the board: users, submissions and comments.

use serde::{Deserialize, Serialize};

/// Lifecycle of a submission. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Pending,
    Approved,
    Rejected,
}

/// A user-authored text item subject to moderation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: String,
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub state: SubmissionState,
    /// Public sequence number, set exactly once on approval.
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    /// Message reference of the broadcast post.
    #[serde(default)]
    pub publish_ref: Option<String>,
    /// Moderator currently approving this submission.
    #[serde(default)]
    pub review_claim: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<i64>,
    pub created_at: i64,
}

impl Submission {
    pub fn pending(author: &str, text: String, hashtags: Vec<String>, created_at: i64) -> Self {
        Self {
            id: String::new(),
            author: author.to_string(),
            text,
            hashtags,
            state: SubmissionState::Pending,
            number: None,
            comment_count: 0,
            rejection_reason: None,
            publish_ref: None,
            review_claim: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at,
        }
    }

    /// Pending and not claimed by a moderator.
    pub fn is_reviewable(&self) -> bool {
        self.state == SubmissionState::Pending && self.review_claim.is_none()
    }

    /// Pending and either unclaimed or already claimed by `moderator`, whose interrupted
    /// approval may be retried.
    pub fn is_claimable_by(&self, moderator: &str) -> bool {
        self.state == SubmissionState::Pending
            && self.review_claim.as_deref().is_none_or(|c| c == moderator)
    }

    pub fn is_approved(&self) -> bool {
        self.state == SubmissionState::Approved
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    /// Relayed to the author only; never counted on the public post.
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub submission_id: String,
    pub author: String,
    pub text: String,
    pub visibility: Visibility,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Achievement {
    FirstWhisper,
    Regular,
    Storyteller,
    Legend,
    Chatterbox,
}

impl Achievement {
    /// Approved-submission thresholds, ascending.
    pub const APPROVAL_TIERS: [(u64, Achievement); 4] = [
        (1, Achievement::FirstWhisper),
        (5, Achievement::Regular),
        (10, Achievement::Storyteller),
        (25, Achievement::Legend),
    ];

    pub const CHATTERBOX_COMMENTS: u64 = 10;

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstWhisper => "First Whisper",
            Achievement::Regular => "Regular",
            Achievement::Storyteller => "Storyteller",
            Achievement::Legend => "Legend",
            Achievement::Chatterbox => "Chatterbox",
        }
    }
}

/// Created lazily on first interaction, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub submitted: u64,
    #[serde(default)]
    pub approved: u64,
    #[serde(default)]
    pub rejected: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    pub created_at: i64,
}

impl User {
    pub fn new(id: &str, created_at: i64) -> Self {
        Self {
            id: id.to_string(),
            handle: None,
            blocked: false,
            submitted: 0,
            approved: 0,
            rejected: 0,
            comments: 0,
            reputation: 0,
            achievements: Vec::new(),
            created_at,
        }
    }

    /// Records every achievement the counters now qualify for and returns the new ones.
    pub fn unlock_achievements(&mut self) -> Vec<Achievement> {
        let mut unlocked = Vec::new();
        for (threshold, achievement) in Achievement::APPROVAL_TIERS {
            if self.approved >= threshold && !self.achievements.contains(&achievement) {
                unlocked.push(achievement);
            }
        }
        if self.comments >= Achievement::CHATTERBOX_COMMENTS
            && !self.achievements.contains(&Achievement::Chatterbox)
        {
            unlocked.push(Achievement::Chatterbox);
        }
        self.achievements.extend(unlocked.iter().copied());
        unlocked
    }
}
