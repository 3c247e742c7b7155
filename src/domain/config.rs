//! # Configuration
//!
//! Manages the loading and parsing of the board's configuration file (`config.yaml`).
//! Secrets and deployment-specific values can be overridden from the environment.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub services: ServicesConfig,
    pub board: BoardConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Configuration for the connected services.
#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Specific configuration for the Matrix service.
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixConfig {
    pub homeserver: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: Option<String>,
    /// Key prefix for shared backends.
    #[serde(default = "default_store_prefix")]
    pub prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            prefix: default_store_prefix(),
        }
    }
}

fn default_store_prefix() -> String {
    "murmur".to_string()
}

/// Where approved posts go and who moderates them.
#[derive(Debug, Deserialize, Clone)]
pub struct BoardConfig {
    /// Broadcast room id.
    pub channel: String,
    /// The bot's own user id, used in deep links.
    #[serde(default)]
    pub bot_handle: String,
    #[serde(default)]
    pub admins: Vec<String>,
    /// Key for deriving submission ids. Unset means a fresh key per process.
    #[serde(default)]
    pub id_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    #[serde(default)]
    pub submission: SubmissionPolicy,
    #[serde(default)]
    pub comment: CommentPolicy,
    #[serde(default = "default_allocator_retries")]
    pub allocator_retries: u32,
    /// Abandoned flows reset to idle after this long. `None` keeps them forever.
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,
    #[serde(default)]
    pub reputation: ReputationPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            submission: SubmissionPolicy::default(),
            comment: CommentPolicy::default(),
            allocator_retries: default_allocator_retries(),
            session_ttl_secs: None,
            reputation: ReputationPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubmissionPolicy {
    #[serde(default = "default_submission_min")]
    pub min_len: usize,
    #[serde(default = "default_submission_max")]
    pub max_len: usize,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            min_len: default_submission_min(),
            max_len: default_submission_max(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommentPolicy {
    #[serde(default = "default_comment_min")]
    pub min_len: usize,
    #[serde(default = "default_comment_max")]
    pub max_len: usize,
    /// Comments allowed per window.
    #[serde(default = "default_comment_limit")]
    pub limit: u32,
    #[serde(default = "default_comment_window_ms")]
    pub window_ms: i64,
}

impl Default for CommentPolicy {
    fn default() -> Self {
        Self {
            min_len: default_comment_min(),
            max_len: default_comment_max(),
            limit: default_comment_limit(),
            window_ms: default_comment_window_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReputationPolicy {
    #[serde(default = "default_approved_reputation")]
    pub approved: i64,
    #[serde(default = "default_comment_reputation")]
    pub comment: i64,
}

impl Default for ReputationPolicy {
    fn default() -> Self {
        Self {
            approved: default_approved_reputation(),
            comment: default_comment_reputation(),
        }
    }
}

fn default_submission_min() -> usize {
    5
}
fn default_submission_max() -> usize {
    1000
}
fn default_cooldown_ms() -> i64 {
    60_000
}
fn default_comment_min() -> usize {
    2
}
fn default_comment_max() -> usize {
    500
}
fn default_comment_limit() -> u32 {
    3
}
fn default_comment_window_ms() -> i64 {
    30_000
}
fn default_allocator_retries() -> u32 {
    16
}
fn default_approved_reputation() -> i64 {
    10
}
fn default_comment_reputation() -> i64 {
    1
}

impl AppConfig {
    /// Reads the YAML file, applies environment overrides and validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config.yaml")
    }

    /// Applies `MURMUR_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup("MURMUR_MATRIX_PASSWORD") {
            self.services.matrix.password = password;
        }
        if let Some(url) = lookup("MURMUR_STORE_URL") {
            self.services.store.url = Some(url);
        }
        if let Some(admins) = lookup("MURMUR_ADMINS") {
            self.board.admins = admins
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(channel) = lookup("MURMUR_CHANNEL") {
            self.board.channel = channel;
        }
        if let Some(handle) = lookup("MURMUR_BOT_HANDLE") {
            self.board.bot_handle = handle;
        }
        if let Some(secret) = lookup("MURMUR_ID_SECRET") {
            self.board.id_secret = Some(secret);
        }
        if let Some(v) = lookup("MURMUR_SUBMIT_COOLDOWN_MS") {
            self.policy.submission.cooldown_ms = parse_env("MURMUR_SUBMIT_COOLDOWN_MS", &v)?;
        }
        if let Some(v) = lookup("MURMUR_COMMENT_LIMIT") {
            self.policy.comment.limit = parse_env("MURMUR_COMMENT_LIMIT", &v)?;
        }
        if let Some(v) = lookup("MURMUR_COMMENT_WINDOW_MS") {
            self.policy.comment.window_ms = parse_env("MURMUR_COMMENT_WINDOW_MS", &v)?;
        }
        if let Some(v) = lookup("MURMUR_MIN_LEN") {
            self.policy.submission.min_len = parse_env("MURMUR_MIN_LEN", &v)?;
        }
        if let Some(v) = lookup("MURMUR_MAX_LEN") {
            self.policy.submission.max_len = parse_env("MURMUR_MAX_LEN", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let sub = &self.policy.submission;
        if sub.min_len > sub.max_len {
            bail!(
                "submission min_len ({}) exceeds max_len ({})",
                sub.min_len,
                sub.max_len
            );
        }
        let comment = &self.policy.comment;
        if comment.min_len > comment.max_len {
            bail!(
                "comment min_len ({}) exceeds max_len ({})",
                comment.min_len,
                comment.max_len
            );
        }
        if comment.limit == 0 {
            bail!("comment limit must be at least 1");
        }
        if self.policy.allocator_retries == 0 {
            bail!("allocator_retries must be at least 1");
        }
        if self.board.channel.trim().is_empty() {
            bail!("board.channel is required");
        }
        Ok(())
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.board
            .admins
            .iter()
            .any(|a| a.eq_ignore_ascii_case(user))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}"))
}
