//! # Domain Traits
//!
//! Abstract interfaces for the collaborators the board talks to (chat transport, broadcast
//! channel, record store, clock). Implemented in the Infrastructure layer.

use async_trait::async_trait;

use crate::domain::events::Control;

/// Direct delivery to a user or a room.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message, optionally with action controls attached.
    async fn send(&self, recipient: &str, text: &str, controls: &[Control]) -> Result<(), String>;
}

/// Posts approved content to the broadcast channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create a post and return its message reference.
    async fn post(&self, channel: &str, text: &str, controls: &[Control]) -> Result<String, String>;

    /// Replace the controls of an existing post. The body is passed again for transports
    /// whose edits replace the whole message.
    async fn update_controls(
        &self,
        channel: &str,
        message_ref: &str,
        text: &str,
        controls: &[Control],
    ) -> Result<(), String>;
}

/// Document store with a single-record compare-and-set primitive.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, collection: &str, key: &str, value: &str) -> anyhow::Result<()>;

    /// Writes `value` only if the stored record equals `expected` (`None` = absent).
    /// Returns `false` when another writer got there first.
    async fn compare_and_set(
        &self,
        collection: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> anyhow::Result<bool>;

    /// All records of a collection.
    async fn list(&self, collection: &str) -> anyhow::Result<Vec<String>>;
}

/// Source of Unix-millisecond timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}
