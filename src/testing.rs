//! # Test Doubles
//!
//! In-process stand-ins for the transport, publisher, store and clock, plus a fully wired
//! board for handler and scenario tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::Board;
use crate::domain::config::AppConfig;
use crate::domain::events::Control;
use crate::domain::traits::{Clock, Publisher, Store, Transport};
use crate::domain::types::Submission;
use crate::infrastructure::store::memory::MemoryStore;

/// Records every message per recipient. Recipients marked with `fail_for` are unreachable.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<HashMap<String, Vec<(String, Vec<Control>)>>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    pub fn texts_to(&self, recipient: &str) -> Vec<String> {
        self.messages_to(recipient)
            .into_iter()
            .map(|(text, _)| text)
            .collect()
    }

    pub fn controls_to(&self, recipient: &str) -> Vec<Vec<Control>> {
        self.messages_to(recipient)
            .into_iter()
            .map(|(_, controls)| controls)
            .collect()
    }

    fn messages_to(&self, recipient: &str) -> Vec<(String, Vec<Control>)> {
        self.sent
            .lock()
            .unwrap()
            .get(recipient)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, recipient: &str, text: &str, controls: &[Control]) -> Result<(), String> {
        if self.failing.lock().unwrap().contains(recipient) {
            return Err("recipient unreachable".to_string());
        }
        self.sent
            .lock()
            .unwrap()
            .entry(recipient.to_string())
            .or_default()
            .push((text.to_string(), controls.to_vec()));
        Ok(())
    }
}

/// Records channel posts and control edits, with switchable failures.
#[derive(Default)]
pub struct RecordingPublisher {
    posts: Mutex<Vec<String>>,
    edits: Mutex<Vec<(String, Vec<Control>)>>,
    fail_posts: AtomicBool,
    fail_edits: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    /// Bodies of successful posts, in order.
    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }

    /// `(message_ref, controls)` of successful edits, in order.
    pub fn edits(&self) -> Vec<(String, Vec<Control>)> {
        self.edits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn post(&self, _channel: &str, text: &str, _controls: &[Control]) -> Result<String, String> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err("channel unavailable".to_string());
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(text.to_string());
        Ok(format!("$post{}", posts.len()))
    }

    async fn update_controls(
        &self,
        _channel: &str,
        message_ref: &str,
        _text: &str,
        controls: &[Control],
    ) -> Result<(), String> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err("edit refused".to_string());
        }
        self.edits
            .lock()
            .unwrap()
            .push((message_ref.to_string(), controls.to_vec()));
        Ok(())
    }
}

/// Wraps a `MemoryStore` and makes the first `n` compare-and-set calls lose.
pub struct ConflictingStore {
    inner: MemoryStore,
    remaining: AtomicU32,
    served: AtomicU32,
    only: Option<&'static str>,
}

impl ConflictingStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining: AtomicU32::new(conflicts),
            served: AtomicU32::new(0),
            only: None,
        }
    }

    /// Conflicts only on writes to `collection`.
    pub fn on_collection(collection: &'static str, conflicts: u32) -> Self {
        Self {
            only: Some(collection),
            ..Self::new(conflicts)
        }
    }

    pub fn conflicts_served(&self) -> u32 {
        self.served.load(Ordering::SeqCst)
    }

    pub fn stop_conflicts(&self) {
        self.remaining.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for ConflictingStore {
    async fn get(&self, collection: &str, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(collection, key).await
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(collection, key, value).await
    }

    async fn compare_and_set(
        &self,
        collection: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> anyhow::Result<bool> {
        let targeted = self.only.is_none_or(|c| c == collection);
        let conflict = targeted
            && self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflict {
            self.served.fetch_add(1, Ordering::SeqCst);
            return Ok(false);
        }
        self.inner
            .compare_and_set(collection, key, expected, value)
            .await
    }

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<String>> {
        self.inner.list(collection).await
    }
}

/// Wraps a `MemoryStore` and makes one compare-and-set on `collection` fail with an error,
/// after `healthy` successful ones.
pub struct FailingStore {
    inner: MemoryStore,
    collection: &'static str,
    healthy: AtomicU32,
    armed: AtomicBool,
}

impl FailingStore {
    pub fn new(collection: &'static str, healthy: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            collection,
            healthy: AtomicU32::new(healthy),
            armed: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn get(&self, collection: &str, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(collection, key).await
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(collection, key, value).await
    }

    async fn compare_and_set(
        &self,
        collection: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> anyhow::Result<bool> {
        if collection == self.collection
            && self
                .healthy
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            && self.armed.swap(false, Ordering::SeqCst)
        {
            anyhow::bail!("store unavailable");
        }
        self.inner
            .compare_and_set(collection, key, expected, value)
            .await
    }

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<String>> {
        self.inner.list(collection).await
    }
}

pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub const TEST_CONFIG: &str = r#"
services:
  matrix:
    homeserver: "https://matrix.example.org"
    username: "murmur"
board:
  channel: "!channel:x"
  bot_handle: "@murmur:x"
  admins: ["@admin:x", "@admin2:x"]
policy:
  allocator_retries: 64
"#;

pub fn test_config() -> AppConfig {
    AppConfig::from_yaml(TEST_CONFIG).unwrap()
}

pub struct TestBoard {
    pub board: Arc<Board>,
    pub transport: Arc<RecordingTransport>,
    pub publisher: Arc<RecordingPublisher>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

pub async fn test_board() -> TestBoard {
    test_board_with(test_config()).await
}

/// A board over an arbitrary store, for failure-injection tests.
pub fn board_on(store: Arc<dyn Store>) -> (Arc<Board>, Arc<RecordingTransport>, Arc<RecordingPublisher>) {
    let transport = Arc::new(RecordingTransport::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let board = Arc::new(Board::new(
        test_config(),
        store,
        transport.clone(),
        publisher.clone(),
        Arc::new(ManualClock::new(1_700_000_000_000)),
    ));
    (board, transport, publisher)
}

pub async fn test_board_with(config: AppConfig) -> TestBoard {
    let transport = Arc::new(RecordingTransport::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let store = Arc::new(MemoryStore::new());
    let board = Arc::new(Board::new(
        config,
        store.clone(),
        transport.clone(),
        publisher.clone(),
        clock.clone(),
    ));
    TestBoard {
        board,
        transport,
        publisher,
        clock,
        store,
    }
}

/// Submits and approves a post by `author`.
pub async fn approved_post(board: &Board, author: &str, text: &str) -> Submission {
    let submission = board.submissions.submit(author, text).await.unwrap();
    board
        .submissions
        .approve(&submission.id, "@admin:x")
        .await
        .unwrap()
}
