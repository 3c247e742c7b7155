//! # Memory Store
//!
//! Process-local `Store` backend. Records are lost on restart.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::domain::traits::Store;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> anyhow::Result<Option<String>> {
        let guard = self.collections.lock().await;
        Ok(guard.get(collection).and_then(|c| c.get(key)).cloned())
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> anyhow::Result<()> {
        let mut guard = self.collections.lock().await;
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn compare_and_set(
        &self,
        collection: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> anyhow::Result<bool> {
        let mut guard = self.collections.lock().await;
        let records = guard.entry(collection.to_string()).or_default();
        if records.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        records.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<String>> {
        let guard = self.collections.lock().await;
        Ok(guard
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }
}
