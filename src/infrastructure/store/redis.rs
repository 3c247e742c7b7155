//! # Redis Store
//!
//! `Store` backend on Redis. Each collection is one hash (`<prefix>:<collection>`);
//! compare-and-set runs as a Lua script so the check and the write are one atomic step.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::domain::traits::Store;

// ARGV: field, expect-absent flag, expected value, new value
const COMPARE_AND_SET: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if ARGV[2] == '1' then
  if current then return 0 end
elseif current ~= ARGV[3] then
  return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[4])
return 1
"#;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    cas: Script,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid redis url")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("Failed to connect to redis")?;
        tracing::info!("Connected to redis store (prefix '{}')", prefix);
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            cas: Script::new(COMPARE_AND_SET),
        })
    }

    fn hash_key(&self, collection: &str) -> String {
        format!("{}:{}", self.prefix, collection)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(self.hash_key(collection), key).await?;
        Ok(value)
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(self.hash_key(collection), key, value).await?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        collection: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool> {
        let mut conn = self.conn.clone();
        let swapped: i32 = self
            .cas
            .key(self.hash_key(collection))
            .arg(key)
            .arg(if expected.is_none() { "1" } else { "0" })
            .arg(expected.unwrap_or(""))
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.hvals(self.hash_key(collection)).await?;
        Ok(values)
    }
}
