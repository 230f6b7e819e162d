//! Refresh-token bookkeeping and access-token revocation.
//!
//! Keys: `refresh:{username}` holds the current refresh token;
//! `blacklist:{sha256(token)}` marks a revoked access token. Both expire
//! with the token they describe.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::MultiplexedConnection, Client};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

pub type TokenStoreResult<T> = Result<T, TokenStoreError>;

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save_refresh(&self, username: &str, token: &str, ttl: Duration) -> TokenStoreResult<()>;
    async fn find_refresh(&self, username: &str) -> TokenStoreResult<Option<String>>;
    /// Removes and returns the stored refresh token in one step, so two
    /// callers presenting the same token cannot both see it.
    async fn take_refresh(&self, username: &str) -> TokenStoreResult<Option<String>>;
    async fn delete_refresh(&self, username: &str) -> TokenStoreResult<()>;
    async fn blacklist(&self, token: &str, ttl: Duration) -> TokenStoreResult<()>;
    async fn is_blacklisted(&self, token: &str) -> TokenStoreResult<bool>;
}

pub fn refresh_key(username: &str) -> String {
    format!("refresh:{username}")
}

pub fn blacklist_key(token: &str) -> String {
    format!("blacklist:{}", hex::encode(Sha256::digest(token.as_bytes())))
}

// ---------------- Redis ----------------

#[derive(Clone)]
pub struct RedisTokenStore {
    client: Client,
}

impl RedisTokenStore {
    pub fn new(url: &str) -> TokenStoreResult<Self> {
        let client = Client::open(url).map_err(|e| TokenStoreError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }

    async fn conn(&self) -> TokenStoreResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TokenStoreError::Unavailable(e.to_string()))
    }
}

fn redis_err(e: redis::RedisError) -> TokenStoreError {
    TokenStoreError::Unavailable(e.to_string())
}

// SETEX rejects 0
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn save_refresh(&self, username: &str, token: &str, ttl: Duration) -> TokenStoreResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("SETEX")
            .arg(refresh_key(username))
            .arg(ttl_secs(ttl))
            .arg(token)
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn find_refresh(&self, username: &str) -> TokenStoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        redis::cmd("GET")
            .arg(refresh_key(username))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn take_refresh(&self, username: &str) -> TokenStoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        redis::cmd("GETDEL")
            .arg(refresh_key(username))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn delete_refresh(&self, username: &str) -> TokenStoreResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("DEL")
            .arg(refresh_key(username))
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn blacklist(&self, token: &str, ttl: Duration) -> TokenStoreResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("SETEX")
            .arg(blacklist_key(token))
            .arg(ttl_secs(ttl))
            .arg("logout")
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn is_blacklisted(&self, token: &str) -> TokenStoreResult<bool> {
        let mut conn = self.conn().await?;
        redis::cmd("EXISTS")
            .arg(blacklist_key(token))
            .query_async::<bool>(&mut conn)
            .await
            .map_err(redis_err)
    }
}

// ---------------- in-memory ----------------

/// Process-local store with per-entry deadlines. Every write sweeps expired
/// entries; reads drop the key they find expired.
#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    entries: Arc<DashMap<String, (String, Instant)>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, key: String, value: String, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, (_, deadline)| *deadline > now);
        self.entries.insert(key, (value, now + ttl));
    }

    fn get_live(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let live = self.entries.get(key).and_then(|e| (e.1 > now).then(|| e.0.clone()));
        if live.is_none() {
            // a fresh value written since the read stays
            self.entries.remove_if(key, |_, (_, deadline)| *deadline <= now);
        }
        live
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn save_refresh(&self, username: &str, token: &str, ttl: Duration) -> TokenStoreResult<()> {
        self.put(refresh_key(username), token.to_string(), ttl);
        Ok(())
    }

    async fn find_refresh(&self, username: &str) -> TokenStoreResult<Option<String>> {
        Ok(self.get_live(&refresh_key(username)))
    }

    async fn take_refresh(&self, username: &str) -> TokenStoreResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(&refresh_key(username))
            .and_then(|(_, (token, deadline))| (deadline > now).then_some(token)))
    }

    async fn delete_refresh(&self, username: &str) -> TokenStoreResult<()> {
        self.entries.remove(&refresh_key(username));
        Ok(())
    }

    async fn blacklist(&self, token: &str, ttl: Duration) -> TokenStoreResult<()> {
        self.put(blacklist_key(token), "logout".into(), ttl);
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> TokenStoreResult<bool> {
        Ok(self.get_live(&blacklist_key(token)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refresh_entries_expire() {
        let store = InMemoryTokenStore::new();
        store.save_refresh("alice", "rt", Duration::from_millis(20)).await.unwrap();
        assert_eq!(store.find_refresh("alice").await.unwrap().as_deref(), Some("rt"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.find_refresh("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blacklist_is_keyed_by_digest() {
        let store = InMemoryTokenStore::new();
        store.blacklist("abc.def.ghi", Duration::from_secs(60)).await.unwrap();
        assert!(store.is_blacklisted("abc.def.ghi").await.unwrap());
        assert!(!store.is_blacklisted("abc.def.ghj").await.unwrap());
        assert!(blacklist_key("abc.def.ghi").starts_with("blacklist:"));
        assert_eq!(blacklist_key("x").len(), "blacklist:".len() + 64);
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let store = InMemoryTokenStore::new();
        for i in 0..1000 {
            store.blacklist(&format!("token-{i}"), Duration::from_millis(1)).await.unwrap();
            store.save_refresh(&format!("user-{i}"), "rt", Duration::from_millis(1)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.save_refresh("alice", "rt", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_refresh("alice").await.unwrap().as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn take_refresh_hands_the_token_out_once() {
        let store = InMemoryTokenStore::new();
        store.save_refresh("alice", "rt", Duration::from_secs(60)).await.unwrap();
        let (a, b) = tokio::join!(store.take_refresh("alice"), store.take_refresh("alice"));
        let winners = [a.unwrap(), b.unwrap()].into_iter().flatten().count();
        assert_eq!(winners, 1);
        assert!(store.find_refresh("alice").await.unwrap().is_none());

        store.save_refresh("bob", "rt", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.take_refresh("bob").await.unwrap().is_none());
    }
}
