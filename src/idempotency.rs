use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

/// A response recorded under an `Idempotency-Key`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

pub async fn redis_get(client: &redis::Client, key: &str) -> Option<StoredResponse> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(_) => return None,
    };
    let s: Option<String> = conn.get(key).await.ok();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

pub async fn redis_set(client: &redis::Client, key: &str, value: &StoredResponse, ttl_secs: u64) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn.set_ex(key, json, ttl_secs).await;
    }
}

/// Redis when configured, otherwise a process-local map. Both expire
/// entries after `ttl_secs`.
pub struct IdempotencyStore {
    redis: Option<redis::Client>,
    local: Mutex<HashMap<String, (Instant, StoredResponse)>>,
    ttl_secs: u64,
}

impl IdempotencyStore {
    pub fn new(redis: Option<redis::Client>, ttl_secs: u64) -> Self {
        Self {
            redis,
            local: Mutex::new(HashMap::new()),
            ttl_secs,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub async fn get(&self, key: &str) -> Option<StoredResponse> {
        match &self.redis {
            Some(client) => redis_get(client, key).await,
            None => {
                let mut local = self.local.lock().await;
                let fresh = local
                    .get(key)
                    .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl())
                    .map(|(_, value)| value.clone());
                if fresh.is_none() {
                    local.remove(key);
                }
                fresh
            }
        }
    }

    pub async fn put(&self, key: String, value: StoredResponse) {
        match &self.redis {
            Some(client) => redis_set(client, &key, &value, self.ttl_secs).await,
            None => {
                let ttl = self.ttl();
                let mut local = self.local.lock().await;
                local.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
                local.insert(key, (Instant::now(), value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn local_store_round_trips() {
        let store = IdempotencyStore::new(None, 60);
        assert!(store.get("k").await.is_none());
        let stored = StoredResponse {
            status: 200,
            body: json!({"progress": "submitted"}),
        };
        store.put("k".into(), stored.clone()).await;
        assert_eq!(store.get("k").await, Some(stored));
    }

    #[tokio::test]
    async fn local_entries_expire_after_ttl() {
        let store = IdempotencyStore::new(None, 0);
        let stored = StoredResponse {
            status: 200,
            body: json!({"progress": "advanced"}),
        };
        store.put("old".into(), stored.clone()).await;
        assert!(store.get("old").await.is_none());

        store.put("a".into(), stored.clone()).await;
        store.put("b".into(), stored).await;
        assert!(store.local.lock().await.len() <= 1);
    }
}
