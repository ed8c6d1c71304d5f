//  src/db/redis.rs

use std::{sync::Arc, time::Instant};
use redis::{
    aio::ConnectionManager,
    AsyncCommands, Client, FromRedisValue, RedisError, ToRedisArgs,
};
use serde::{de::DeserializeOwned, Serialize};

/// Thin, cheap-to-clone handle.
#[derive(Clone)]
pub struct RedisPool {
    manager: Arc<ConnectionManager>,
}

impl RedisPool {
    /// Build once at start-up and share through the series store.
    pub async fn new(url: &str) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager: Arc::new(manager),
        })
    }

    pub(crate) fn manager(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    // ─── Helpers ──────────────────────────────────────────────────────────────

    /// RPUSH one JSON-encoded value; returns the list length after the push.
    pub async fn push_json<K, T>(&self, key: K, value: &T) -> Result<usize, RedisError>
    where
        K: ToRedisArgs + Send + Sync,
        T: Serialize,
    {
        let mut con = self.manager().as_ref().clone();
        let payload = serde_json::to_string(value)
            .map_err(|e| RedisError::from((redis::ErrorKind::TypeError, "serde", e.to_string())))?;

        let started = Instant::now();
        let len: usize = con.rpush(key, payload).await?;
        log::debug!("redis RPUSH took {:?}", started.elapsed());
        Ok(len)
    }

    /// Whole list, decoded in insertion order.
    pub async fn range_json<K, T>(&self, key: K) -> Result<Vec<T>, RedisError>
    where
        K: ToRedisArgs + Send + Sync,
        T: DeserializeOwned,
    {
        let mut con = self.manager().as_ref().clone();
        let started = Instant::now();
        let raw: Vec<String> = con.lrange(key, 0, -1).await?;
        log::debug!("redis LRANGE took {:?}", started.elapsed());

        raw.iter()
            .map(|s| {
                serde_json::from_str(s).map_err(|e| {
                    RedisError::from((redis::ErrorKind::TypeError, "serde", e.to_string()))
                })
            })
            .collect()
    }

    pub async fn set_members<K, V>(&self, key: K) -> Result<Vec<V>, RedisError>
    where
        K: ToRedisArgs + Send + Sync,
        V: FromRedisValue,
    {
        let mut con = self.manager().as_ref().clone();
        con.smembers(key).await
    }

    /// DEL on every key; returns how many existed.
    pub async fn delete(&self, keys: &[String]) -> Result<usize, RedisError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.manager().as_ref().clone();
        con.del(keys.to_vec()).await
    }

    /// RPUSH onto `list` and SADD `member` to `index` in one MULTI/EXEC, so a
    /// list never exists without its index entry.
    pub async fn push_json_indexed<T, M>(
        &self,
        list: &str,
        value: &T,
        index: &str,
        member: M,
    ) -> Result<(), RedisError>
    where
        T: Serialize,
        M: ToRedisArgs,
    {
        let mut con = self.manager().as_ref().clone();
        let payload = serde_json::to_string(value)
            .map_err(|e| RedisError::from((redis::ErrorKind::TypeError, "serde", e.to_string())))?;

        let started = Instant::now();
        redis::pipe()
            .atomic()
            .rpush(list, payload)
            .ignore()
            .sadd(index, member)
            .ignore()
            .query_async::<_, ()>(&mut con)
            .await?;
        log::debug!("redis MULTI RPUSH+SADD took {:?}", started.elapsed());
        Ok(())
    }
}
