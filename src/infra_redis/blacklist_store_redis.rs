use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// One key per revoked token id. Redis drops the key when the token would
/// have expired anyway.
pub struct RedisBlacklistStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisBlacklistStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisBlacklistStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, token_id: &TokenId) -> String {
        format!("{}:blacklist:{}", self.prefix, token_id)
    }
}

#[async_trait::async_trait]
impl BlacklistStore for RedisBlacklistStore {
    async fn insert(&self, entry: &BlacklistEntry) -> Result<(), AuthError> {
        let ttl_ms = (entry.expires_at - Utc::now()).num_milliseconds();
        if ttl_ms <= 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(self.key(&entry.token_id), 1u8, ttl_ms as u64)
            .await
            .map_err(|e| AuthError::Store(format!("blacklist token: {e}")))?;
        Ok(())
    }

    async fn contains(&self, token_id: &TokenId) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        conn.exists(self.key(token_id))
            .await
            .map_err(|e| AuthError::Store(format!("check blacklist: {e}")))
    }
}
