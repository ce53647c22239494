use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{
    AsyncCommands, FromRedisValue, RedisError, RedisResult, RedisWrite, ToRedisArgs, Value,
};

/// Sessions as JSON values expiring with the session, plus a per-user index
/// set of session ids. Index members whose value is gone are pruned on read.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn session_key(&self, session_id: SessionId) -> String {
        format!("{}:session:{}", self.prefix, session_id)
    }

    fn index_key(&self, user_id: UserId) -> String {
        format!("{}:user_sessions:{}", self.prefix, user_id)
    }

    fn decode(raw: &str) -> Result<Session, AuthError> {
        serde_json::from_str(raw).map_err(|e| AuthError::Store(format!("decode session: {e}")))
    }
}

impl ToRedisArgs for SessionId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.to_string().as_bytes())
    }
}

impl FromRedisValue for SessionId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        let session_id = s.parse::<SessionId>().map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid SessionId string",
                e.to_string(),
            ))
        })?;
        Ok(session_id)
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn upsert(&self, session: &Session) -> Result<(), AuthError> {
        let key = self.session_key(session.session_id);
        let index = self.index_key(session.user_id);
        let ttl_ms = (session.expires_at - Utc::now()).num_milliseconds();
        let mut conn = self.conn.clone();

        if ttl_ms <= 0 {
            let _: () = redis::pipe()
                .atomic()
                .del(&key)
                .ignore()
                .srem(&index, session.session_id)
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(|e| AuthError::Store(format!("drop expired session: {e}")))?;
            return Ok(());
        }

        let value = serde_json::to_string(session)
            .map_err(|e| AuthError::Store(format!("encode session: {e}")))?;

        // The index lives as long as the longest session in it (Redis >= 7.0).
        let _: () = redis::pipe()
            .atomic()
            .pset_ex(&key, value, ttl_ms as u64)
            .ignore()
            .sadd(&index, session.session_id)
            .ignore()
            .cmd("PEXPIRE")
            .arg(&index)
            .arg(ttl_ms)
            .arg("NX")
            .ignore()
            .cmd("PEXPIRE")
            .arg(&index)
            .arg(ttl_ms)
            .arg("GT")
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::Store(format!("store session: {e}")))?;
        Ok(())
    }

    async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.session_key(session_id))
            .await
            .map_err(|e| AuthError::Store(format!("load session: {e}")))?;

        raw.as_deref().map(Self::decode).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>, AuthError> {
        let index = self.index_key(user_id);
        let mut conn = self.conn.clone();
        let ids: Vec<SessionId> = conn
            .smembers(&index)
            .await
            .map_err(|e| AuthError::Store(format!("load session index: {e}")))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.session_key(*id)).collect();
        let values: Vec<Option<String>> = conn
            .mget(&keys)
            .await
            .map_err(|e| AuthError::Store(format!("load sessions: {e}")))?;

        let mut sessions = Vec::with_capacity(values.len());
        let mut stale = Vec::new();
        for (id, value) in ids.into_iter().zip(values) {
            match value {
                Some(raw) => sessions.push(Self::decode(&raw)?),
                None => stale.push(id),
            }
        }

        if !stale.is_empty() {
            let _: () = conn
                .srem(&index, stale)
                .await
                .map_err(|e| AuthError::Store(format!("prune session index: {e}")))?;
        }

        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn remove(&self, session_id: SessionId) -> Result<(), AuthError> {
        let Some(session) = self.get(session_id).await? else {
            return Ok(());
        };

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(self.session_key(session_id))
            .ignore()
            .srem(self.index_key(session.user_id), session_id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::Store(format!("remove session: {e}")))?;
        Ok(())
    }

    async fn remove_all_for_user(&self, user_id: UserId) -> Result<u64, AuthError> {
        let index = self.index_key(user_id);
        let mut conn = self.conn.clone();
        let ids: Vec<SessionId> = conn
            .smembers(&index)
            .await
            .map_err(|e| AuthError::Store(format!("load session index: {e}")))?;
        if ids.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = ids.iter().map(|id| self.session_key(*id)).collect();
        let (removed, _): (u64, u64) = redis::pipe()
            .atomic()
            .del(&keys)
            .del(&index)
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::Store(format!("remove user sessions: {e}")))?;
        Ok(removed)
    }
}
