use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn upsert(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError> {
        let now = Utc::now();
        self.sessions
            .remove_if(&session_id, |_, session| session.is_expired_at(now));
        Ok(self
            .sessions
            .get(&session_id)
            .map(|session| session.value().clone()))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>, AuthError> {
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id && !entry.is_expired_at(now))
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|session| session.created_at);
        Ok(sessions)
    }

    async fn remove(&self, session_id: SessionId) -> Result<(), AuthError> {
        self.sessions.remove(&session_id);
        Ok(())
    }

    async fn remove_all_for_user(&self, user_id: UserId) -> Result<u64, AuthError> {
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = session.user_id != user_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
