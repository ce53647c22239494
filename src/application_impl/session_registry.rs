use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::SessionStore;
use crate::logger::*;
use std::sync::Arc;

/// Active `session_id -> user` bindings. A session that is not here is not
/// logged in, whatever the state of its tokens.
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        SessionRegistry { store }
    }

    pub async fn create(&self, session: &Session) -> Result<(), AuthError> {
        self.store.upsert(session).await?;
        debug!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            expires_at = %session.expires_at,
            "session stored"
        );
        Ok(())
    }

    pub async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError> {
        self.store.get(session_id).await
    }

    pub async fn get_all_for_user(&self, user_id: UserId) -> Result<Vec<Session>, AuthError> {
        self.store.list_for_user(user_id).await
    }

    pub async fn exists(&self, session_id: SessionId) -> Result<bool, AuthError> {
        Ok(self.store.get(session_id).await?.is_some())
    }

    pub async fn revoke(&self, session_id: SessionId) -> Result<(), AuthError> {
        self.store.remove(session_id).await?;
        info!(session_id = %session_id, "session revoked");
        Ok(())
    }

    pub async fn revoke_all(&self, user_id: UserId) -> Result<u64, AuthError> {
        let revoked = self.store.remove_all_for_user(user_id).await?;
        info!(user_id = %user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemorySessionStore;
    use chrono::{Duration, Utc};

    fn session_for(user_id: UserId, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            session_id: SessionId::new_random(),
            user_id,
            email: "ada@example.com".into(),
            role: Role::User,
            ip: "127.0.0.1".into(),
            user_agent: "test".into(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemorySessionStore::new()))
    }

    #[tokio::test]
    async fn create_is_an_upsert() {
        let registry = registry();
        let user_id = UserId(uuid::Uuid::new_v4());
        let mut session = session_for(user_id, Duration::days(1));

        registry.create(&session).await.unwrap();
        session.expires_at = session.expires_at + Duration::days(1);
        registry.create(&session).await.unwrap();

        let sessions = registry.get_all_for_user(user_id).await.unwrap();
        assert_eq!(sessions, vec![session.clone()]);
        assert_eq!(
            registry.get(session.session_id).await.unwrap(),
            Some(session)
        );
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let registry = registry();
        let session = session_for(UserId(uuid::Uuid::new_v4()), Duration::days(1));
        registry.create(&session).await.unwrap();

        registry.revoke(session.session_id).await.unwrap();
        registry.revoke(session.session_id).await.unwrap();

        assert!(!registry.exists(session.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_only_touches_one_user() {
        let registry = registry();
        let alice = UserId(uuid::Uuid::new_v4());
        let bob = UserId(uuid::Uuid::new_v4());
        for _ in 0..3 {
            registry
                .create(&session_for(alice, Duration::days(1)))
                .await
                .unwrap();
        }
        let bobs = session_for(bob, Duration::days(1));
        registry.create(&bobs).await.unwrap();

        assert_eq!(registry.revoke_all(alice).await.unwrap(), 3);
        assert_eq!(registry.revoke_all(alice).await.unwrap(), 0);
        assert!(registry.get_all_for_user(alice).await.unwrap().is_empty());
        assert!(registry.exists(bobs.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn expired_sessions_do_not_exist() {
        let registry = registry();
        let session = session_for(UserId(uuid::Uuid::new_v4()), Duration::seconds(-1));
        registry.create(&session).await.unwrap();

        assert!(!registry.exists(session.session_id).await.unwrap());
        assert!(
            registry
                .get_all_for_user(session.user_id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
