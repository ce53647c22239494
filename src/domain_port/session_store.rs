use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace by `session_id`.
    async fn upsert(&self, session: &Session) -> Result<(), AuthError>;

    async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError>;

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>, AuthError>;

    /// Removing an absent session is not an error.
    async fn remove(&self, session_id: SessionId) -> Result<(), AuthError>;

    async fn remove_all_for_user(&self, user_id: UserId) -> Result<u64, AuthError>;
}
