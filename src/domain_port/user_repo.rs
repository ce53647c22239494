use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError>;
}
