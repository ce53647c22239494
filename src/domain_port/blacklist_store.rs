use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Stores the entry until its `expires_at`, after which it must disappear.
    async fn insert(&self, entry: &BlacklistEntry) -> Result<(), AuthError>;

    async fn contains(&self, token_id: &TokenId) -> Result<bool, AuthError>;
}
