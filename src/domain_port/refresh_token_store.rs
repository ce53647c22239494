use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Persistence for refresh-token metadata, keyed by token hash.
#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError>;

    async fn get(&self, token_hash: &TokenHash) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Atomically flips `used` from false to true on a non-revoked record.
    /// Returns `true` only for the single caller that performed the flip.
    async fn mark_used(&self, token_hash: &TokenHash) -> Result<bool, AuthError>;

    /// Marks every record of the family revoked. Idempotent.
    async fn revoke_family(&self, family_id: FamilyId) -> Result<(), AuthError>;

    /// Revokes every not-yet-revoked record owned by the user and returns
    /// how many records changed.
    async fn revoke_user(&self, user_id: UserId) -> Result<u64, AuthError>;

    /// Deletes records that expired before `before` and returns how many went.
    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AuthError>;
}
