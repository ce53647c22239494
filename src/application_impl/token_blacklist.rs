use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::BlacklistStore;
use crate::logger::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Denylist of access-token ids revoked before their natural expiry.
pub struct TokenBlacklist {
    store: Arc<dyn BlacklistStore>,
    fallback_ttl: Duration,
}

impl TokenBlacklist {
    pub fn new(store: Arc<dyn BlacklistStore>, fallback_ttl: Duration) -> Self {
        TokenBlacklist {
            store,
            fallback_ttl,
        }
    }

    /// The entry shadowing a token that expires at `token_expiry`. The entry
    /// lives exactly as long as the token would have. `None` means the token
    /// is already dead and needs no entry.
    pub fn entry_for(
        &self,
        token_id: TokenId,
        token_expiry: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<BlacklistEntry> {
        let expires_at = match token_expiry {
            Some(expiry) if expiry <= now => return None,
            Some(expiry) => expiry,
            None => now + self.fallback_ttl,
        };
        Some(BlacklistEntry {
            token_id,
            expires_at,
        })
    }

    pub async fn add(
        &self,
        token_id: TokenId,
        token_expiry: Option<DateTime<Utc>>,
    ) -> Result<Option<BlacklistEntry>, AuthError> {
        let Some(entry) = self.entry_for(token_id, token_expiry, Utc::now()) else {
            debug!("access token already expired, not blacklisted");
            return Ok(None);
        };
        self.store.insert(&entry).await?;
        debug!(token_id = %entry.token_id, expires_at = %entry.expires_at, "access token blacklisted");
        Ok(Some(entry))
    }

    pub async fn contains(&self, token_id: &TokenId) -> Result<bool, AuthError> {
        self.store.contains(token_id).await
    }
}
