use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryBlacklistStore {
    entries: DashMap<TokenId, DateTime<Utc>>,
}

impl MemoryBlacklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expiry_of(&self, token_id: &TokenId) -> Option<DateTime<Utc>> {
        self.entries.get(token_id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&self, now: DateTime<Utc>) {
        self.entries.retain(|_, expires_at| *expires_at > now);
    }
}

#[async_trait::async_trait]
impl BlacklistStore for MemoryBlacklistStore {
    async fn insert(&self, entry: &BlacklistEntry) -> Result<(), AuthError> {
        self.purge_expired(Utc::now());
        self.entries
            .insert(entry.token_id.clone(), entry.expires_at);
        Ok(())
    }

    async fn contains(&self, token_id: &TokenId) -> Result<bool, AuthError> {
        let now = Utc::now();
        self.entries
            .remove_if(token_id, |_, expires_at| *expires_at <= now);
        Ok(self.entries.contains_key(token_id))
    }
}
