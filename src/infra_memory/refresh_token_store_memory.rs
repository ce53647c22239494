use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    records: DashMap<TokenHash, RefreshTokenRecord>,
    /// Families revoked so far. A record inserted into one of them while the
    /// revocation sweep is still running is born revoked.
    revoked_families: DashSet<FamilyId>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records matching `pred`, oldest first.
    pub fn records_where<F>(&self, pred: F) -> Vec<RefreshTokenRecord>
    where
        F: Fn(&RefreshTokenRecord) -> bool,
    {
        let mut records: Vec<RefreshTokenRecord> = self
            .records
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.issued_at);
        records
    }

    pub fn family(&self, family_id: FamilyId) -> Vec<RefreshTokenRecord> {
        self.records_where(|record| record.family_id == family_id)
    }

    pub fn family_of_session(&self, session_id: SessionId) -> Vec<RefreshTokenRecord> {
        self.records_where(|record| record.session_id == session_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        match self.records.entry(record.token_hash.clone()) {
            Entry::Occupied(_) => {
                return Err(AuthError::Store(
                    "insert refresh token: duplicate token hash".to_string(),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        if self.revoked_families.contains(&record.family_id) {
            if let Some(mut stored) = self.records.get_mut(&record.token_hash) {
                stored.revoked = true;
            }
        }
        Ok(())
    }

    async fn get(&self, token_hash: &TokenHash) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self
            .records
            .get(token_hash)
            .map(|record| record.value().clone()))
    }

    async fn mark_used(&self, token_hash: &TokenHash) -> Result<bool, AuthError> {
        // The shard write lock held by `get_mut` makes the check and the flip
        // one step for every concurrent caller.
        let Some(mut record) = self.records.get_mut(token_hash) else {
            return Ok(false);
        };
        if record.used || record.revoked {
            return Ok(false);
        }
        record.used = true;
        Ok(true)
    }

    async fn revoke_family(&self, family_id: FamilyId) -> Result<(), AuthError> {
        self.revoked_families.insert(family_id);
        for mut entry in self.records.iter_mut() {
            if entry.family_id == family_id {
                entry.value_mut().revoked = true;
            }
        }
        Ok(())
    }

    async fn revoke_user(&self, user_id: UserId) -> Result<u64, AuthError> {
        let mut changed = 0;
        for mut entry in self.records.iter_mut() {
            if entry.user_id == user_id && !entry.revoked {
                entry.value_mut().revoked = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut purged = 0;
        self.records.retain(|_, record| {
            let keep = record.expires_at >= before;
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }
}
