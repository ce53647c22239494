use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::RefreshTokenStore;
use crate::logger::*;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use std::sync::Arc;

const RAW_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct RefreshTokenConfig {
    pub ttl: Duration,
    /// Server-side key mixed into every token hash, so a leaked table of
    /// hashes cannot be checked against guessed tokens offline.
    pub pepper: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct IssueRefreshToken {
    pub user_id: UserId,
    pub session_id: SessionId,
    /// `None` starts a new family.
    pub family_id: Option<FamilyId>,
    pub parent_hash: Option<TokenHash>,
    pub client: ClientContext,
}

#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub raw: RefreshToken,
    pub record: RefreshTokenRecord,
}

pub struct RefreshTokenEngine {
    store: Arc<dyn RefreshTokenStore>,
    cfg: RefreshTokenConfig,
}

impl RefreshTokenEngine {
    pub fn new(store: Arc<dyn RefreshTokenStore>, cfg: RefreshTokenConfig) -> Self {
        RefreshTokenEngine { store, cfg }
    }

    pub fn ttl(&self) -> Duration {
        self.cfg.ttl
    }

    fn generate_raw() -> String {
        let mut bytes = [0u8; RAW_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn is_well_formed(raw: &str) -> bool {
        raw.len() == RAW_TOKEN_BYTES * 2 && raw.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Storage key for a raw token.
    pub fn hash_token(&self, raw: &RefreshToken) -> Result<TokenHash, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.cfg.pepper)
            .map_err(|e| AuthError::InternalError(format!("refresh token hmac key: {e}")))?;
        mac.update(raw.0.as_bytes());
        let out = mac.finalize().into_bytes();
        Ok(TokenHash(hex::encode(out)))
    }

    pub async fn issue(&self, request: IssueRefreshToken) -> Result<IssuedRefreshToken, AuthError> {
        let IssueRefreshToken {
            user_id,
            session_id,
            family_id,
            parent_hash,
            client,
        } = request;

        let raw = RefreshToken(Self::generate_raw());
        let token_hash = self.hash_token(&raw)?;
        let issued_at = Utc::now();
        let family_id = family_id.unwrap_or_else(FamilyId::new_random);

        let record = RefreshTokenRecord {
            token_hash,
            user_id,
            session_id,
            family_id,
            parent_hash,
            issued_at,
            expires_at: issued_at + self.cfg.ttl,
            ip: client.ip,
            user_agent: client.user_agent,
            used: false,
            revoked: false,
        };
        self.store.insert(&record).await?;

        debug!(
            user_id = %record.user_id,
            session_id = %record.session_id,
            family_id = %record.family_id,
            rotated = record.parent_hash.is_some(),
            "refresh token issued"
        );
        Ok(IssuedRefreshToken { raw, record })
    }

    /// Resolves a raw token to its record. Expired tokens fail with
    /// `TokenExpired` whatever their other flags. Replay is not decided here:
    /// an unexpired `used` record is returned as-is for the caller to inspect,
    /// even when its family has since been revoked.
    pub async fn validate(&self, raw: &RefreshToken) -> Result<RefreshTokenRecord, AuthError> {
        self.validate_at(raw, Utc::now()).await
    }

    async fn validate_at(
        &self,
        raw: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AuthError> {
        if !Self::is_well_formed(&raw.0) {
            return Err(AuthError::TokenInvalid);
        }
        let token_hash = self.hash_token(raw)?;
        let record = self
            .store
            .get(&token_hash)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        match record.state_at(now) {
            RefreshTokenState::Revoked if record.used => Ok(record),
            RefreshTokenState::Revoked => {
                debug!(family_id = %record.family_id, "revoked refresh token presented");
                Err(AuthError::TokenInvalid)
            }
            RefreshTokenState::Expired => Err(AuthError::TokenExpired),
            RefreshTokenState::Issued | RefreshTokenState::Used => Ok(record),
        }
    }

    /// Atomic check-and-set of the one-time-use flag. `Ok(true)` means this
    /// caller consumed the token; `Ok(false)` means someone else already did.
    pub async fn mark_used(&self, raw: &RefreshToken) -> Result<bool, AuthError> {
        let token_hash = self.hash_token(raw)?;
        self.store.mark_used(&token_hash).await
    }

    pub async fn revoke_family(&self, family_id: FamilyId) -> Result<(), AuthError> {
        self.store.revoke_family(family_id).await?;
        info!(family_id = %family_id, "refresh token family revoked");
        Ok(())
    }

    /// Revokes the family of a raw token. Returns the revoked family, or
    /// `None` when the token is unknown or owned by someone else.
    pub async fn revoke_token(
        &self,
        raw: &RefreshToken,
        owner: UserId,
    ) -> Result<Option<FamilyId>, AuthError> {
        if !Self::is_well_formed(&raw.0) {
            return Ok(None);
        }
        let token_hash = self.hash_token(raw)?;
        let Some(record) = self.store.get(&token_hash).await? else {
            return Ok(None);
        };
        if record.user_id != owner {
            warn!(
                owner = %owner,
                token_owner = %record.user_id,
                "refusing to revoke a refresh token owned by another user"
            );
            return Ok(None);
        }
        self.revoke_family(record.family_id).await?;
        Ok(Some(record.family_id))
    }

    /// Re-reads `record`. A family revocation marks every member, so a
    /// revoked (or vanished) record means its family is dead.
    pub async fn is_revoked(&self, record: &RefreshTokenRecord) -> Result<bool, AuthError> {
        let current = self.store.get(&record.token_hash).await?;
        Ok(current.is_none_or(|r| r.revoked))
    }

    /// True once some caller has consumed `record`.
    pub async fn is_used(&self, record: &RefreshTokenRecord) -> Result<bool, AuthError> {
        let current = self.store.get(&record.token_hash).await?;
        Ok(current.is_some_and(|r| r.used))
    }

    pub async fn revoke_all_for_user(&self, user_id: UserId) -> Result<u64, AuthError> {
        let revoked = self.store.revoke_user(user_id).await?;
        info!(user_id = %user_id, revoked, "refresh tokens revoked for user");
        Ok(revoked)
    }

    /// Drops records that expired before `before`. An expired token fails
    /// validation whatever its flags, so forgetting it changes no outcome
    /// beyond `TokenExpired` turning into `TokenInvalid`.
    pub async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AuthError> {
        let purged = self.store.purge_expired(before).await?;
        if purged > 0 {
            info!(purged, "expired refresh tokens purged");
        }
        Ok(purged)
    }

    /// Compares the issuance context with the current one. Informational only.
    pub fn detect_anomaly(record: &RefreshTokenRecord, client: &ClientContext) -> bool {
        record.ip != client.ip || record.user_agent != client.user_agent
    }

    /// Consumes `raw` and issues its successor in the same family.
    /// Losing the consumption race is reported as `TokenReplayDetected`;
    /// containment (family and session revocation) is left to the caller.
    pub async fn rotate(
        &self,
        raw: &RefreshToken,
        record: &RefreshTokenRecord,
        client: ClientContext,
    ) -> Result<IssuedRefreshToken, AuthError> {
        if !self.mark_used(raw).await? {
            return Err(AuthError::TokenReplayDetected);
        }

        self.issue(IssueRefreshToken {
            user_id: record.user_id,
            session_id: record.session_id,
            family_id: Some(record.family_id),
            parent_hash: Some(record.token_hash.clone()),
            client,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_port::RefreshTokenStore;
    use crate::infra_memory::MemoryRefreshTokenStore;

    fn engine() -> (Arc<MemoryRefreshTokenStore>, RefreshTokenEngine) {
        let store = Arc::new(MemoryRefreshTokenStore::new());
        let engine = RefreshTokenEngine::new(
            store.clone(),
            RefreshTokenConfig {
                ttl: Duration::days(7),
                pepper: b"test-pepper".to_vec(),
            },
        );
        (store, engine)
    }

    fn root_request(user_id: UserId) -> IssueRefreshToken {
        IssueRefreshToken {
            user_id,
            session_id: SessionId::new_random(),
            family_id: None,
            parent_hash: None,
            client: ClientContext::new("10.0.0.1", "test-agent"),
        }
    }

    fn user() -> UserId {
        UserId(uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn issue_starts_a_family_and_stores_only_the_hash() {
        let (store, engine) = engine();
        let issued = engine.issue(root_request(user())).await.unwrap();

        assert_eq!(issued.raw.0.len(), 64);
        assert!(issued.record.parent_hash.is_none());
        assert_ne!(issued.record.token_hash.0, issued.raw.0);
        assert_eq!(
            issued.record.expires_at - issued.record.issued_at,
            Duration::days(7)
        );

        let stored = store.get(&issued.record.token_hash).await.unwrap();
        assert_eq!(stored, Some(issued.record));
    }

    #[tokio::test]
    async fn validate_rejects_malformed_and_unknown_tokens() {
        let (_, engine) = engine();

        let malformed = engine.validate(&RefreshToken("not-a-token".into())).await;
        assert!(matches!(malformed, Err(AuthError::TokenInvalid)));

        let unknown = engine.validate(&RefreshToken("ab".repeat(32))).await;
        assert!(matches!(unknown, Err(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn validate_reports_expiry() {
        let (_, engine) = engine();
        let issued = engine.issue(root_request(user())).await.unwrap();

        let later = issued.record.expires_at + Duration::seconds(1);
        let result = engine.validate_at(&issued.raw, later).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn expired_tokens_are_expired_even_when_consumed() {
        let (store, engine) = engine();
        let root = engine.issue(root_request(user())).await.unwrap();
        engine
            .rotate(&root.raw, &root.record, ClientContext::default())
            .await
            .unwrap();

        let later = root.record.expires_at + Duration::seconds(1);
        let result = engine.validate_at(&root.raw, later).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
        assert!(store.family(root.record.family_id).iter().all(|r| !r.revoked));

        engine.revoke_family(root.record.family_id).await.unwrap();
        let result = engine.validate_at(&root.raw, later).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn validate_returns_used_records_for_replay_inspection() {
        let (_, engine) = engine();
        let issued = engine.issue(root_request(user())).await.unwrap();

        assert!(engine.mark_used(&issued.raw).await.unwrap());
        let record = engine.validate(&issued.raw).await.unwrap();
        assert!(record.used);
    }

    #[tokio::test]
    async fn mark_used_succeeds_exactly_once() {
        let (_, engine) = engine();
        let issued = engine.issue(root_request(user())).await.unwrap();

        assert!(engine.mark_used(&issued.raw).await.unwrap());
        assert!(!engine.mark_used(&issued.raw).await.unwrap());
    }

    #[tokio::test]
    async fn rotate_links_successor_to_parent() {
        let (_, engine) = engine();
        let root = engine.issue(root_request(user())).await.unwrap();

        let next = engine
            .rotate(&root.raw, &root.record, ClientContext::new("10.0.0.2", "other"))
            .await
            .unwrap();

        assert_eq!(next.record.family_id, root.record.family_id);
        assert_eq!(next.record.session_id, root.record.session_id);
        assert_eq!(next.record.parent_hash, Some(root.record.token_hash.clone()));

        let again = engine
            .rotate(&root.raw, &root.record, ClientContext::default())
            .await;
        assert!(matches!(again, Err(AuthError::TokenReplayDetected)));
    }

    #[tokio::test]
    async fn revoke_family_is_idempotent_and_covers_used_records() {
        let (store, engine) = engine();
        let root = engine.issue(root_request(user())).await.unwrap();
        let next = engine
            .rotate(&root.raw, &root.record, ClientContext::default())
            .await
            .unwrap();

        engine.revoke_family(root.record.family_id).await.unwrap();
        engine.revoke_family(root.record.family_id).await.unwrap();

        for record in store.family(root.record.family_id) {
            assert!(record.revoked);
        }
        let result = engine.validate(&next.raw).await;
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
        assert!(!engine.mark_used(&next.raw).await.unwrap());
    }

    #[tokio::test]
    async fn consumed_tokens_stay_visible_after_revocation() {
        let (_, engine) = engine();
        let root = engine.issue(root_request(user())).await.unwrap();
        engine
            .rotate(&root.raw, &root.record, ClientContext::default())
            .await
            .unwrap();
        engine.revoke_family(root.record.family_id).await.unwrap();

        let record = engine.validate(&root.raw).await.unwrap();
        assert!(record.used && record.revoked);
        assert!(engine.is_used(&record).await.unwrap());
    }

    #[tokio::test]
    async fn purged_tokens_become_unknown() {
        let (store, engine) = engine();
        let long_lived = RefreshTokenEngine::new(
            store.clone(),
            RefreshTokenConfig {
                ttl: Duration::days(30),
                pepper: b"test-pepper".to_vec(),
            },
        );
        let short = engine.issue(root_request(user())).await.unwrap();
        let long = long_lived.issue(root_request(user())).await.unwrap();

        let cutoff = short.record.expires_at + Duration::seconds(1);
        assert_eq!(engine.purge_expired(short.record.issued_at).await.unwrap(), 0);
        assert_eq!(engine.purge_expired(cutoff).await.unwrap(), 1);

        assert!(store.get(&short.record.token_hash).await.unwrap().is_none());
        assert!(matches!(
            engine.validate(&short.raw).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(engine.validate(&long.raw).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_token_ignores_foreign_owner() {
        let (_, engine) = engine();
        let owner = user();
        let issued = engine.issue(root_request(owner)).await.unwrap();

        let revoked = engine.revoke_token(&issued.raw, user()).await.unwrap();
        assert_eq!(revoked, None);
        assert!(engine.validate(&issued.raw).await.is_ok());

        let revoked = engine.revoke_token(&issued.raw, owner).await.unwrap();
        assert_eq!(revoked, Some(issued.record.family_id));
        assert!(engine.validate(&issued.raw).await.is_err());
    }

    #[tokio::test]
    async fn is_revoked_reflects_the_stored_record() {
        let (_, engine) = engine();
        let root = engine.issue(root_request(user())).await.unwrap();
        assert!(!engine.is_revoked(&root.record).await.unwrap());

        engine.revoke_family(root.record.family_id).await.unwrap();
        assert!(engine.is_revoked(&root.record).await.unwrap());

        let mut unknown = root.record.clone();
        unknown.token_hash = TokenHash("0".repeat(64));
        assert!(engine.is_revoked(&unknown).await.unwrap());
    }

    #[test]
    fn anomaly_detection_compares_context() {
        let record = RefreshTokenRecord {
            token_hash: TokenHash("h".into()),
            user_id: UserId(uuid::Uuid::nil()),
            session_id: SessionId(uuid::Uuid::nil()),
            family_id: FamilyId(uuid::Uuid::nil()),
            parent_hash: None,
            issued_at: Utc::now(),
            expires_at: Utc::now(),
            ip: "1.1.1.1".into(),
            user_agent: "ua".into(),
            used: false,
            revoked: false,
        };

        assert!(!RefreshTokenEngine::detect_anomaly(
            &record,
            &ClientContext::new("1.1.1.1", "ua")
        ));
        assert!(RefreshTokenEngine::detect_anomaly(
            &record,
            &ClientContext::new("2.2.2.2", "ua")
        ));
        assert!(RefreshTokenEngine::detect_anomaly(
            &record,
            &ClientContext::new("1.1.1.1", "other")
        ));
    }
}
