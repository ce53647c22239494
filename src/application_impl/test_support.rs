use super::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use chrono::{Duration, Utc};
use std::sync::Arc;

pub const PASSWORD: &str = "correct horse battery staple";

/// Stores passwords with a marker prefix. Keeps unit tests away from Argon2's
/// cost in debug builds.
pub struct PlainHasher;

#[async_trait::async_trait]
impl CredentialHasher for PlainHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("plain${password}"))
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        Ok(password_hash.strip_prefix("plain$") == Some(password))
    }
}

pub struct Fixture {
    pub users: Arc<MemoryUserRepo>,
    pub user: UserRecord,
    pub refresh_store: Arc<MemoryRefreshTokenStore>,
    pub session_store: Arc<MemorySessionStore>,
    pub blacklist_store: Arc<MemoryBlacklistStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUserRepo::new());
        let user = UserRecord {
            user_id: UserId(uuid::Uuid::new_v4()),
            email: "ada@example.com".into(),
            username: "ada".into(),
            password_hash: format!("plain${PASSWORD}"),
            role: Role::User,
            status: UserStatus::Active,
            created_at: Utc::now(),
        };
        users.insert(user.clone());

        Fixture {
            users,
            user,
            refresh_store: Arc::new(MemoryRefreshTokenStore::new()),
            session_store: Arc::new(MemorySessionStore::new()),
            blacklist_store: Arc::new(MemoryBlacklistStore::new()),
        }
    }

    pub fn verifier(&self) -> RepoCredentialVerifier {
        RepoCredentialVerifier::new(self.users.clone(), Arc::new(PlainHasher))
    }

    pub fn service(&self) -> RealAuthService {
        self.service_with(self.blacklist_store.clone(), self.session_store.clone())
    }

    /// Same users and refresh tokens, swapped blacklist and session stores.
    pub fn service_with(
        &self,
        blacklist_store: Arc<dyn BlacklistStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> RealAuthService {
        RealAuthService::new(
            self.users.clone(),
            Arc::new(self.verifier()),
            Arc::new(JwtHs256Issuer::new(JwtConfig {
                issuer: "sessionward.test".into(),
                audience: "test-client".into(),
                access_ttl: Duration::minutes(15),
                signing_key: b"test-signing-key".to_vec(),
            })),
            Arc::new(RefreshTokenEngine::new(
                self.refresh_store.clone(),
                RefreshTokenConfig {
                    ttl: Duration::days(7),
                    pepper: b"test-pepper".to_vec(),
                },
            )),
            Arc::new(SessionRegistry::new(session_store)),
            Arc::new(TokenBlacklist::new(blacklist_store, Duration::minutes(15))),
        )
    }

    pub fn login(&self) -> LoginInput {
        LoginInput {
            identifier: self.user.email.clone(),
            password: PASSWORD.into(),
            client: client(),
        }
    }

    pub fn refresh(&self, token: &RefreshToken) -> RefreshInput {
        RefreshInput {
            refresh_token: token.clone(),
            client: client(),
        }
    }
}

pub fn client() -> ClientContext {
    ClientContext::new("198.51.100.7", "sessionward-tests/1.0")
}
