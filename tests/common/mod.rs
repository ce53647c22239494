#![allow(dead_code)]

use chrono::{Duration, Utc};
use sessionward::application_impl::*;
use sessionward::application_port::*;
use sessionward::domain_model::*;
use sessionward::infra_memory::*;
use std::sync::Arc;

pub const PASSWORD: &str = "correct horse battery staple";
pub const ACCESS_TTL_MINUTES: i64 = 15;

/// Marker-prefixed "hashes"; Argon2 is exercised by its own tests.
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

/// A full `RealAuthService` over in-memory stores, with the stores kept
/// reachable for inspection.
pub struct Harness {
    pub users: Arc<MemoryUserRepo>,
    pub refresh_store: Arc<MemoryRefreshTokenStore>,
    pub session_store: Arc<MemorySessionStore>,
    pub blacklist_store: Arc<MemoryBlacklistStore>,
    pub issuer: Arc<JwtHs256Issuer>,
    pub service: Arc<RealAuthService>,
    pub ada: UserRecord,
}

impl Harness {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUserRepo::new());
        let refresh_store = Arc::new(MemoryRefreshTokenStore::new());
        let session_store = Arc::new(MemorySessionStore::new());
        let blacklist_store = Arc::new(MemoryBlacklistStore::new());
        let issuer = Arc::new(JwtHs256Issuer::new(JwtConfig {
            issuer: "sessionward.it".into(),
            audience: "it-client".into(),
            access_ttl: Duration::minutes(ACCESS_TTL_MINUTES),
            signing_key: b"integration-signing-key".to_vec(),
        }));

        let service = Arc::new(RealAuthService::new(
            users.clone(),
            Arc::new(RepoCredentialVerifier::new(users.clone(), Arc::new(PlainHasher))),
            issuer.clone(),
            Arc::new(RefreshTokenEngine::new(
                refresh_store.clone(),
                RefreshTokenConfig {
                    ttl: Duration::days(7),
                    pepper: b"integration-pepper".to_vec(),
                },
            )),
            Arc::new(SessionRegistry::new(session_store.clone())),
            Arc::new(TokenBlacklist::new(
                blacklist_store.clone(),
                Duration::minutes(15),
            )),
        ));

        let ada = user_record("ada", UserStatus::Active);
        users.insert(ada.clone());

        Harness {
            users,
            refresh_store,
            session_store,
            blacklist_store,
            issuer,
            service,
            ada,
        }
    }

    pub fn add_user(&self, username: &str, status: UserStatus) -> UserRecord {
        let user = user_record(username, status);
        self.users.insert(user.clone());
        user
    }

    pub async fn login(&self) -> LoginResult {
        self.service
            .login(LoginInput {
                identifier: self.ada.email.clone(),
                password: PASSWORD.into(),
                client: laptop(),
            })
            .await
            .expect("login")
    }

    pub async fn refresh(&self, token: &RefreshToken) -> Result<AuthTokens, AuthError> {
        self.service
            .refresh(RefreshInput {
                refresh_token: token.clone(),
                client: laptop(),
            })
            .await
    }

    pub async fn logout(
        &self,
        login: &LoginResult,
        access_token: &AccessToken,
        refresh_token: Option<&RefreshToken>,
        logout_all: bool,
    ) -> Result<LogoutOutcome, AuthError> {
        self.service
            .logout(LogoutInput {
                user_id: login.user.user_id,
                session_id: login.session_id,
                access_token: access_token.clone(),
                refresh_token: refresh_token.cloned(),
                logout_all,
            })
            .await
    }
}

pub fn user_record(username: &str, status: UserStatus) -> UserRecord {
    UserRecord {
        user_id: UserId(uuid::Uuid::new_v4()),
        email: format!("{username}@example.com"),
        username: username.to_string(),
        password_hash: format!("plain${PASSWORD}"),
        role: Role::User,
        status,
        created_at: Utc::now(),
    }
}

pub fn laptop() -> ClientContext {
    ClientContext::new("192.0.2.10", "laptop-browser/1.0")
}
