use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Wrong secret, unknown identifier and malformed identifier all collapse
    /// into this one variant.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account suspended")]
    AccountSuspended,
    #[error("account deleted")]
    AccountDeleted,
    #[error("account pending verification")]
    AccountPendingVerification,
    #[error("user not found")]
    UserNotFound,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("token replay detected")]
    TokenReplayDetected,
    #[error("session not found")]
    SessionNotFound,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Status error for an account whose identity is already confirmed.
    /// Returns `None` for accounts that may log in.
    pub fn for_account(user: &UserRecord) -> Option<AuthError> {
        if user.can_login() {
            return None;
        }
        Some(match user.status {
            UserStatus::Suspended => AuthError::AccountSuspended,
            UserStatus::Deleted => AuthError::AccountDeleted,
            _ => AuthError::AccountPendingVerification,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub identifier: String,
    pub password: String,
    pub client: ClientContext,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub session_id: SessionId,
    pub user: UserSnapshot,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone)]
pub struct RefreshInput {
    pub refresh_token: RefreshToken,
    pub client: ClientContext,
}

#[derive(Debug, Clone)]
pub struct LogoutInput {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
    pub logout_all: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutStep {
    ExtractTokenId,
    BlacklistAccessToken,
    RevokeRefreshToken,
    RevokeSession,
}

/// A cleanup step that failed without failing the logout.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutWarning {
    pub step: LogoutStep,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogoutOutcome {
    pub sessions_revoked: u64,
    pub warnings: Vec<LogoutWarning>,
}

impl LogoutOutcome {
    pub fn warn(&mut self, step: LogoutStep, message: impl Into<String>) {
        self.warnings.push(LogoutWarning {
            step,
            message: message.into(),
        });
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Claims carried by a verified access token.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub role: Role,
    pub token_id: TokenId,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait AccessTokenIssuer: Send + Sync {
    async fn issue(
        &self,
        user_id: UserId,
        role: Role,
        session_id: SessionId,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;
    /// Full signature and expiry validation.
    async fn verify(&self, token: &AccessToken) -> Result<AccessClaims, AuthError>;
    /// Expiry of a token, read without enforcing it.
    async fn expiry(&self, token: &AccessToken) -> Result<DateTime<Utc>, AuthError>;
    /// Token id, read without signature or expiry validation.
    async fn extract_id(&self, token: &AccessToken) -> Result<TokenId, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolves `identifier` (email or username) and checks `secret`.
    /// Every failure to authenticate is `AuthError::InvalidCredentials`.
    async fn verify(&self, identifier: &str, secret: &str) -> Result<UserRecord, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn refresh(&self, request: RefreshInput) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, request: LogoutInput) -> Result<LogoutOutcome, AuthError>;
    async fn verify_access_token(&self, token: &AccessToken) -> Result<AccessClaims, AuthError>;
    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<Session>, AuthError>;
}
