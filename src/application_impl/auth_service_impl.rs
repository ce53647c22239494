use super::{IssueRefreshToken, RefreshTokenEngine, SessionRegistry, TokenBlacklist};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::UserRepo;
use crate::logger::*;
use std::sync::Arc;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_verifier: Arc<dyn CredentialVerifier>,
    access_tokens: Arc<dyn AccessTokenIssuer>,
    refresh_tokens: Arc<RefreshTokenEngine>,
    sessions: Arc<SessionRegistry>,
    blacklist: Arc<TokenBlacklist>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_verifier: Arc<dyn CredentialVerifier>,
        access_tokens: Arc<dyn AccessTokenIssuer>,
        refresh_tokens: Arc<RefreshTokenEngine>,
        sessions: Arc<SessionRegistry>,
        blacklist: Arc<TokenBlacklist>,
    ) -> Self {
        Self {
            user_repo,
            credential_verifier,
            access_tokens,
            refresh_tokens,
            sessions,
            blacklist,
        }
    }

    /// Kills the whole lineage of `record`: its refresh family and the
    /// session it is bound to.
    async fn revoke_lineage(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        self.refresh_tokens.revoke_family(record.family_id).await?;
        self.sessions.revoke(record.session_id).await?;
        Ok(())
    }

    /// Revokes first, then reports the replay. A failed revocation is
    /// reported instead, so the caller sees containment did not happen.
    async fn contain_replay(&self, record: &RefreshTokenRecord, reason: &str) -> AuthError {
        warn!(
            user_id = %record.user_id,
            session_id = %record.session_id,
            family_id = %record.family_id,
            reason,
            "refresh token replay detected, revoking lineage"
        );
        match self.revoke_lineage(record).await {
            Ok(()) => AuthError::TokenReplayDetected,
            Err(e) => {
                error!(family_id = %record.family_id, "replay containment failed: {e}");
                e
            }
        }
    }

    async fn blacklist_access_token(&self, access_token: &AccessToken, outcome: &mut LogoutOutcome) {
        let token_id = match self.access_tokens.extract_id(access_token).await {
            Ok(token_id) => token_id,
            Err(e) => {
                warn!("logout: access token id unreadable: {e}");
                outcome.warn(LogoutStep::ExtractTokenId, e.to_string());
                return;
            }
        };

        let expiry = match self.access_tokens.expiry(access_token).await {
            Ok(expiry) => Some(expiry),
            Err(e) => {
                debug!("logout: access token expiry unknown, using fallback ttl: {e}");
                None
            }
        };

        if let Err(e) = self.blacklist.add(token_id, expiry).await {
            warn!("logout: blacklisting access token failed: {e}");
            outcome.warn(LogoutStep::BlacklistAccessToken, e.to_string());
        }
    }

    /// Every step is best-effort; the outcome lists what did not happen.
    async fn logout_session(&self, request: LogoutInput) -> LogoutOutcome {
        let LogoutInput {
            user_id,
            session_id,
            access_token,
            refresh_token,
            ..
        } = request;
        let mut outcome = LogoutOutcome::default();

        self.blacklist_access_token(&access_token, &mut outcome).await;

        if let Some(refresh_token) = &refresh_token {
            match self.refresh_tokens.revoke_token(refresh_token, user_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(user_id = %user_id, "logout: refresh token unknown or not owned by caller");
                    outcome.warn(
                        LogoutStep::RevokeRefreshToken,
                        "refresh token unknown or not owned by caller",
                    );
                }
                Err(e) => {
                    warn!(user_id = %user_id, "logout: revoking refresh token failed: {e}");
                    outcome.warn(LogoutStep::RevokeRefreshToken, e.to_string());
                }
            }
        }

        match self.sessions.revoke(session_id).await {
            Ok(()) => outcome.sessions_revoked = 1,
            Err(e) => {
                warn!(session_id = %session_id, "logout: revoking session failed: {e}");
                outcome.warn(LogoutStep::RevokeSession, e.to_string());
            }
        }

        info!(
            user_id = %user_id,
            session_id = %session_id,
            warnings = outcome.warnings.len(),
            "logged out"
        );
        outcome
    }

    /// Unlike a single logout, failures to find or revoke sessions are
    /// surfaced: the caller asked for a security action.
    async fn logout_everywhere(&self, request: LogoutInput) -> Result<LogoutOutcome, AuthError> {
        let user = self
            .user_repo
            .find_by_id(request.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let sessions = self.sessions.get_all_for_user(user.user_id).await?;
        let revoked = self.sessions.revoke_all(user.user_id).await?;

        let mut outcome = LogoutOutcome {
            sessions_revoked: revoked,
            warnings: Vec::new(),
        };

        self.blacklist_access_token(&request.access_token, &mut outcome)
            .await;
        if let Err(e) = self.refresh_tokens.revoke_all_for_user(user.user_id).await {
            warn!(user_id = %user.user_id, "logout all: revoking refresh tokens failed: {e}");
            outcome.warn(LogoutStep::RevokeRefreshToken, e.to_string());
        }

        info!(
            user_id = %user.user_id,
            listed = sessions.len(),
            revoked,
            "logged out of every session"
        );
        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput {
            identifier,
            password,
            client,
        } = request;

        let user = self
            .credential_verifier
            .verify(&identifier, &password)
            .await?;

        if let Some(err) = AuthError::for_account(&user) {
            info!(user_id = %user.user_id, status = user.status.as_str(), "login refused");
            return Err(err);
        }

        let session_id = SessionId::new_random();

        let (access_token, access_exp) = self
            .access_tokens
            .issue(user.user_id, user.role, session_id)
            .await?;

        let refresh = self
            .refresh_tokens
            .issue(IssueRefreshToken {
                user_id: user.user_id,
                session_id,
                family_id: None,
                parent_hash: None,
                client: client.clone(),
            })
            .await?;

        let session = Session {
            session_id,
            user_id: user.user_id,
            email: user.email.clone(),
            role: user.role,
            ip: client.ip,
            user_agent: client.user_agent,
            created_at: refresh.record.issued_at,
            expires_at: refresh.record.expires_at,
        };
        if let Err(e) = self.sessions.create(&session).await {
            error!(user_id = %user.user_id, session_id = %session_id, "login: session not stored: {e}");
            // Without a session the token pair can never be managed.
            if let Err(revoke_err) = self
                .refresh_tokens
                .revoke_family(refresh.record.family_id)
                .await
            {
                warn!("login: orphaned refresh family not revoked: {revoke_err}");
            }
            return Err(e);
        }

        info!(user_id = %user.user_id, session_id = %session_id, "login succeeded");

        Ok(LoginResult {
            session_id,
            user: user.snapshot(),
            tokens: AuthTokens {
                access_token,
                refresh_token: refresh.raw,
                access_token_expires_at: access_exp,
                refresh_token_expires_at: refresh.record.expires_at,
            },
        })
    }

    async fn refresh(&self, request: RefreshInput) -> Result<AuthTokens, AuthError> {
        let RefreshInput {
            refresh_token,
            client,
        } = request;

        let record = self.refresh_tokens.validate(&refresh_token).await?;

        if record.used {
            return Err(self
                .contain_replay(&record, "consumed refresh token presented again")
                .await);
        }

        let Some(session) = self.sessions.get(record.session_id).await? else {
            // A concurrent rotation consumed the token and a replay of it
            // already took the session down: this caller lost the race.
            if self.refresh_tokens.is_used(&record).await? {
                return Err(self.contain_replay(&record, "lost rotation race").await);
            }
            info!(session_id = %record.session_id, "refresh refused, session gone");
            return Err(AuthError::SessionNotFound);
        };

        // The account may have changed since the token was issued.
        let Some(user) = self.user_repo.find_by_id(record.user_id).await? else {
            warn!(user_id = %record.user_id, "refresh refused, user gone");
            self.revoke_lineage(&record).await?;
            return Err(AuthError::TokenInvalid);
        };
        if let Some(err) = AuthError::for_account(&user) {
            warn!(
                user_id = %user.user_id,
                session_id = %record.session_id,
                status = user.status.as_str(),
                "refresh refused, account can no longer log in"
            );
            self.revoke_lineage(&record).await?;
            return Err(match err {
                AuthError::AccountSuspended | AuthError::AccountDeleted => err,
                _ => AuthError::TokenInvalid,
            });
        }

        if RefreshTokenEngine::detect_anomaly(&record, &client) {
            warn!(
                user_id = %record.user_id,
                session_id = %record.session_id,
                issued_ip = %record.ip,
                current_ip = %client.ip,
                issued_user_agent = %record.user_agent,
                current_user_agent = %client.user_agent,
                "refresh from a different client context"
            );
        }

        let next = match self
            .refresh_tokens
            .rotate(&refresh_token, &record, client.clone())
            .await
        {
            Ok(next) => next,
            Err(AuthError::TokenReplayDetected) => {
                return Err(self.contain_replay(&record, "lost rotation race").await);
            }
            Err(e) => return Err(e),
        };

        self.sessions
            .create(&Session {
                session_id: session.session_id,
                user_id: user.user_id,
                email: user.email.clone(),
                role: user.role,
                ip: client.ip,
                user_agent: client.user_agent,
                created_at: session.created_at,
                expires_at: next.record.expires_at,
            })
            .await?;

        // A losing racer may have revoked the family after our mark_used but
        // before the successor or the session write landed. Revoke again so
        // neither outlives the family.
        if self.refresh_tokens.is_revoked(&record).await? {
            warn!(
                user_id = %record.user_id,
                session_id = %record.session_id,
                family_id = %record.family_id,
                "family revoked during rotation, revoking successor"
            );
            self.revoke_lineage(&record).await?;
        }

        let (access_token, access_exp) = self
            .access_tokens
            .issue(user.user_id, user.role, session.session_id)
            .await?;

        debug!(user_id = %user.user_id, session_id = %session.session_id, "refresh rotated");

        Ok(AuthTokens {
            access_token,
            refresh_token: next.raw,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: next.record.expires_at,
        })
    }

    async fn logout(&self, request: LogoutInput) -> Result<LogoutOutcome, AuthError> {
        if request.logout_all {
            self.logout_everywhere(request).await
        } else {
            Ok(self.logout_session(request).await)
        }
    }

    async fn verify_access_token(&self, token: &AccessToken) -> Result<AccessClaims, AuthError> {
        let claims = self.access_tokens.verify(token).await?;
        if self.blacklist.contains(&claims.token_id).await? {
            debug!(token_id = %claims.token_id, "blacklisted access token presented");
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<Session>, AuthError> {
        self.sessions.get_all_for_user(user_id).await
    }
}
