use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::UserRepo;
use crate::logger::*;
use std::sync::Arc;
use tokio::sync::OnceCell;

const DUMMY_PASSWORD: &str = "sessionward-timing-equalizer";

/// Email-or-username verification against the user repository.
pub struct RepoCredentialVerifier {
    user_repo: Arc<dyn UserRepo>,
    hasher: Arc<dyn CredentialHasher>,
    // Verified against when no user matches, so a miss costs as much as a hit.
    dummy_hash: OnceCell<String>,
}

impl RepoCredentialVerifier {
    pub fn new(user_repo: Arc<dyn UserRepo>, hasher: Arc<dyn CredentialHasher>) -> Self {
        RepoCredentialVerifier {
            user_repo,
            hasher,
            dummy_hash: OnceCell::new(),
        }
    }

    async fn dummy_hash(&self) -> Result<&str, AuthError> {
        self.dummy_hash
            .get_or_try_init(|| self.hasher.hash_password(DUMMY_PASSWORD))
            .await
            .map(String::as_str)
    }

    async fn lookup(&self, identifier: &str) -> Result<Option<UserRecord>, AuthError> {
        if looks_like_email(identifier) {
            self.user_repo.find_by_email(identifier).await
        } else {
            self.user_repo.find_by_username(identifier).await
        }
    }
}

pub fn looks_like_email(identifier: &str) -> bool {
    let Some((local, domain)) = identifier.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !identifier.chars().any(char::is_whitespace)
}

#[async_trait::async_trait]
impl CredentialVerifier for RepoCredentialVerifier {
    async fn verify(&self, identifier: &str, secret: &str) -> Result<UserRecord, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let Some(user) = self.lookup(identifier).await? else {
            let dummy = self.dummy_hash().await?;
            let _ = self.hasher.verify_password(secret, dummy).await;
            return Err(AuthError::InvalidCredentials);
        };

        match self
            .hasher
            .verify_password(secret, &user.password_hash)
            .await
        {
            Ok(true) => Ok(user),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                error!(user_id = %user.user_id, "stored credential unusable: {e}");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}
