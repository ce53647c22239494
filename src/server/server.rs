use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::RefreshTokenSweeper;
use crate::settings::{Auth, SeedUser, Settings};
use chrono::Utc;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Storage adapters the auth service is assembled from.
pub struct Stores {
    pub user_repo: Arc<dyn UserRepo>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub blacklist: Arc<dyn BlacklistStore>,
}

impl Stores {
    /// Everything in process memory. Users are whatever the caller put in
    /// `user_repo`.
    pub fn in_memory(user_repo: Arc<dyn UserRepo>) -> Self {
        Stores {
            user_repo,
            refresh_tokens: Arc::new(MemoryRefreshTokenStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            blacklist: Arc::new(MemoryBlacklistStore::new()),
        }
    }
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        match settings.store.backend.as_str() {
            "memory" => {
                warn!(
                    seeded = settings.store.seed_users.len(),
                    "memory store backend: state is lost on restart"
                );
                let users = Arc::new(MemoryUserRepo::new());
                seed_users(&users, &settings.store.seed_users).await?;
                Self::with_stores(settings, Stores::in_memory(users), None)
            }
            "redis_mysql" => {
                let redis_dsn = settings
                    .store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.redis_dsn is required for redis_mysql"))?;
                let mysql_dsn = settings
                    .store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.mysql_dsn is required for redis_mysql"))?;

                let redis_client = redis::Client::open(redis_dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                let pool = Pool::<MySql>::connect(mysql_dsn).await?;

                if !settings.store.seed_users.is_empty() {
                    warn!("store.seed_users is ignored outside the memory backend");
                }

                let prefix = &settings.store.key_prefix;
                let stores = Stores {
                    user_repo: Arc::new(MySqlUserRepo::new(pool.clone())),
                    refresh_tokens: Arc::new(MySqlRefreshTokenStore::new(pool.clone())),
                    sessions: Arc::new(RedisSessionStore::new(redis_manager.clone(), prefix.clone())),
                    blacklist: Arc::new(RedisBlacklistStore::new(redis_manager, prefix.clone())),
                };
                Self::with_stores(settings, stores, Some(pool))
            }
            other => Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        }
    }

    pub fn with_stores(
        settings: &Settings,
        stores: Stores,
        pool: Option<Pool<MySql>>,
    ) -> anyhow::Result<Self> {
        let refresh_tokens =
            build_refresh_token_engine(&settings.auth, stores.refresh_tokens.clone())?;
        let auth_service: Arc<dyn AuthService> = Arc::new(build_auth_service(
            &settings.auth,
            stores,
            refresh_tokens.clone(),
        )?);

        let cancel = CancellationToken::new();
        let sweeper_handle = match settings.auth.purge_interval_secs {
            0 => {
                warn!("expired refresh tokens are never purged");
                None
            }
            secs => {
                let sweeper = RefreshTokenSweeper::new(
                    refresh_tokens,
                    std::time::Duration::from_secs(secs),
                    cancel.clone(),
                );
                Some(tokio::spawn(async move {
                    sweeper.run().await;
                }))
            }
        };

        info!(backend = %settings.store.backend, "server started");

        Ok(Self {
            auth_service,
            sweeper_handle: Mutex::new(sweeper_handle),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

async fn seed_users(users: &MemoryUserRepo, seeds: &[SeedUser]) -> anyhow::Result<()> {
    let hasher = Argon2PasswordHasher;
    for seed in seeds {
        let user = UserRecord {
            user_id: UserId(uuid::Uuid::new_v4()),
            email: seed.email.clone(),
            username: seed.username.clone(),
            password_hash: hasher.hash_password(&seed.password).await?,
            role: seed.role,
            status: UserStatus::Active,
            created_at: Utc::now(),
        };
        info!(user_id = %user.user_id, username = %user.username, "seeded user");
        users.insert(user);
    }
    Ok(())
}

fn secs(value: u64, name: &str) -> anyhow::Result<chrono::Duration> {
    let secs = i64::try_from(value).map_err(|_| anyhow::anyhow!("auth.{name} out of range"))?;
    chrono::Duration::try_seconds(secs).ok_or_else(|| anyhow::anyhow!("auth.{name} out of range"))
}

pub fn build_refresh_token_engine(
    auth: &Auth,
    store: Arc<dyn RefreshTokenStore>,
) -> anyhow::Result<Arc<RefreshTokenEngine>> {
    Ok(Arc::new(RefreshTokenEngine::new(
        store,
        RefreshTokenConfig {
            ttl: secs(auth.refresh_ttl_secs, "refresh_ttl_secs")?,
            pepper: auth.refresh_token_pepper.clone().into_bytes(),
        },
    )))
}

pub fn build_auth_service(
    auth: &Auth,
    stores: Stores,
    refresh_tokens: Arc<RefreshTokenEngine>,
) -> anyhow::Result<RealAuthService> {
    let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
    let credential_verifier: Arc<dyn CredentialVerifier> = Arc::new(RepoCredentialVerifier::new(
        stores.user_repo.clone(),
        credential_hasher,
    ));

    let access_tokens: Arc<dyn AccessTokenIssuer> = Arc::new(JwtHs256Issuer::new(JwtConfig {
        issuer: auth.issuer.clone(),
        audience: auth.audience.clone(),
        access_ttl: secs(auth.access_ttl_secs, "access_ttl_secs")?,
        signing_key: auth.signing_key.clone().into_bytes(),
    }));

    let sessions = Arc::new(SessionRegistry::new(stores.sessions));
    let blacklist = Arc::new(TokenBlacklist::new(
        stores.blacklist,
        secs(auth.blacklist_fallback_ttl_secs, "blacklist_fallback_ttl_secs")?,
    ));

    Ok(RealAuthService::new(
        stores.user_repo,
        credential_verifier,
        access_tokens,
        refresh_tokens,
        sessions,
        blacklist,
    ))
}
