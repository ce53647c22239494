//! Walks one client through login, refresh, a replayed refresh and logout
//! against the in-memory backend.
//!
//! $ cargo run --bin protocol_demo

use chrono::Utc;
use sessionward::application_impl::Argon2PasswordHasher;
use sessionward::application_port::*;
use sessionward::domain_model::*;
use sessionward::infra_memory::MemoryUserRepo;
use sessionward::logger::*;
use sessionward::server::*;
use sessionward::settings::*;
use std::sync::Arc;

const DEMO_PASSWORD: &str = "demo-password";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new_bootstrap();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let users = Arc::new(MemoryUserRepo::new());
    users.insert(UserRecord {
        user_id: UserId(uuid::Uuid::new_v4()),
        email: "ada@example.com".into(),
        username: "ada".into(),
        password_hash: Argon2PasswordHasher.hash_password(DEMO_PASSWORD).await?,
        role: Role::User,
        status: UserStatus::Active,
        created_at: Utc::now(),
    });

    let server = Server::with_stores(&project_settings, Stores::in_memory(users), None)?;
    let auth = server.auth_service.clone();
    let laptop = ClientContext::new("203.0.113.10", "demo-laptop/1.0");

    let login = auth
        .login(LoginInput {
            identifier: "ada@example.com".into(),
            password: DEMO_PASSWORD.into(),
            client: laptop.clone(),
        })
        .await?;
    info!(session_id = %login.session_id, user = %login.user.username, "1. logged in");

    let first = login.tokens.refresh_token.clone();
    let rotated = auth
        .refresh(RefreshInput {
            refresh_token: first.clone(),
            client: laptop.clone(),
        })
        .await?;
    info!(expires_at = %rotated.access_token_expires_at, "2. refreshed, old refresh token is now spent");

    // Someone replays the spent token from elsewhere.
    let replay = auth
        .refresh(RefreshInput {
            refresh_token: first,
            client: ClientContext::new("198.51.100.66", "curl/8.0"),
        })
        .await;
    info!(result = ?replay.as_ref().err(), "3. replayed the spent token");

    // The legitimate successor died with the family.
    let successor = auth
        .refresh(RefreshInput {
            refresh_token: rotated.refresh_token.clone(),
            client: laptop.clone(),
        })
        .await;
    info!(result = ?successor.as_ref().err(), "4. successor after replay");

    let access_check = auth.verify_access_token(&rotated.access_token).await;
    info!(ok = access_check.is_ok(), "5. access token still verifies until it expires or is blacklisted");

    let outcome = auth
        .logout(LogoutInput {
            user_id: login.user.user_id,
            session_id: login.session_id,
            access_token: rotated.access_token.clone(),
            refresh_token: Some(rotated.refresh_token),
            logout_all: false,
        })
        .await?;
    info!(warnings = outcome.warnings.len(), "6. logged out");

    let after_logout = auth.verify_access_token(&rotated.access_token).await;
    info!(result = ?after_logout.err(), "7. access token after logout");

    server.shutdown().await;
    Ok(())
}
