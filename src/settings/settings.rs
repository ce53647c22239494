use crate::domain_model::Role;
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub store: Store,
    pub http: Http,
    pub log: Log,
}

#[derive(Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub blacklist_fallback_ttl_secs: u64,
    pub refresh_token_pepper: String,
    /// How often expired refresh tokens are deleted. 0 disables the sweep.
    #[serde(default)]
    pub purge_interval_secs: u64,
}

// Settings get logged at startup; keep the secrets out.
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_key", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("blacklist_fallback_ttl_secs", &self.blacklist_fallback_ttl_secs)
            .field("refresh_token_pepper", &"<redacted>")
            .field("purge_interval_secs", &self.purge_interval_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "redis_mysql"
    pub redis_dsn: Option<String>,
    pub mysql_dsn: Option<String>,
    pub key_prefix: String,
    /// Accounts created at startup on the memory backend.
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

#[derive(Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_seed_role")]
    pub role: Role,
}

fn default_seed_role() -> Role {
    Role::User
}

impl fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "SESSIONWARD";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    if settings.auth.signing_key.is_empty() {
        return Err(anyhow!("auth.signing_key must not be empty"));
    }
    if settings.auth.refresh_token_pepper.is_empty() {
        return Err(anyhow!("auth.refresh_token_pepper must not be empty"));
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_settings_parse() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        assert_eq!(settings.store.backend, "memory");
        assert!(settings.auth.access_ttl_secs < settings.auth.refresh_ttl_secs);
        assert!(settings.auth.purge_interval_secs > 0);
        assert_eq!(settings.store.seed_users.len(), 1);
        assert_eq!(settings.store.seed_users[0].role, Role::User);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        let printed = format!("{settings:?}");
        assert!(!printed.contains(&settings.auth.signing_key));
        assert!(!printed.contains(&settings.auth.refresh_token_pepper));
        assert!(!printed.contains(&settings.store.seed_users[0].password));
    }
}
