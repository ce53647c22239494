use super::util::uuid_from_bytes;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const SELECT_USER: &str = r#"
SELECT user_id, email, username, password_hash, role, status, created_at
FROM user
"#;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, AuthError> {
        let user_id_bytes: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let user_id = UserId(uuid_from_bytes(&user_id_bytes)?);

        let email: String = row
            .try_get("email")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let username: String = row
            .try_get("username")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let role: String = row
            .try_get("role")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(UserRecord {
            user_id,
            email,
            username,
            password_hash,
            role: role.parse().map_err(AuthError::Store)?,
            status: status.parse().map_err(AuthError::Store)?,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        let row_opt = sqlx::query(&format!("{SELECT_USER} WHERE user_id = ?"))
            .bind(user_id.0.as_bytes().as_slice())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("query user by id: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        // `email` uses a case-insensitive collation.
        let row_opt = sqlx::query(&format!("{SELECT_USER} WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("query user by email: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let row_opt = sqlx::query(&format!("{SELECT_USER} WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("query user by username: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }
}
