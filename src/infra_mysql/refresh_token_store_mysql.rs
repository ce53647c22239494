use super::util::{is_dup_key, uuid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const PURGE_BATCH: u64 = 5_000;

pub struct MySqlRefreshTokenStore {
    pool: MySqlPool,
}

impl MySqlRefreshTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokenStore { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshTokenRecord, AuthError> {
        let get_uuid = |column: &str| -> Result<uuid::Uuid, AuthError> {
            let bytes: Vec<u8> = row
                .try_get(column)
                .map_err(|e| AuthError::Store(e.to_string()))?;
            uuid_from_bytes(&bytes)
        };
        let user_id = UserId(get_uuid("user_id")?);
        let session_id = SessionId(get_uuid("session_id")?);
        let family_id = FamilyId(get_uuid("family_id")?);

        let token_hash: String = row
            .try_get("token_hash")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let parent_hash: Option<String> = row
            .try_get("parent_hash")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let issued_at: DateTime<Utc> = row
            .try_get("issued_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let ip: String = row
            .try_get("ip")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let user_agent: String = row
            .try_get("user_agent")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let used: bool = row
            .try_get("used")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let revoked: bool = row
            .try_get("revoked")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(RefreshTokenRecord {
            token_hash: TokenHash(token_hash),
            user_id,
            session_id,
            family_id,
            parent_hash: parent_hash.map(TokenHash),
            issued_at,
            expires_at,
            ip,
            user_agent,
            used,
            revoked,
        })
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MySqlRefreshTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        let res = sqlx::query(
            r#"
INSERT INTO refresh_token
    (token_hash, user_id, session_id, family_id, parent_hash,
     issued_at, expires_at, ip, user_agent, used, revoked)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, FALSE)
"#,
        )
        .bind(&record.token_hash.0)
        .bind(record.user_id.0.as_bytes().as_slice())
        .bind(record.session_id.0.as_bytes().as_slice())
        .bind(record.family_id.0.as_bytes().as_slice())
        .bind(record.parent_hash.as_ref().map(|hash| hash.0.as_str()))
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(&record.ip)
        .bind(&record.user_agent)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) if is_dup_key(&e) => Err(AuthError::Store(
                "insert refresh token: duplicate token hash".to_string(),
            )),
            Err(e) => Err(AuthError::Store(format!("insert refresh token: {e}"))),
        }
    }

    async fn get(&self, token_hash: &TokenHash) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT token_hash, user_id, session_id, family_id, parent_hash,
       issued_at, expires_at, ip, user_agent, used, revoked
FROM refresh_token
WHERE token_hash = ?
"#,
        )
        .bind(&token_hash.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("query refresh token: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn mark_used(&self, token_hash: &TokenHash) -> Result<bool, AuthError> {
        // One conditional update; the affected-row count tells who won.
        let res = sqlx::query(
            r#"
UPDATE refresh_token
SET used = TRUE, used_at = ?
WHERE token_hash = ? AND used = FALSE AND revoked = FALSE
"#,
        )
        .bind(Utc::now())
        .bind(&token_hash.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("mark refresh token used: {e}")))?;

        Ok(res.rows_affected() == 1)
    }

    async fn revoke_family(&self, family_id: FamilyId) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_token SET revoked = TRUE WHERE family_id = ?")
            .bind(family_id.0.as_bytes().as_slice())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("revoke refresh family: {e}")))?;

        Ok(())
    }

    async fn revoke_user(&self, user_id: UserId) -> Result<u64, AuthError> {
        let res = sqlx::query(
            "UPDATE refresh_token SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE",
        )
        .bind(user_id.0.as_bytes().as_slice())
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("revoke user refresh tokens: {e}")))?;

        Ok(res.rows_affected())
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut purged = 0;
        // Deletes in batches of `PURGE_BATCH` rows.
        loop {
            let res = sqlx::query("DELETE FROM refresh_token WHERE expires_at < ? LIMIT ?")
                .bind(before)
                .bind(PURGE_BATCH)
                .execute(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("purge expired refresh tokens: {e}")))?;

            purged += res.rows_affected();
            if res.rows_affected() < PURGE_BATCH {
                return Ok(purged);
            }
        }
    }
}
