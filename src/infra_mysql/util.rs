use crate::application_port::AuthError;
use sqlx::mysql::MySqlDatabaseError;
use uuid::Uuid;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

/// BINARY(16) column to UUID.
pub fn uuid_from_bytes(bytes: &[u8]) -> Result<Uuid, AuthError> {
    Uuid::from_slice(bytes).map_err(|e| AuthError::Store(format!("decode uuid column: {e}")))
}
