use super::{SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one refresh-token lineage, started at login.
#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct FamilyId(pub uuid::Uuid);

impl FamilyId {
    pub fn new_random() -> Self {
        FamilyId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex-encoded keyed hash of a raw refresh token. This is the only form of a
/// refresh token that ever reaches storage.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TokenHash(pub String);

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RefreshTokenState {
    Issued,
    Used,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RefreshTokenRecord {
    pub token_hash: TokenHash,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub family_id: FamilyId,
    pub parent_hash: Option<TokenHash>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    pub used: bool,
    pub revoked: bool,
}

impl RefreshTokenRecord {
    /// Expiry wins over revocation, revocation over consumption. A token past
    /// `expires_at` is dead whatever happened to it before.
    pub fn state_at(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if now > self.expires_at {
            RefreshTokenState::Expired
        } else if self.revoked {
            RefreshTokenState::Revoked
        } else if self.used {
            RefreshTokenState::Used
        } else {
            RefreshTokenState::Issued
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(used: bool, revoked: bool) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            token_hash: TokenHash("h".into()),
            user_id: UserId(uuid::Uuid::nil()),
            session_id: SessionId(uuid::Uuid::nil()),
            family_id: FamilyId(uuid::Uuid::nil()),
            parent_hash: None,
            issued_at: now,
            expires_at: now + Duration::hours(1),
            ip: String::new(),
            user_agent: String::new(),
            used,
            revoked,
        }
    }

    #[test]
    fn expiry_takes_precedence_over_every_other_state() {
        for (used, revoked) in [(false, false), (true, false), (false, true), (true, true)] {
            let record = record(used, revoked);
            let later = record.expires_at + Duration::seconds(1);
            assert_eq!(record.state_at(later), RefreshTokenState::Expired);
        }
    }

    #[test]
    fn revocation_takes_precedence_over_consumption() {
        let revoked = record(true, true);
        assert_eq!(revoked.state_at(revoked.issued_at), RefreshTokenState::Revoked);
        let used = record(true, false);
        assert_eq!(used.state_at(used.issued_at), RefreshTokenState::Used);
    }
}
