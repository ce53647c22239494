use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryUserRepo {
    users: DashMap<UserId, UserRecord>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.user_id, user);
    }

    /// Returns `false` when the user does not exist.
    pub fn set_status(&self, user_id: UserId, status: UserStatus) -> bool {
        match self.users.get_mut(&user_id) {
            Some(mut user) => {
                user.status = status;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, user_id: UserId) {
        self.users.remove(&user_id);
    }

    fn find_by<F>(&self, pred: F) -> Option<UserRecord>
    where
        F: Fn(&UserRecord) -> bool,
    {
        self.users
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.get(&user_id).map(|user| user.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.find_by(|user| user.email.eq_ignore_ascii_case(email)))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.find_by(|user| user.username == username))
    }
}
