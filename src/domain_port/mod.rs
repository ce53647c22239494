// store

mod blacklist_store;
mod refresh_token_store;
mod session_store;

pub use blacklist_store::*;
pub use refresh_token_store::*;
pub use session_store::*;

// repo

mod user_repo;

pub use user_repo::*;
