mod blacklist_store_redis;
mod session_store_redis;

pub use blacklist_store_redis::*;
pub use session_store_redis::*;
