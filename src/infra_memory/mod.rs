//! `DashMap`-backed adapters. They back the `memory` store backend and every
//! test in the crate.

mod blacklist_store_memory;
mod refresh_token_store_memory;
mod session_store_memory;
mod user_repo_memory;

pub use blacklist_store_memory::*;
pub use refresh_token_store_memory::*;
pub use session_store_memory::*;
pub use user_repo_memory::*;
