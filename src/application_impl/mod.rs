mod access_token_jwt;
mod auth_service_impl;
mod credential_hasher_argon2;
mod credential_verifier_impl;
mod refresh_token_engine;
mod session_registry;
mod token_blacklist;

pub use access_token_jwt::*;
pub use auth_service_impl::*;
pub use credential_hasher_argon2::*;
pub use credential_verifier_impl::*;
pub use refresh_token_engine::*;
pub use session_registry::*;
pub use token_blacklist::*;

#[cfg(test)]
pub(crate) mod test_support;
