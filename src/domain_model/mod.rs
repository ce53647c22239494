mod blacklist;
mod refresh_token;
mod session;
mod user;

pub use blacklist::*;
pub use refresh_token::*;
pub use session::*;
pub use user::*;
