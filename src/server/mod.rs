mod refresh_token_sweeper;
mod server;

pub use refresh_token_sweeper::*;
pub use server::*;
