//! Layered settings: a TOML file picked by build profile or `--settings`,
//! overridden by `SESSIONWARD__SECTION__KEY` environment variables.
//! `bin/settings_demo.rs` prints what gets loaded.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
