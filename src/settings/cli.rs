use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "sessionward", about = "Session and refresh-token service")]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(long)]
    pub settings: Option<String>,
}
