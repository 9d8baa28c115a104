//! ABOUTME: Command-line argument surface for the demo binary

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "qa-cli",
    about = "Reads questions from stdin, one per line, and prints the router's reply envelope as JSON"
)]
pub struct Cli {
    /// Path to a TOML file overlaying the default `RouterConfig`.
    #[arg(long, env = "QA_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Session identifier all stdin questions are answered under.
    #[arg(long, default_value = "demo-session")]
    pub session: String,
}
