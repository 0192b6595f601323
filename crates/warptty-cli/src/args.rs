//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

/// Game proxy daemon: sits between a terminal client and the game
/// server, watching the stream and running scripted actions on demand.
#[derive(Debug, Parser)]
#[command(name = "warptty", version)]
pub struct Cli {
    /// Address of the game server to dial
    #[arg(short, long, default_value = "localhost:2300", value_name = "HOST:PORT")]
    pub game: String,

    /// Address to listen on for the terminal client
    #[arg(short, long, default_value = "127.0.0.1:5555", value_name = "ADDR")]
    pub listen: String,

    /// Data directory for persistent stores (defaults to WARPTTY_DATA_DIR,
    /// then ~/.warptty, then the system temp dir)
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}
