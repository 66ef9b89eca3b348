use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cairn",
    about = "cairn: content-addressed object graph store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configured store location
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a JSON document and print its root hash
    Put(PutArgs),
    /// Rebuild a stored document as JSON
    Get(GetArgs),
    /// Show local store statistics
    Stat,
    /// Serve the local store as a mirror over HTTP
    Serve(ServeArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct PutArgs {
    /// JSON file to store, or `-` for stdin
    pub file: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    pub hash: String,
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<String>,
    /// Require this bearer token on object requests
    #[arg(long)]
    pub api_key: Option<String>,
}
