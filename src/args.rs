use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Telegram bot tracking a per-user MMR")]
pub struct Cli {
    /// Keep scores in memory instead of Postgres (lost on exit)
    #[arg(short, long)]
    pub memory: bool,

    /// Dotenv file to load instead of `./.env`
    #[arg(short, long)]
    pub env_file: Option<PathBuf>,

    /// Don't start the liveness HTTP endpoint
    #[arg(long)]
    pub no_health: bool,
}

pub fn parse_cli_args() -> Cli {
    Cli::parse()
}
