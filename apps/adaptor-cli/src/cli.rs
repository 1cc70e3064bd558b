//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "adaptor",
    about = "Push document ids from a listing to a search appliance",
    version,
    long_about = "Reads document ids from listing files, renders them into XML feeds \
                  and posts the feeds to the appliance's feed endpoint with retry."
)]
pub struct Args {
    /// Path to configuration file (TOML, YAML or JSON); environment
    /// variables prefixed with ADAPTOR__ override it
    #[arg(short, long, env = "ADAPTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listing of every document id, one per line
    #[arg(long, env = "ADAPTOR_LISTING", default_value = "doc-ids.txt")]
    pub listing: PathBuf,

    /// Listing of changed document ids for incremental pushes
    #[arg(long, env = "ADAPTOR_MODIFIED_LISTING")]
    pub modified: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON log format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// Print the push journal as JSON when the command finishes
    #[arg(long)]
    pub stats: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Push every document id in the listing once
    PushFull,

    /// Push the modified listing once
    PushIncremental,

    /// Run full and incremental pushes on their schedules until interrupted
    Run,

    /// Render the listing into feed files without sending them
    Render {
        /// Directory for the rendered feeds; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

impl Args {
    pub fn validate(&self) -> anyhow::Result<()> {
        if matches!(self.command, Command::PushIncremental) && self.modified.is_none() {
            anyhow::bail!("push-incremental needs --modified <FILE>");
        }
        Ok(())
    }
}
