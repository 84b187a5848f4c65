use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use evlog_types::LogId;

#[derive(Parser)]
#[command(
    name = "evlog",
    about = "Event log service: publish stored event logs on the bus and manage them",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file naming the socket, records root, and service
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bus socket to serve on or connect to (overrides the configuration)
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the event log daemon
    Serve(ServeArgs),
    /// Submit a new event log as the host
    Submit(SubmitArgs),
    /// Submit the canned test event log
    Test,
    /// List every published event log
    List,
    /// Show one event log
    Show(LogArgs),
    /// Delete one event log
    Delete(LogArgs),
    /// Delete every event log
    Clear,
    /// Print event logs as they are added and removed
    Watch,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Directory holding stored logs (overrides the configuration)
    #[arg(long)]
    pub storage: Option<PathBuf>,
}

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(short, long)]
    pub message: String,
    #[arg(short, long)]
    pub severity: String,
    /// Affected resource path(s)
    #[arg(short, long)]
    pub association: String,
    /// Debug data as hex, e.g. `30ff`
    #[arg(long)]
    pub data: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    pub log_id: LogId,
}
