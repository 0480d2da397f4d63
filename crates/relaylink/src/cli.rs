//! Clap derive structures for the `relaylink` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// relaylink -- drive serial-attached WiFi radio modules
#[derive(Debug, Parser)]
#[command(
    name = "relaylink",
    version,
    about = "Drive serial-attached WiFi radio modules from the command line",
    long_about = "Scan, sniff and query WiFi radio modules attached over UART or USB serial.\n\n\
        Channels come from the config file; --port talks to a single device directly.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "RELAYLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Channel to use (defaults to the configured default)
    #[arg(long, short = 'c', env = "RELAYLINK_CHANNEL", global = true)]
    pub channel: Option<String>,

    /// Serial device to use directly, bypassing configured channels
    #[arg(long, short = 'p', env = "RELAYLINK_PORT", global = true)]
    pub port: Option<String>,

    /// Baud rate for --port
    #[arg(long, env = "RELAYLINK_BAUD", default_value_t = 115_200, global = true)]
    pub baud: u32,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RELAYLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List serial ports on this machine
    Ports,

    /// List configured channels
    #[command(alias = "ch")]
    Channels,

    /// Scan once and list nearby networks
    #[command(alias = "s")]
    Scan,

    /// Scan, then sniff for client stations until stopped
    #[command(alias = "o")]
    Observe(ObserveArgs),

    /// List SSIDs seen in probe requests
    Probes,

    /// List hosts seen by the module (IP and MAC)
    Hosts,

    /// Send a raw command line to the module
    Send(SendArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Subcommand Args ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ObserveArgs {
    /// Narrow sniffing to the network with this index
    #[arg(long, short = 'f')]
    pub focus: Option<u32>,

    /// Stop after this long (e.g. "90s", "5m"); runs until Ctrl-C otherwise
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Command line to send, e.g. `select_stations aa:bb:cc:dd:ee:ff`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
