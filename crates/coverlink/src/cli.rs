//! Clap derive structures for the `coverlink` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// coverlink -- local control harness for motorised window coverings
#[derive(Debug, Parser)]
#[command(
    name = "coverlink",
    version,
    about = "Inspect and exercise local-network window coverings",
    long_about = "Manage coverlink device configuration and drive cover entities\n\
        through the caching, retrying status layer against simulated devices.",
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
    /// Path to the configuration file
    #[arg(long, env = "COVERLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "COVERLINK_OUTPUT",
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
    /// YAML
    Yaml,
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
    /// Inspect configured cover entities
    #[command(alias = "c")]
    Covers(CoversArgs),

    /// Poll simulated devices the way a host would
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Covers ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CoversArgs {
    #[command(subcommand)]
    pub command: CoversCommand,
}

#[derive(Debug, Subcommand)]
pub enum CoversCommand {
    /// List every configured cover
    #[command(alias = "ls")]
    List {
        /// Only covers on this device
        #[arg(long, short = 'd')]
        device: Option<String>,
    },
}

// ── Simulate ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct SimulateArgs {
    /// Only simulate this device
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Number of polling rounds
    #[arg(long, short = 'n', default_value = "5")]
    pub ticks: u32,

    /// Delay between polling rounds in milliseconds
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Override the cache staleness window in milliseconds
    #[arg(long)]
    pub staleness_ms: Option<u64>,

    /// Open every cover before polling
    #[arg(long, group = "action")]
    pub open: bool,

    /// Close every cover before polling
    #[arg(long, group = "action")]
    pub close: bool,

    /// Stop every cover before polling
    #[arg(long, group = "action")]
    pub stop: bool,

    /// Move every cover to this position (0 = closed, 100 = open)
    #[arg(long, group = "action", allow_negative_numbers = true)]
    pub position: Option<i64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,

    /// Display the resolved configuration with secrets masked
    Show,

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
