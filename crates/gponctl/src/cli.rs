//! Clap derive structures for the `gponctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gponctl_core::{AlarmId, AlarmSeverity, Method, OltId};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// gponctl -- poll, reconcile and provision GPON access equipment
#[derive(Debug, Parser)]
#[command(
    name = "gponctl",
    version,
    about = "Poll GPON OLTs and manage their ONUs from the command line",
    long_about = "Polls GPON OLTs over SNMP, SSH or the vendor REST API, reconciles\n\
        the discovered ONUs into a local inventory and raises alarms when\n\
        subscriber units go offline.",
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
    #[arg(long, env = "GPONCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Inventory file (overrides the config file)
    #[arg(long, env = "GPONCTL_INVENTORY", global = true)]
    pub inventory: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "GPONCTL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
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

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the periodic poller until interrupted
    Run(RunArgs),

    /// Poll one OLT's status and performance
    Poll(PollArgs),

    /// Run a full poll and reconciliation for one OLT
    Sync(SyncArgs),

    /// Manage registered OLTs
    #[command(alias = "olt")]
    Olts(OltsArgs),

    /// Manage subscriber units
    #[command(alias = "onu")]
    Onus(OnusArgs),

    /// Inspect and resolve alarms
    #[command(alias = "alarm")]
    Alarms(AlarmsArgs),

    /// Manage the configuration file and credential key
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Polling ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Poll interval in seconds (overrides the config file)
    #[arg(long)]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct PollArgs {
    /// OLT id
    pub olt: OltId,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// OLT id
    pub olt: OltId,

    /// Transport used to enumerate units
    #[arg(long, short = 'm')]
    pub method: Option<Method>,
}

// ── OLTs ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OltsArgs {
    #[command(subcommand)]
    pub command: OltsCommand,
}

#[derive(Debug, Subcommand)]
#[allow(clippy::large_enum_variant)]
pub enum OltsCommand {
    /// List OLTs with status and gauges
    #[command(alias = "ls")]
    List,

    /// Show one OLT
    Show {
        /// OLT id
        olt: OltId,
    },

    /// Register an OLT
    Add(OltAddArgs),
}

#[derive(Debug, Args)]
pub struct OltAddArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Management address
    #[arg(long)]
    pub ip: String,

    #[arg(long)]
    pub hostname: Option<String>,

    #[arg(long, default_value = "ZTE")]
    pub vendor: String,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// SNMP version (2 or 3)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(2..=3))]
    pub snmp_version: u8,

    #[arg(long, default_value_t = 161)]
    pub snmp_port: u16,

    /// SNMP v2c community
    #[arg(long, env = "GPONCTL_SNMP_COMMUNITY", hide_env_values = true)]
    pub snmp_community: Option<String>,

    /// SNMP v3 user
    #[arg(long)]
    pub snmp_user: Option<String>,

    /// SNMP v3 passphrase
    #[arg(long, env = "GPONCTL_SNMP_PASSWORD", hide_env_values = true)]
    pub snmp_password: Option<String>,

    #[arg(long, default_value_t = 22)]
    pub ssh_port: u16,

    #[arg(long)]
    pub ssh_user: Option<String>,

    #[arg(long, env = "GPONCTL_SSH_PASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,

    /// Vendor REST base URL (defaults to http://<ip>:1661)
    #[arg(long)]
    pub api_endpoint: Option<String>,

    #[arg(long)]
    pub api_user: Option<String>,

    #[arg(long, env = "GPONCTL_API_PASSWORD", hide_env_values = true)]
    pub api_password: Option<String>,
}

// ── ONUs ─────────────────────────────────────────────────────────────

/// An ONU position on an OLT.
#[derive(Debug, Args)]
pub struct UnitArgs {
    /// OLT id
    pub olt: OltId,

    /// PON port
    pub port: u32,

    /// ONU index on the port
    pub onu: u32,

    /// Transport used for the device-side operation
    #[arg(long, short = 'm')]
    pub method: Option<Method>,
}

#[derive(Debug, Args)]
pub struct OnusArgs {
    #[command(subcommand)]
    pub command: OnusCommand,
}

#[derive(Debug, Subcommand)]
pub enum OnusCommand {
    /// List units from the inventory
    #[command(alias = "ls")]
    List {
        /// Only units on this OLT
        #[arg(long)]
        olt: Option<OltId>,
    },

    /// Provision a unit on the device and record it
    Provision {
        #[command(flatten)]
        unit: UnitArgs,

        /// Serial number
        serial: String,
    },

    /// Remove a unit from the device and the inventory
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        unit: UnitArgs,
    },

    /// Reboot a unit
    Reboot {
        #[command(flatten)]
        unit: UnitArgs,
    },

    /// Factory-reset a unit
    Reset {
        #[command(flatten)]
        unit: UnitArgs,
    },

    /// Replace a unit's serial number
    UpdateSerial {
        #[command(flatten)]
        unit: UnitArgs,

        /// New serial number
        serial: String,
    },

    /// Create or update the unit's PPPoE account
    Pppoe {
        #[command(flatten)]
        unit: UnitArgs,

        #[arg(long)]
        username: String,

        /// Prompted for when not given
        #[arg(long, env = "GPONCTL_PPPOE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[arg(long)]
        service_name: Option<String>,

        #[arg(long)]
        vlan: Option<u16>,
    },
}

// ── Alarms ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AlarmsArgs {
    #[command(subcommand)]
    pub command: AlarmsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AlarmsCommand {
    /// List alarms, newest first
    #[command(alias = "ls")]
    List {
        /// Only alarms that are still active
        #[arg(long)]
        active: bool,
    },

    /// Raise an alarm by hand
    Raise {
        /// critical, major, minor, warning or info
        #[arg(long, default_value = "warning")]
        severity: AlarmSeverity,

        /// Alarm type tag
        #[arg(long = "type", default_value = "manual")]
        alarm_type: String,

        #[arg(long)]
        message: String,

        #[arg(long)]
        details: Option<String>,

        /// OLT the alarm concerns
        #[arg(long)]
        olt: Option<OltId>,
    },

    /// Acknowledge an active alarm
    #[command(alias = "acknowledge")]
    Ack {
        /// Alarm id
        id: AlarmId,
    },

    /// Clear an alarm
    Clear {
        /// Alarm id
        id: AlarmId,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with the default settings
    Init,

    /// Show the effective configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Store the credential encryption key in the system keyring
    SetKey,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
