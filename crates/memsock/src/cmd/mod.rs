use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use memsock_channel::{ChannelConfig, Role, DEFAULT_CAPACITY};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod create;
pub mod doctor;
pub mod echo;
pub mod inspect;
pub mod recv;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and initialize a channel file.
    Create(CreateArgs),
    /// Join a channel and write a payload to the peer.
    Send(SendArgs),
    /// Join a channel and print bytes sent by the peer.
    Recv(RecvArgs),
    /// Join a channel as server and echo client bytes back.
    Echo(EchoArgs),
    /// Print the control block of a channel file.
    Inspect(InspectArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Create(args) => create::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Recv(args) => recv::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Server,
    Client,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Server => Role::Server,
            RoleArg::Client => Role::Client,
        }
    }
}

/// Ring sizes; both peers must pass the same values.
#[derive(Args, Debug, Clone, Copy)]
pub struct CapacityArgs {
    /// Server→client ring capacity in bytes.
    #[arg(long, env = "MEMSOCK_SC_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub sc_capacity: u32,
    /// Client→server ring capacity in bytes.
    #[arg(long, env = "MEMSOCK_CS_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub cs_capacity: u32,
}

impl CapacityArgs {
    pub fn config(&self) -> ChannelConfig {
        ChannelConfig::with_capacities(self.sc_capacity, self.cs_capacity)
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Backing file path.
    pub path: PathBuf,
    #[command(flatten)]
    pub capacities: CapacityArgs,
    /// File permission bits, octal.
    #[arg(long, value_parser = parse_mode, default_value = "600")]
    pub mode: u32,
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("payload").required(true).args(["data", "file"]))]
pub struct SendArgs {
    /// Backing file path.
    pub path: PathBuf,
    /// Role to act as; data goes to the other side.
    #[arg(long)]
    pub role: RoleArg,
    #[command(flatten)]
    pub capacities: CapacityArgs,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for the peer to drain the ring (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct RecvArgs {
    /// Backing file path.
    pub path: PathBuf,
    /// Role to act as; data is read from the other side.
    #[arg(long)]
    pub role: RoleArg,
    #[command(flatten)]
    pub capacities: CapacityArgs,
    /// Wait for exactly this many bytes instead of taking what is pending.
    #[arg(long)]
    pub bytes: Option<usize>,
    /// Maximum time to wait for data (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Backing file path.
    pub path: PathBuf,
    #[command(flatten)]
    pub capacities: CapacityArgs,
    /// Exit after echoing this many bytes.
    #[arg(long)]
    pub limit: Option<u64>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Backing file path.
    pub path: PathBuf,
    /// Server→client ring capacity; the other ring is inferred from the file length.
    #[arg(long, env = "MEMSOCK_SC_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub sc_capacity: u32,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build target and compiled features.
    #[arg(long)]
    pub extended: bool,
}

/// Accepts `250ms`, `5s`, `2m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {input:?}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        other => Err(format!("unsupported duration unit: {other:?}")),
    }
}

/// Octal permission bits such as `600` or `0640`.
pub fn parse_mode(input: &str) -> Result<u32, String> {
    let digits = input.trim().trim_start_matches("0o");
    let mode =
        u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: {input:?}"))?;
    if mode > 0o7777 {
        return Err(format!("mode out of range: {input:?}"));
    }
    Ok(mode)
}

pub fn usage(message: impl Into<String>) -> CliError {
    CliError::new(USAGE, message)
}
