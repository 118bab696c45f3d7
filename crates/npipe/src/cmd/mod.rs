use clap::{Args, Subcommand};
use std::path::PathBuf;

use npipe_frame::MessageConfig;
use npipe_transport::{Namespace, PipeName, Timeout, Visibility};

use crate::exit::{pipe_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod resolve;
pub mod send;
pub mod signal;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the fully-qualified name for a short pipe name.
    Resolve(ResolveArgs),
    /// Create a pipe and print every message received.
    Listen(ListenArgs),
    /// Create a pipe and echo every message back.
    Echo(EchoArgs),
    /// Send one message to a listening pipe.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every subcommand.
pub struct Context {
    pub namespace: Namespace,
    pub messages: MessageConfig,
    pub format: OutputFormat,
}

impl Context {
    pub fn resolve(&self, target: &PipeArgs) -> CliResult<PipeName> {
        self.namespace
            .resolve(&target.name, target.visibility())
            .map_err(|err| pipe_error("name resolution failed", err))
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Resolve(args) => resolve::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Echo(args) => echo::run(args, ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

/// Decode a signed-millisecond CLI timeout (`-1` waits forever).
pub fn timeout_arg(flag: &str, msecs: i64) -> CliResult<Timeout> {
    Timeout::from_msecs(msecs).map_err(|err| CliError::new(USAGE, format!("--{flag}: {err}")))
}

#[derive(Args, Debug)]
pub struct PipeArgs {
    /// Short pipe name.
    pub name: String,
    /// Use the shared namespace instead of the caller's private one.
    #[arg(long)]
    pub shared: bool,
}

impl PipeArgs {
    pub fn visibility(&self) -> Visibility {
        Visibility::from_private_flag(!self.shared)
    }
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub pipe: PipeArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub pipe: PipeArgs,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Milliseconds to wait for each client; -1 waits forever.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub accept_timeout: i64,
    /// Milliseconds to wait for each message; -1 waits forever.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub read_timeout: i64,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub pipe: PipeArgs,
    /// Exit after echoing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub pipe: PipeArgs,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Milliseconds to wait for the reply when --wait is set; -1 waits forever.
    #[arg(long, default_value_t = 5000, allow_negative_numbers = true)]
    pub wait_timeout: i64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
