mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use npipe_frame::{MessageConfig, DEFAULT_MAX_MESSAGE};
use npipe_transport::Namespace;

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "npipe", version, about = "Named-pipe IPC CLI")]
struct Cli {
    /// Root directory for pipe namespaces.
    #[arg(long, value_name = "DIR", env = "NPIPE_RUNTIME_DIR", global = true)]
    runtime_dir: Option<PathBuf>,

    /// Largest message accepted or sent, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_MESSAGE, global = true)]
    max_message_size: usize,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn context(&self) -> Context {
        let namespace = match &self.runtime_dir {
            Some(dir) if !dir.as_os_str().is_empty() => Namespace::new(dir),
            _ => Namespace::from_env(),
        };
        Context {
            namespace,
            messages: MessageConfig::with_max_message_size(self.max_message_size),
            format: self.format.unwrap_or_else(OutputFormat::default_for_stdout),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = cli.context();
    let result = cmd::run(cli.command, &ctx);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
