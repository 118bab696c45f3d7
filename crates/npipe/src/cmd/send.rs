use std::fs;
use std::sync::Arc;

use npipe_frame::{read_message, write_message};
use npipe_transport::PipeHandle;

use crate::cmd::signal::StopOnInterrupt;
use crate::cmd::{timeout_arg, Context, SendArgs};
use crate::exit::{frame_error, pipe_error, CliResult, SUCCESS};
use crate::output::{print_message, MessageMeta};

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let wait_timeout = timeout_arg("wait-timeout", args.wait_timeout)?;
    let payload = resolve_payload(&args)?;
    let name = ctx.resolve(&args.pipe)?;

    let conn = Arc::new(PipeHandle::open(&name).map_err(|err| pipe_error("open failed", err))?);

    write_message(conn.as_ref(), &payload, &ctx.messages)
        .map_err(|err| frame_error("send failed", err))?;
    tracing::debug!(pipe = %name.short_name(), size = payload.len(), "message sent");

    if args.wait {
        let interrupt = StopOnInterrupt::install()?;
        interrupt.watch(&conn);

        let reply = read_message(conn.as_ref(), wait_timeout, &ctx.messages)
            .map_err(|err| frame_error("receive failed", err))?;
        let meta = MessageMeta {
            pipe: &name,
            connection: 1,
            sequence: 1,
            peer_pid: conn.peer_credentials().map(|(_, _, pid)| pid),
        };
        print_message(&reply, &meta, ctx.format);
    }

    conn.close().map_err(|err| pipe_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use crate::cmd::PipeArgs;

    use super::*;

    fn args(data: Option<&str>, file: Option<std::path::PathBuf>) -> SendArgs {
        SendArgs {
            pipe: PipeArgs {
                name: "x".to_string(),
                shared: false,
            },
            data: data.map(str::to_string),
            file,
            wait: false,
            wait_timeout: 5000,
        }
    }

    #[test]
    fn payload_defaults_to_empty() {
        assert!(resolve_payload(&args(None, None)).unwrap().is_empty());
    }

    #[test]
    fn payload_from_data_or_file() {
        assert_eq!(resolve_payload(&args(Some("hi"), None)).unwrap(), b"hi");

        let path = std::env::temp_dir().join(format!("npipe-send-{}", std::process::id()));
        fs::write(&path, b"\x00\x01binary").unwrap();
        assert_eq!(resolve_payload(&args(None, Some(path.clone()))).unwrap(), b"\x00\x01binary");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = resolve_payload(&args(None, Some("/nonexistent/npipe/payload".into()))).unwrap_err();
        assert!(err.message.starts_with("failed reading /nonexistent/npipe/payload"));
    }
}
