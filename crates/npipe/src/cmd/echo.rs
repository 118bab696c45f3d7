use std::sync::Arc;

use npipe_frame::{read_message, write_message, FrameError};
use npipe_transport::{PipeError, PipeHandle, Timeout};

use crate::cmd::signal::StopOnInterrupt;
use crate::cmd::{Context, EchoArgs};
use crate::exit::{frame_error, pipe_error, CliError, CliResult, STOPPED, SUCCESS};

/// What to do after a failed receive.
#[derive(Debug)]
enum RecvErrorDisposition {
    NextClient,
    Interrupted,
    Fatal(CliError),
}

pub fn run(args: EchoArgs, ctx: &Context) -> CliResult<i32> {
    let name = ctx.resolve(&args.pipe)?;

    let interrupt = StopOnInterrupt::install()?;
    let listener = Arc::new(PipeHandle::create(&name).map_err(|err| pipe_error("create failed", err))?);
    interrupt.watch(&listener);

    let mut echoed = 0usize;

    loop {
        let conn = match listener.accept(Timeout::Infinite) {
            Ok(conn) => Arc::new(conn),
            Err(PipeError::Stopped) => return Ok(STOPPED),
            Err(err) => return Err(pipe_error("accept failed", err)),
        };
        interrupt.watch(&conn);

        loop {
            let payload = match read_message(conn.as_ref(), Timeout::Infinite, &ctx.messages) {
                Ok(payload) => payload,
                Err(err) => match classify_recv_error(err) {
                    RecvErrorDisposition::NextClient => break,
                    RecvErrorDisposition::Interrupted => return Ok(STOPPED),
                    RecvErrorDisposition::Fatal(cli_err) => return Err(cli_err),
                },
            };

            tracing::info!(pipe = %name.short_name(), size = payload.len(), "echoing message");

            match write_message(conn.as_ref(), &payload, &ctx.messages) {
                Ok(()) => {}
                Err(FrameError::Transport(PipeError::Disconnected)) => {
                    tracing::warn!("client left before the echo was written");
                    break;
                }
                Err(err) => return Err(frame_error("echo send failed", err)),
            }
            echoed = echoed.saturating_add(1);

            if args.count.is_some_and(|count| echoed >= count) {
                return Ok(SUCCESS);
            }
        }
    }
}

fn classify_recv_error(err: FrameError) -> RecvErrorDisposition {
    match err {
        FrameError::Transport(PipeError::Disconnected) => RecvErrorDisposition::NextClient,
        FrameError::Transport(PipeError::Stopped) => RecvErrorDisposition::Interrupted,
        // The stream is no longer aligned to message boundaries; drop the client.
        FrameError::MessageTooLarge { .. } => {
            tracing::warn!(error = %err, "dropping client");
            RecvErrorDisposition::NextClient
        }
        other => RecvErrorDisposition::Fatal(frame_error("receive failed", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_moves_to_next_client() {
        let disposition = classify_recv_error(FrameError::Transport(PipeError::Disconnected));
        assert!(matches!(disposition, RecvErrorDisposition::NextClient));
    }

    #[test]
    fn oversize_message_drops_client_only() {
        let disposition = classify_recv_error(FrameError::MessageTooLarge { size: 10, max: 1 });
        assert!(matches!(disposition, RecvErrorDisposition::NextClient));
    }

    #[test]
    fn stop_is_an_interrupt() {
        let disposition = classify_recv_error(FrameError::Transport(PipeError::Stopped));
        assert!(matches!(disposition, RecvErrorDisposition::Interrupted));
    }

    #[test]
    fn other_errors_are_fatal() {
        let disposition = classify_recv_error(FrameError::Transport(PipeError::Closed));
        assert!(matches!(disposition, RecvErrorDisposition::Fatal(_)));
    }
}
