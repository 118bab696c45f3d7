use std::sync::Arc;

use npipe_frame::{read_message, FrameError};
use npipe_transport::{PipeError, PipeHandle};

use crate::cmd::signal::StopOnInterrupt;
use crate::cmd::{timeout_arg, Context, ListenArgs};
use crate::exit::{frame_error, pipe_error, CliResult, STOPPED, SUCCESS};
use crate::output::{print_message, MessageMeta};

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let accept_timeout = timeout_arg("accept-timeout", args.accept_timeout)?;
    let read_timeout = timeout_arg("read-timeout", args.read_timeout)?;
    let name = ctx.resolve(&args.pipe)?;

    let interrupt = StopOnInterrupt::install()?;
    let listener = Arc::new(PipeHandle::create(&name).map_err(|err| pipe_error("create failed", err))?);
    interrupt.watch(&listener);

    let mut printed = 0usize;
    let mut connection = 0usize;

    loop {
        let conn = match listener.accept(accept_timeout) {
            Ok(conn) => Arc::new(conn),
            Err(PipeError::Stopped) => return Ok(STOPPED),
            Err(err) => return Err(pipe_error("accept failed", err)),
        };
        interrupt.watch(&conn);
        connection += 1;
        let peer_pid = conn.peer_credentials().map(|(_, _, pid)| pid);
        tracing::debug!(connection, ?peer_pid, "client connected");

        let mut sequence = 0usize;
        loop {
            let payload = match read_message(conn.as_ref(), read_timeout, &ctx.messages) {
                Ok(payload) => payload,
                Err(FrameError::Transport(PipeError::Disconnected)) => break,
                Err(FrameError::Transport(PipeError::Stopped)) => return Ok(STOPPED),
                Err(err) => return Err(frame_error("receive failed", err)),
            };
            sequence += 1;

            let meta = MessageMeta {
                pipe: &name,
                connection,
                sequence,
                peer_pid,
            };
            print_message(&payload, &meta, ctx.format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
        tracing::debug!(connection, messages = sequence, "client disconnected");
    }
}
