//! Two threads exchanging messages over a private pipe.
//!
//! Run with:
//!   cargo run --example chat
//!
//! To talk to it from the CLI instead, run `cargo run --features cli -- listen chat`
//! and `cargo run --features cli -- send chat --data hi`.

use std::sync::Arc;
use std::thread;

use npipe::{MessageExt, PipeHandle, Timeout, Visibility};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = PipeHandle::create_named("chat-example", Visibility::Private)?;
    eprintln!("Listening on {}", listener.name());

    let client = thread::spawn(|| -> Result<Vec<u8>, npipe::FrameError> {
        let conn = PipeHandle::open_named("chat-example", Visibility::Private)?;
        conn.write_message(b"hi")?;
        let reply = conn.read_message(Timeout::Infinite)?;
        conn.close()?;
        Ok(reply.to_vec())
    });

    let server = Arc::new(listener.accept(Timeout::Infinite)?);
    let msg = server.read_message(Timeout::Infinite)?;
    eprintln!("Server received {:?}", String::from_utf8_lossy(&msg));
    server.write_message(b"hello back")?;

    let reply = client.join().map_err(|_| "client thread panicked")??;
    eprintln!("Client received {:?}", String::from_utf8_lossy(&reply));

    server.close()?;
    listener.close()?;
    Ok(())
}
