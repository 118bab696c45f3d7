//! Cancel a blocked read from another thread with `stop`.
//!
//! Run with:
//!   cargo run --example cancel-read

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use npipe::{PipeHandle, Timeout, Visibility};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = PipeHandle::create_named("cancel-example", Visibility::Private)?;
    let _client = PipeHandle::open_named("cancel-example", Visibility::Private)?;
    let server = Arc::new(listener.accept(Timeout::Infinite)?);

    let stopper = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            server.stop()
        })
    };

    let start = Instant::now();
    let mut buf = [0u8; 64];
    match server.read(&mut buf, Timeout::Infinite) {
        Err(err) if err.is_stopped() => {
            eprintln!("Read stopped after {:?}", start.elapsed());
        }
        other => eprintln!("Unexpected read outcome: {other:?}"),
    }

    stopper.join().map_err(|_| "stopper thread panicked")??;
    server.close()?;
    Ok(())
}
