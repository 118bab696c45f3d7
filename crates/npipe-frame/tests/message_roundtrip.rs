#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use npipe_frame::{read_message, write_message, FrameError, MessageConfig, MessageExt};
use npipe_transport::{Namespace, PipeHandle, Timeout, Visibility};

fn test_namespace(tag: &str) -> Namespace {
    Namespace::new(PathBuf::from(format!(
        "/tmp/npf-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .subsec_nanos()
    )))
}

/// Removes the namespace root when dropped.
struct RootGuard(PathBuf);

impl Drop for RootGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

struct Fixture {
    _listener: PipeHandle,
    server: PipeHandle,
    client: PipeHandle,
    _root: RootGuard,
}

impl Fixture {
    fn new(tag: &str) -> Self {
        let ns = test_namespace(tag);
        let name = ns.resolve("chat", Visibility::Private).unwrap();
        let listener = PipeHandle::create(&name).unwrap();
        let client = PipeHandle::open(&name).unwrap();
        let server = listener.accept(Timeout::Infinite).unwrap();
        Self {
            _listener: listener,
            server,
            client,
            _root: RootGuard(ns.root().to_path_buf()),
        }
    }
}

#[test]
fn chat_scenario() {
    let fx = Fixture::new("chat");

    fx.client.write_message(b"hi").unwrap();
    let msg = fx.server.read_message(Timeout::Infinite).unwrap();
    assert_eq!(msg.as_ref(), b"hi");

    fx.server.close().unwrap();
    fx.client.close().unwrap();
}

#[test]
fn payloads_of_varied_sizes_round_trip() {
    let fx = Fixture::new("sizes");
    let server = Arc::new(fx.server);

    let sizes = [0usize, 1, 4, 4095, 64 * 1024, 1024 * 1024];
    let reader = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            sizes
                .iter()
                .map(|_| server.read_message(Timeout::After(Duration::from_secs(10))))
                .collect::<Result<Vec<_>, _>>()
        })
    };

    for &size in &sizes {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        fx.client.write_message(&payload).unwrap();
    }

    let received = reader.join().unwrap().unwrap();
    for (msg, &size) in received.iter().zip(&sizes) {
        assert_eq!(msg.len(), size);
        assert!(msg.iter().enumerate().all(|(i, b)| *b == (i % 251) as u8));
    }
}

#[test]
fn payload_phase_gets_its_own_timeout() {
    let fx = Fixture::new("phases");
    let client = Arc::new(fx.client);

    // Header arrives 200ms in, payload 200ms later: past 300ms from the
    // start of the call but within 300ms of the header.
    let writer = {
        let client = Arc::clone(&client);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            client.write(&[0, 0, 0, 3]).unwrap();
            thread::sleep(Duration::from_millis(200));
            client.write(b"abc").unwrap();
        })
    };

    let start = Instant::now();
    let msg = fx
        .server
        .read_message(Timeout::After(Duration::from_millis(300)))
        .unwrap();
    assert_eq!(msg.as_ref(), b"abc");
    assert!(start.elapsed() >= Duration::from_millis(300));
    writer.join().unwrap();
}

#[test]
fn read_message_times_out_without_data() {
    let fx = Fixture::new("timeout");
    let err = fx
        .server
        .read_message(Timeout::After(Duration::from_millis(50)))
        .unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn stop_interrupts_read_message() {
    let fx = Fixture::new("stop");
    let server = Arc::new(fx.server);

    let reader = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.read_message(Timeout::Infinite))
    };
    thread::sleep(Duration::from_millis(50));
    server.stop().unwrap();

    let err = reader.join().unwrap().unwrap_err();
    assert!(err.is_stopped());
    server.close().unwrap();
}

#[test]
fn configured_limit_applies_on_both_ends() {
    let fx = Fixture::new("limit");
    let config = MessageConfig::with_max_message_size(8);

    let err = write_message(&fx.client, b"nine bytes", &config).unwrap_err();
    assert!(matches!(err, FrameError::MessageTooLarge { .. }));

    fx.client.write_message(b"nine bytes").unwrap();
    let err = read_message(&fx.server, Timeout::Infinite, &config).unwrap_err();
    assert!(matches!(err, FrameError::MessageTooLarge { size: 10, max: 8 }));
}
