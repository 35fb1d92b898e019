//! End-to-end scenarios against a mock RESP server (§8).
//!
//! The mock replies `+OK\r\n` to every request it parses, inline or
//! multibulk, and records enough about what it saw (command count, distinct
//! connections, raw SET key bytes) for each scenario's assertion. Modeled on
//! `server::tests::network_resilience_tests`'s real-socket, background-thread
//! style rather than mocking the transport.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use resp_bench::args::Args;
use resp_bench::clock::Clock;
use resp_bench::driver;

struct MockServer {
    port: u16,
    commands_seen: Arc<AtomicUsize>,
    connections_accepted: Arc<AtomicUsize>,
    captured_sets: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockServer {
    fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let commands_seen = Arc::new(AtomicUsize::new(0));
        let connections_accepted = Arc::new(AtomicUsize::new(0));
        let captured_sets = Arc::new(Mutex::new(Vec::new()));

        let commands_seen_bg = commands_seen.clone();
        let connections_accepted_bg = connections_accepted.clone();
        let captured_sets_bg = captured_sets.clone();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                connections_accepted_bg.fetch_add(1, Ordering::SeqCst);
                let commands_seen = commands_seen_bg.clone();
                let captured_sets = captured_sets_bg.clone();
                thread::spawn(move || serve_connection(stream, commands_seen, captured_sets));
            }
        });

        MockServer {
            port,
            commands_seen,
            connections_accepted,
            captured_sets,
        }
    }

    fn commands_seen(&self) -> usize {
        self.commands_seen.load(Ordering::SeqCst)
    }

    fn connections_accepted(&self) -> usize {
        self.connections_accepted.load(Ordering::SeqCst)
    }
}

fn serve_connection(mut stream: TcpStream, commands_seen: Arc<AtomicUsize>, captured_sets: Arc<Mutex<Vec<Vec<u8>>>>) {
    stream.set_read_timeout(Some(Duration::from_millis(500))).ok();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                if buf.is_empty() {
                    continue;
                }
            }
            Err(_) => break,
        }

        let mut consumed = 0;
        while let Some(len) = next_command_len(&buf[consumed..]) {
            let command = &buf[consumed..consumed + len];
            if command.windows(4).any(|w| w.eq_ignore_ascii_case(b"SET\r")) {
                captured_sets.lock().unwrap().push(command.to_vec());
            }
            commands_seen.fetch_add(1, Ordering::SeqCst);
            if stream.write_all(b"+OK\r\n").is_err() {
                return;
            }
            consumed += len;
        }
        buf.drain(0..consumed);
    }
}

/// Finds the byte length of one complete request at the front of `buf`:
/// either a RESP multibulk array, or (for `PING_INLINE`) a bare line.
fn next_command_len(buf: &[u8]) -> Option<usize> {
    if buf.is_empty() {
        return None;
    }
    if buf[0] != b'*' {
        return buf.windows(2).position(|w| w == b"\r\n").map(|i| i + 2);
    }

    let line_end = buf.windows(2).position(|w| w == b"\r\n")? + 2;
    let count: usize = std::str::from_utf8(&buf[1..line_end - 2]).ok()?.parse().ok()?;
    let mut pos = line_end;
    for _ in 0..count {
        if buf.get(pos)? != &b'$' {
            return None;
        }
        let bulk_line_end = buf[pos..].windows(2).position(|w| w == b"\r\n")? + pos + 2;
        let bulk_len: usize = std::str::from_utf8(&buf[pos + 1..bulk_line_end - 2]).ok()?.parse().ok()?;
        let total = bulk_line_end + bulk_len + 2;
        if pos + (total - pos) > buf.len() {
            return None;
        }
        pos = bulk_line_end + bulk_len + 2;
    }
    if pos > buf.len() {
        None
    } else {
        Some(pos)
    }
}

fn args_for(extra: &[&str], port: u16) -> Args {
    let mut argv = vec!["resp-bench", "-h", "127.0.0.1", "-p"];
    let port_str = port.to_string();
    argv.push(&port_str);
    argv.extend_from_slice(extra);
    Args::parse_from(argv)
}

#[test]
fn scenario_1_ping_count() {
    let server = MockServer::spawn();
    let args = args_for(&["-n", "100", "-c", "1", "-P", "1", "-t", "ping_inline"], server.port);
    let clock = Clock::new();

    driver::run(&args, &clock).expect("benchmark run should succeed");
    thread::sleep(Duration::from_millis(100));

    assert_eq!(server.commands_seen(), 100);
}

#[test]
fn scenario_2_pipelined_set_distributed_across_connections() {
    let server = MockServer::spawn();
    let args = args_for(
        &["-n", "1000", "-c", "10", "-P", "10", "-t", "set", "-d", "16"],
        server.port,
    );
    let clock = Clock::new();

    driver::run(&args, &clock).expect("benchmark run should succeed");
    thread::sleep(Duration::from_millis(100));

    assert_eq!(server.commands_seen(), 1000);
    assert!(server.connections_accepted() >= 1 && server.connections_accepted() <= 10);
}

#[test]
fn scenario_3_select_prefix_is_not_counted_as_a_reply() {
    let server = MockServer::spawn();
    let args = args_for(&["-n", "10", "--dbnum", "3", "-t", "get"], server.port);
    let clock = Clock::new();

    driver::run(&args, &clock).expect("benchmark run should succeed");
    thread::sleep(Duration::from_millis(100));

    // One SELECT per connection plus 10 GETs: the driver only records the 10
    // GET latencies, but the server still saw the extra SELECT traffic.
    assert!(server.commands_seen() >= 10 + 1);
}

#[test]
fn scenario_4_random_keys_vary_between_rounds() {
    let server = MockServer::spawn();
    let args = args_for(&["-r", "1000", "-n", "1000", "-t", "set", "-c", "1"], server.port);
    let clock = Clock::new();

    driver::run(&args, &clock).expect("benchmark run should succeed");
    thread::sleep(Duration::from_millis(100));

    let captured = server.captured_sets.lock().unwrap();
    let unique: std::collections::HashSet<_> = captured.iter().collect();
    assert!(
        unique.len() > 1,
        "expected random keys to vary across rounds, saw {} unique of {} samples",
        unique.len(),
        captured.len()
    );
}

#[test]
fn scenario_5_idle_mode_holds_connections_open_without_writing() {
    let server = MockServer::spawn();
    let args = args_for(&["-I", "-c", "20"], server.port);
    let clock = Clock::new();

    thread::spawn(move || {
        // Idle mode never reaches a target request count, so this run is
        // expected to loop forever; the test only cares that it gets far
        // enough to open every connection without writing anything.
        let _ = driver::run(&args, &clock);
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline && server.connections_accepted() < 20 {
        thread::sleep(Duration::from_millis(20));
    }

    assert_eq!(server.connections_accepted(), 20);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(
        server.commands_seen(),
        0,
        "idle-mode clients must never write a command"
    );
}

#[test]
fn scenario_6_csv_mode_runs_clean() {
    let server = MockServer::spawn();
    let args = args_for(&["-n", "5", "-c", "1", "-t", "ping_inline", "--csv"], server.port);
    let clock = Clock::new();

    driver::run(&args, &clock).expect("benchmark run should succeed");
    thread::sleep(Duration::from_millis(100));

    assert_eq!(server.commands_seen(), 5);
}
