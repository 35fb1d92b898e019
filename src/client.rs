//! Client state machine (C3, §3, §4.1–§4.3).
//!
//! One `Client` owns one `Connection` and the prebuilt output buffer for its
//! pipelined round. State transitions follow §4.1 exactly: WRITING issues
//! the body (randomizing key slots on the first byte of a new round),
//! switches to READING once the whole body has been written, and READING
//! consumes replies one at a time until the round's `pending` count reaches
//! zero.

use std::io;

use mio::event::Source;
use mio::Interest;

use crate::clock::Clock;
use crate::net::{Connection, Target};
use crate::rand_key::fill_random;
use crate::templates::select_command;

/// Outcome of a writable-readiness callback.
pub enum WriteOutcome {
    /// Write is either still in progress or has just completed; the caller
    /// should check `wants_read()` to decide whether to flip readiness.
    Progress,
    /// No more requests to issue; this client should be torn down quietly.
    NoMoreWork,
    /// `EPIPE`: dispose silently (§5, §7).
    BrokenPipe,
    /// Some other write error: dispose after logging.
    WriteError(io::Error),
}

/// Outcome of a readable-readiness callback.
pub enum ReadOutcome {
    /// More replies may be pending; keep waiting on readability.
    Pending,
    /// The round finished and keepalive is on: client was reset in place.
    RoundReset,
    /// The round finished and keepalive is off: caller must clone+replace.
    RoundReplace,
    /// `requests_finished == requests`: stop the event loop.
    TargetReached,
    /// A server error reply arrived (rate-limited display is the caller's job).
    ServerError,
    /// Read or framing error: fatal per §5/§7.
    Fatal(String),
}

/// Global progress counters (§3). Owned by the driver, passed by reference
/// to avoid the module-level mutable statics the source relies on (§9).
#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub requests_issued: u64,
    pub requests_finished: u64,
    pub requests_target: u64,
}

pub struct Client {
    conn: Connection,
    /// `[prefix?][body * pipeline]`
    buf: Vec<u8>,
    prefix_len: usize,
    prefix_pending: u32,
    written: usize,
    pending: u32,
    start_us: i64,
    latency_us: i64,
    rand_ptrs: Vec<(usize, usize)>,
    pipeline: u32,
    keepalive: bool,
    idle: bool,
    random_keys: bool,
}

impl Client {
    /// Constructs a Client from scratch (§4.3, "Constructing from a template").
    #[allow(clippy::too_many_arguments)]
    pub fn construct(
        target: &Target,
        cmd_bytes: &[u8],
        pipeline: u32,
        dbnum: u32,
        key_prefix: &str,
        slot_len: usize,
        random_keys: bool,
        idle: bool,
        keepalive: bool,
    ) -> io::Result<Client> {
        let conn = Connection::connect(target)?;

        let mut buf = Vec::new();
        let (prefix_len, prefix_pending) = if dbnum != 0 {
            let select = select_command(dbnum);
            buf.extend_from_slice(&select);
            (select.len(), 1)
        } else {
            (0, 0)
        };

        for _ in 0..pipeline {
            buf.extend_from_slice(cmd_bytes);
        }

        let rand_ptrs = if random_keys && slot_len > 0 {
            find_rand_slots(&buf, key_prefix.as_bytes(), slot_len)
        } else {
            Vec::new()
        };

        Ok(Client {
            conn,
            buf,
            prefix_len,
            prefix_pending,
            written: 0,
            pending: pipeline + prefix_pending,
            start_us: 0,
            latency_us: -1,
            rand_ptrs,
            pipeline,
            keepalive,
            idle,
            random_keys,
        })
    }

    /// Constructs a replacement Client by cloning `self`'s template onto a
    /// fresh connection (§4.3, "Constructing by cloning an existing Client").
    ///
    /// Precondition (upheld by round-termination logic, §4.1): `self` is
    /// only cloned once its round has completed, at which point its prefix
    /// has already been fully discarded (`prefix_len == 0`).
    pub fn clone_onto(&self, target: &Target, dbnum: u32) -> io::Result<Client> {
        debug_assert_eq!(self.prefix_len, 0, "clones never carry a pending prefix");

        let conn = Connection::connect(target)?;

        let mut buf = Vec::new();
        let (prefix_len, prefix_pending) = if dbnum != 0 {
            let select = select_command(dbnum);
            buf.extend_from_slice(&select);
            (select.len(), 1)
        } else {
            (0, 0)
        };
        buf.extend_from_slice(&self.buf);

        // Open question resolved (DESIGN NOTES §9): clones never append to
        // rand_ptrs, they only translate existing entries, so there is no
        // geometric-growth concern here to preserve.
        let rand_ptrs = self
            .rand_ptrs
            .iter()
            .map(|&(off, len)| (off + prefix_len, len))
            .collect();

        Ok(Client {
            conn,
            buf,
            prefix_len,
            prefix_pending,
            written: 0,
            pending: self.pipeline + prefix_pending,
            start_us: 0,
            latency_us: -1,
            rand_ptrs,
            pipeline: self.pipeline,
            keepalive: self.keepalive,
            idle: self.idle,
            random_keys: self.random_keys,
        })
    }

    pub fn register_interest(&mut self) -> &mut impl Source {
        self.conn.source()
    }

    pub fn wants_read(&self) -> bool {
        self.written == self.buf.len()
    }

    /// Readiness to register on construction: idle-mode clients never write,
    /// so they're registered for (never-firing) read readiness instead —
    /// mio requires a non-empty interest set (§4.3 step 5).
    pub fn initial_interest(&self) -> Interest {
        if self.idle {
            Interest::READABLE
        } else {
            Interest::WRITABLE
        }
    }

    /// Writable-readiness handler (§4.1 "Writable readiness").
    pub fn on_writable(&mut self, counters: &mut Counters, clock: &Clock) -> WriteOutcome {
        if self.written == 0 {
            if counters.requests_issued >= counters.requests_target {
                return WriteOutcome::NoMoreWork;
            }
            counters.requests_issued += self.pipeline as u64;

            if self.random_keys {
                for &(offset, len) in &self.rand_ptrs {
                    fill_random(&mut self.buf, offset, len);
                }
            }
            self.start_us = clock.now_us();
            self.latency_us = -1;
        }

        match self.conn.write(&self.buf[self.written..]) {
            Ok(n) => {
                self.written += n;
                WriteOutcome::Progress
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => WriteOutcome::Progress,
            Err(e) if is_broken_pipe(&e) => WriteOutcome::BrokenPipe,
            Err(e) => WriteOutcome::WriteError(e),
        }
    }

    /// Readable-readiness handler (§4.1 "Readable readiness").
    pub fn on_readable(
        &mut self,
        counters: &mut Counters,
        clock: &Clock,
        latencies: &mut [i64],
    ) -> ReadOutcome {
        if self.latency_us < 0 {
            self.latency_us = clock.now_us() - self.start_us;
        }

        match self.conn.fill_from_socket() {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return ReadOutcome::Fatal(format!("read error: {e}")),
        }

        let mut saw_error = false;

        loop {
            match self.conn.try_take_reply() {
                Ok(None) => {
                    return if saw_error {
                        ReadOutcome::ServerError
                    } else {
                        ReadOutcome::Pending
                    };
                }
                Ok(Some(reply)) => {
                    saw_error |= reply.is_error;

                    if self.prefix_pending > 0 {
                        self.ack_prefix_reply();
                    } else {
                        self.ack_body_reply(counters, latencies);
                    }

                    if self.pending == 0 {
                        return self.finish_round(counters);
                    }
                }
                Err(msg) => return ReadOutcome::Fatal(msg),
            }
        }
    }

    fn ack_prefix_reply(&mut self) {
        self.prefix_pending -= 1;
        self.pending -= 1;
        if self.prefix_pending == 0 && self.prefix_len > 0 {
            self.buf.drain(0..self.prefix_len);
            for ptr in &mut self.rand_ptrs {
                ptr.0 -= self.prefix_len;
            }
            self.prefix_len = 0;
        }
    }

    fn ack_body_reply(&mut self, counters: &mut Counters, latencies: &mut [i64]) {
        if counters.requests_finished < counters.requests_target {
            latencies[counters.requests_finished as usize] = self.latency_us;
            counters.requests_finished += 1;
        }
        self.pending -= 1;
    }

    fn finish_round(&mut self, counters: &Counters) -> ReadOutcome {
        if counters.requests_finished == counters.requests_target {
            return ReadOutcome::TargetReached;
        }
        if self.keepalive {
            self.reset_for_next_round();
            ReadOutcome::RoundReset
        } else {
            ReadOutcome::RoundReplace
        }
    }

    fn reset_for_next_round(&mut self) {
        self.written = 0;
        self.pending = self.pipeline;
        self.latency_us = -1;
    }
}

fn is_broken_pipe(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe || e.raw_os_error() == Some(libc::EPIPE)
}

/// Scans `buf` for every occurrence of `sentinel`, recording `(offset, len)`
/// pairs and advancing the scan by `len` bytes past each hit so adjacent
/// slots are found without re-scanning the randomization region itself
/// (§4.3 step 4).
fn find_rand_slots(buf: &[u8], sentinel: &[u8], len: usize) -> Vec<(usize, usize)> {
    let mut slots = Vec::with_capacity(8);
    let mut pos = 0;
    while pos + sentinel.len() <= buf.len() {
        if &buf[pos..pos + sentinel.len()] == sentinel {
            slots.push((pos, len));
            pos += len;
        } else {
            pos += 1;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_rand_slots_skips_past_each_hit() {
        let buf = b"SET key:__rand_int__ value:__rand_int__";
        let slots = find_rand_slots(buf, b"__rand_int__", 12);
        assert_eq!(slots, vec![(8, 12), (28, 12)]);
    }

    #[test]
    fn find_rand_slots_handles_padded_slots() {
        let buf = b"SET key:__rand_int__zzzzzzzz END";
        let slots = find_rand_slots(buf, b"__rand_int__", 20);
        assert_eq!(slots, vec![(8, 20)]);
    }
}
