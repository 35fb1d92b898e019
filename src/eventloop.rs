//! Event loop host (C5, §4.1, §4.8).
//!
//! Wraps a single `mio::Poll` and drives every live client's readiness
//! callbacks until the round's target request count is reached or the pool
//! runs dry with work still outstanding. Polls on a 250ms timeout so the
//! periodic progress ticker (§4.8) fires even when no socket is ready.
//! Grounded in `roughenough-server::backend::mio_backend::MioBackend::run`'s
//! poll/dispatch structure.

use std::time::{Duration, Instant};

use mio::{Events, Interest, Poll, Registry};

use crate::client::{Client, Counters, ReadOutcome, WriteOutcome};
use crate::error::BenchError;
use crate::net::Target;
use crate::pool::ClientPool;

const TICK: Duration = Duration::from_millis(250);

pub enum RoundResult {
    Finished,
    /// Pool emptied out before the target was reached — every connection
    /// failed or was reset and nothing replaced it (§4.8).
    Aborted,
}

/// Rate-limits the `-e` server-error log line to at most once per second.
pub struct ErrorThrottle {
    last_print_ms: i64,
}

impl ErrorThrottle {
    pub fn new() -> Self {
        ErrorThrottle { last_print_ms: i64::MIN }
    }

    fn should_print(&mut self, now_ms: i64) -> bool {
        if now_ms - self.last_print_ms >= 1000 {
            self.last_print_ms = now_ms;
            true
        } else {
            false
        }
    }
}

impl Default for ErrorThrottle {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventLoop {
    poll: Poll,
    events: Events,
}

impl EventLoop {
    pub fn new() -> std::io::Result<Self> {
        Ok(EventLoop {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
        })
    }

    pub fn registry(&self) -> &Registry {
        self.poll.registry()
    }

    /// Drives one full round (one workload's worth of requests) to
    /// completion. `on_tick` is invoked roughly every 250ms with the current
    /// counters and live client count, for progress reporting (§4.8).
    ///
    /// `numclients` is the pool's target size: whenever a poll turn leaves
    /// the live count below it (clients lost to write/read errors, or
    /// retired at the end of a non-keepalive round) and there is still work
    /// left to issue, the pool is topped back up the same way it was filled
    /// at startup (§4.4).
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        pool: &mut ClientPool,
        counters: &mut Counters,
        clock: &crate::clock::Clock,
        latencies: &mut [i64],
        target: &Target,
        dbnum: u32,
        show_errors: bool,
        numclients: usize,
        mut construct: impl FnMut() -> std::io::Result<Client>,
        mut on_tick: impl FnMut(&Counters, usize),
    ) -> Result<RoundResult, BenchError> {
        let mut error_throttle = ErrorThrottle::new();
        let mut last_tick = Instant::now();

        loop {
            if pool.live_count() == 0 && counters.requests_finished < counters.requests_target {
                return Ok(RoundResult::Aborted);
            }

            self.poll
                .poll(&mut self.events, Some(TICK))
                .map_err(BenchError::Io)?;

            // Clients that are done for good: no more work to issue, not a
            // candidate for reconnection.
            let mut to_remove = Vec::new();
            // Clients lost to a write/read failure, or that just finished a
            // round under keepalive=off: replaced with a fresh connection.
            let mut to_reconnect = Vec::new();
            let mut to_flip_read = Vec::new();
            let mut to_flip_write = Vec::new();

            for event in self.events.iter() {
                let token = event.token();

                if event.is_writable() {
                    if let Some(client) = pool.get_mut(token) {
                        match client.on_writable(counters, clock) {
                            WriteOutcome::Progress => {
                                if client.wants_read() {
                                    to_flip_read.push(token);
                                }
                            }
                            WriteOutcome::NoMoreWork => to_remove.push(token),
                            WriteOutcome::BrokenPipe => to_reconnect.push(token),
                            WriteOutcome::WriteError(e) => {
                                tracing::warn!(token = token.0, error = %e, "write error, reconnecting");
                                to_reconnect.push(token);
                            }
                        }
                    }
                } else if event.is_readable() {
                    if let Some(client) = pool.get_mut(token) {
                        match client.on_readable(counters, clock, latencies) {
                            ReadOutcome::Pending => {}
                            ReadOutcome::ServerError => {
                                if show_errors && error_throttle.should_print(clock.now_ms()) {
                                    tracing::warn!("server returned an error reply");
                                }
                            }
                            ReadOutcome::RoundReset => to_flip_write.push(token),
                            ReadOutcome::RoundReplace => to_reconnect.push(token),
                            ReadOutcome::TargetReached => return Ok(RoundResult::Finished),
                            ReadOutcome::Fatal(msg) => return Err(BenchError::Protocol(msg)),
                        }
                    }
                }
            }

            for token in to_flip_read {
                pool.reregister(self.poll.registry(), token, Interest::READABLE)?;
            }
            for token in to_flip_write {
                pool.reregister(self.poll.registry(), token, Interest::WRITABLE)?;
            }
            for token in to_remove {
                pool.remove(self.poll.registry(), token);
            }
            for token in to_reconnect {
                let cloned = pool.get_mut(token).map(|c| c.clone_onto(target, dbnum));
                pool.remove(self.poll.registry(), token);
                match cloned {
                    Some(Ok(new_client)) => {
                        pool.insert(self.poll.registry(), new_client)?;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "reconnect failed, will retry during replenishment");
                    }
                    None => {}
                }
            }

            // §4.4: whatever combination of failures and non-keepalive
            // completions happened above, top the pool back up rather than
            // letting it shrink for the rest of the run. Skipped once every
            // request has already been issued — the tail-end drain down to
            // zero live clients as the last rounds land is expected, not a
            // shortfall to recover from.
            if pool.live_count() < numclients && counters.requests_issued < counters.requests_target {
                if let Err(e) = self.replenish(pool, numclients, &mut construct) {
                    tracing::warn!(error = %e, "replenishment stalled, pool below target size");
                }
            }

            if last_tick.elapsed() >= TICK {
                last_tick = Instant::now();
                on_tick(counters, pool.live_count());
            }
        }
    }

    pub fn replenish(
        &self,
        pool: &mut ClientPool,
        target_count: usize,
        construct: impl FnMut() -> std::io::Result<Client>,
    ) -> std::io::Result<()> {
        crate::pool::replenish(pool, self.poll.registry(), target_count, construct)
    }
}
