//! Benchmark driver (C7, §4.5).
//!
//! Runs one workload at a time: builds its command template, spins up the
//! connection pool, drives the event loop to completion, and hands the
//! finished latency array to the reporter. Grounded in the top-level
//! dispatch loop of `roughenough-client::main` (resolve target, run, report,
//! match the error taxonomy onto a process exit code) generalized from a
//! single request/response exchange to a full workload run.

use std::net::ToSocketAddrs;
use std::time::Instant;

use crate::args::Args;
use crate::client::{Client, Counters};
use crate::clock::Clock;
use crate::error::BenchError;
use crate::eventloop::{EventLoop, RoundResult};
use crate::net::Target;
use crate::pool::ClientPool;
use crate::reporter::{build_report, OutputMode, Report};
use crate::templates::{TemplateConfig, Workload};

pub fn resolve_target(args: &Args) -> Result<Target, BenchError> {
    if let Some(path) = &args.socket {
        return Ok(Target::Unix(path.clone()));
    }
    let endpoint = format!("{}:{}", args.host, args.port);
    let addr = endpoint
        .to_socket_addrs()
        .map_err(|e| BenchError::Connect {
            endpoint: endpoint.clone(),
            source: e,
        })?
        .next()
        .ok_or_else(|| BenchError::Config(format!("could not resolve {endpoint}")))?;
    Ok(Target::Tcp(addr))
}

/// Workloads to run this invocation: the trailing literal command if one was
/// given, else `-t`'s selection, else the full default suite (§6).
pub fn selected_workloads(args: &Args) -> Vec<(String, Vec<u8>)> {
    if !args.command.is_empty() {
        return vec![(args.command.join(" "), Workload::custom(&args.command))];
    }

    let cfg = TemplateConfig::from_args(args);
    let workloads: Vec<Workload> = if args.tests.is_empty() {
        Workload::default_suite()
    } else {
        args.tests
            .iter()
            .filter_map(|name| {
                let parsed = Workload::parse(name);
                if parsed.is_none() {
                    tracing::warn!(test = %name, "unrecognized workload name, skipping");
                }
                parsed
            })
            .collect()
    };
    workloads
        .into_iter()
        .map(|w| (w.title().to_string(), w.build(&cfg)))
        .collect()
}

pub fn output_mode(args: &Args) -> OutputMode {
    if args.csv {
        OutputMode::Csv
    } else if args.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Verbose
    }
}

/// Runs every selected workload once (or forever, under `-l`), printing one
/// report per workload as it completes.
pub fn run(args: &Args, clock: &Clock) -> Result<(), BenchError> {
    let target = resolve_target(args)?;
    let workloads = selected_workloads(args);
    if workloads.is_empty() {
        return Err(BenchError::Config("no workloads selected".to_string()));
    }
    let mode = output_mode(args);

    loop {
        for (title, cmd_bytes) in &workloads {
            let report = run_workload(args, &target, clock, title, cmd_bytes)?;
            println!("{}", report.render(mode));
        }
        if !args.loop_forever {
            break;
        }
    }
    Ok(())
}

fn run_workload(
    args: &Args,
    target: &Target,
    clock: &Clock,
    title: &str,
    cmd_bytes: &[u8],
) -> Result<Report, BenchError> {
    // §8 boundary case: `requests = 0` prints an empty report and exits
    // immediately, without ever dialing out.
    if args.requests == 0 {
        return Ok(build_report(title, &mut [], args.maxlatency));
    }

    let mut counters = Counters {
        requests_issued: 0,
        requests_finished: 0,
        requests_target: args.requests,
    };
    let mut latencies = vec![-1i64; args.requests as usize];

    let mut event_loop = EventLoop::new().map_err(BenchError::Io)?;
    let mut pool = ClientPool::with_capacity(args.clients as usize);

    let cfg = TemplateConfig::from_args(args);
    let random_keys = args.random_slot_len().is_some();

    let mut construct = || {
        Client::construct(
            target,
            cmd_bytes,
            args.pipeline,
            args.dbnum,
            &cfg.key_prefix,
            cfg.slot_len,
            random_keys,
            args.idle,
            args.keepalive(),
        )
    };
    event_loop
        .replenish(&mut pool, args.clients as usize, &mut construct)
        .map_err(|e| BenchError::Connect {
            endpoint: args.endpoint_description(),
            source: e,
        })?;

    let report_progress = !(args.quiet || args.csv);
    let idle_mode = args.idle;
    let round_start = Instant::now();

    let result = event_loop.run(
        &mut pool,
        &mut counters,
        clock,
        &mut latencies,
        target,
        args.dbnum,
        args.show_errors,
        args.clients as usize,
        &mut construct,
        |counters, live| {
            if !report_progress {
                return;
            }
            if idle_mode {
                eprint!("\rclients: {live}");
            } else {
                let elapsed = round_start.elapsed().as_secs_f64();
                let rps = if elapsed > 0.0 {
                    counters.requests_finished as f64 / elapsed
                } else {
                    0.0
                };
                eprint!("\r{title}: {rps:.2} rps, {}/{} done", counters.requests_finished, counters.requests_target);
            }
        },
    )?;

    if report_progress {
        eprintln!();
    }

    match result {
        RoundResult::Finished => {}
        RoundResult::Aborted => {
            return Err(BenchError::Protocol(
                "all clients disconnected before the target request count was reached".to_string(),
            ))
        }
    }

    latencies.truncate(counters.requests_finished as usize);
    Ok(build_report(title, &mut latencies, args.maxlatency))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_skips_dns_resolution() {
        let mut args = Args::default_for_test();
        args.socket = Some("/tmp/resp-bench.sock".to_string());
        let target = resolve_target(&args).unwrap();
        matches!(target, Target::Unix(_));
    }

    #[test]
    fn tcp_host_resolves_to_an_addr() {
        let mut args = Args::default_for_test();
        args.host = "127.0.0.1".to_string();
        args.port = 6379;
        let target = resolve_target(&args).unwrap();
        assert!(matches!(target, Target::Tcp(_)));
    }

    #[test]
    fn custom_trailing_command_takes_priority_over_tests() {
        let mut args = Args::default_for_test();
        args.tests = vec!["ping".to_string()];
        args.command = vec!["GET".to_string(), "foo".to_string()];
        let workloads = selected_workloads(&args);
        assert_eq!(workloads.len(), 1);
        assert_eq!(workloads[0].0, "GET foo");
    }

    #[test]
    fn default_suite_has_every_workload() {
        let args = Args::default_for_test();
        let workloads = selected_workloads(&args);
        assert_eq!(workloads.len(), Workload::default_suite().len());
    }

    #[test]
    fn unknown_test_name_is_skipped_not_fatal() {
        let mut args = Args::default_for_test();
        args.tests = vec!["set".to_string(), "bogus".to_string()];
        let workloads = selected_workloads(&args);
        assert_eq!(workloads.len(), 1);
        assert_eq!(workloads[0].0, "SET");
    }

    #[test]
    fn zero_requests_short_circuits_without_connecting() {
        let mut args = Args::default_for_test();
        args.requests = 0;
        // An unroutable loopback port: if this path ever tried to dial out,
        // the connection attempt would hang or fail instead of returning
        // immediately.
        let target = Target::Tcp("127.0.0.1:1".parse().unwrap());
        let clock = Clock::new();
        let report = run_workload(&args, &target, &clock, "PING_INLINE", b"PING\r\n").unwrap();
        assert_eq!(report.requests_finished, 0);
    }
}
