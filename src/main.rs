use clap::Parser;
use tracing::{debug, error};

use resp_bench::args::Args;
use resp_bench::clock::Clock;
use resp_bench::driver;
use resp_bench::error::BenchError;

fn main() {
    let args = Args::parse();

    enable_logging(&args);
    debug!("command line: {:?}", args);

    ignore_sigpipe_and_sighup();

    let clock = Clock::new();
    driver::run(&args, &clock).unwrap_or_else(|e| {
        error!("{e}");
        std::process::exit(exit_code(&e));
    });
}

/// `SIGPIPE`'s default disposition kills the process; ignoring it lets a
/// write to a closed socket surface as `EPIPE` instead (§5, §9). `SIGHUP`
/// is ignored too so a dropped controlling terminal doesn't abort a run.
fn ignore_sigpipe_and_sighup() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        libc::signal(libc::SIGHUP, libc::SIG_IGN);
    }
}

fn exit_code(err: &BenchError) -> i32 {
    match err {
        BenchError::Config(_) => 1,
        BenchError::Connect { .. } => 1,
        BenchError::Io(_) => 1,
        BenchError::Protocol(_) => 1,
    }
}

fn enable_logging(args: &Args) {
    let mut builder = tracing_subscriber::fmt().compact();

    builder = if args.quiet {
        builder.with_max_level(tracing::Level::ERROR)
    } else {
        builder.with_max_level(tracing::Level::INFO)
    };

    builder.init();
}
