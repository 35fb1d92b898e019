//! Command-line configuration (C9).
//!
//! One `clap::Parser` struct, flags matching spec §6 exactly. Mirrors the
//! shape of `roughenough-server::args::Args` / `roughenough-client::args::Args`:
//! short+long flags, inline defaults, a couple of derived helper methods.

use clap::Parser;

pub const DEFAULT_KEY_PREFIX: &str = "__rand_int__";

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Pipelined RESP request/response load generator")]
pub struct Args {
    /// TCP host to connect to
    #[arg(short = 'h', long, default_value = "127.0.0.1")]
    pub host: String,

    /// TCP port to connect to
    #[arg(short = 'p', long, default_value_t = 6379)]
    pub port: u16,

    /// UNIX socket path; overrides host/port
    #[arg(short = 's', long)]
    pub socket: Option<String>,

    /// Number of parallel connections
    #[arg(short = 'c', long, default_value_t = 50)]
    pub clients: u32,

    /// Total number of requests
    #[arg(short = 'n', long, default_value_t = 100_000)]
    pub requests: u64,

    /// Keep connections alive between rounds (0 or 1)
    #[arg(short = 'k', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub keepalive: u8,

    /// Payload size in bytes for commands carrying a value
    #[arg(short = 'd', long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..=1_073_741_824))]
    pub datasize: u64,

    /// Pipeline depth: commands written back-to-back per round
    #[arg(short = 'P', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pipeline: u32,

    /// Enable random keys; argument is the randomization slot length
    #[arg(short = 'r', long = "randomkeys", value_name = "N")]
    pub random_keys: Option<u32>,

    /// Quiet: print only the total throughput per workload
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// CSV output: one quoted "title","rps" row per workload
    #[arg(long)]
    pub csv: bool,

    /// Loop the selected workloads forever
    #[arg(short = 'l', long)]
    pub loop_forever: bool,

    /// Idle mode: open connections and never write
    #[arg(short = 'I', long)]
    pub idle: bool,

    /// Print server error replies, rate-limited to one per second
    #[arg(short = 'e', long)]
    pub show_errors: bool,

    /// Integer argument for INCRBY / HINCRBY
    #[arg(short = 'v', long, default_value_t = 1)]
    pub incrby: i64,

    /// Outlier threshold in milliseconds for the reporter's max-latency count
    #[arg(short = 'm', long, default_value_t = 10)]
    pub maxlatency: u64,

    /// Comma-separated workload selection
    #[arg(short = 't', long, value_delimiter = ',')]
    pub tests: Vec<String>,

    /// SELECT this database number on every new connection
    #[arg(long, default_value_t = 0)]
    pub dbnum: u32,

    /// Sentinel substring marking a randomization slot in command templates
    #[arg(long = "kp", default_value = DEFAULT_KEY_PREFIX)]
    pub key_prefix: String,

    /// Number of sub-fields for ZADD/HMSET/HMGET (clamped to >= 1, else 10)
    #[arg(long = "sk", default_value_t = 10)]
    pub subkeys: u32,

    /// Trailing literal command to benchmark instead of the default suite
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Args {
    pub fn keepalive(&self) -> bool {
        self.keepalive != 0
    }

    pub fn subkeys(&self) -> u32 {
        if self.subkeys >= 1 {
            self.subkeys
        } else {
            10
        }
    }

    /// Randomization slot length, or `None` if `-r` wasn't given.
    pub fn random_slot_len(&self) -> Option<u32> {
        self.random_keys
    }

    pub fn endpoint_description(&self) -> String {
        match &self.socket {
            Some(path) => path.clone(),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

#[cfg(test)]
impl Args {
    /// Parses the all-defaults CLI for use as a base in other modules' tests.
    pub fn default_for_test() -> Self {
        Args::parse_from(["resp-bench"])
    }
}
