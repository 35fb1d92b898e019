//! Error taxonomy for resp-bench (§7).
//!
//! Four variants line up with the error taxonomy in the spec: configuration
//! mistakes, connect failures, write/read I/O errors, and protocol framing
//! errors. `main` matches on these to choose the process exit code.

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("{0}")]
    Config(String),

    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}
