//! Test support for forkseq.
//!
//! - [`CountingSource`]: wraps an iterator and records every pull, including
//!   pulls made after the source already reported its end.
//! - [`checks`]: conformance checks that hold for any view, whatever its
//!   source. They panic with a descriptive message on violation.

pub mod checks;
mod counting;

pub use counting::{CountingSource, PullCounter, counting, naturals, squares};

/// Install a `RUST_LOG`-driven subscriber for the current test binary.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
