pub mod addrdec;
pub mod cache;
pub mod config;
pub mod interconn;
pub mod sim;
pub mod testing;
pub mod trace;

pub use cache::{Cache, Controller};
pub use sim::Simulation;

/// Memory addresses as seen on the bus.
///
/// Stored as 64 bit regardless of the configured address width; the trace
/// parser rejects addresses outside the configured space.
#[allow(non_camel_case_types)]
pub type address = u64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error("cannot read trace file {path:?}")]
    Trace {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Programmer error: the tag store or state machine broke one of its
    /// own invariants. Fatal, the run aborts after sinks are flushed.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
