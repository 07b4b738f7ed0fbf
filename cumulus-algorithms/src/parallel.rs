//! Thread configuration for the data-parallel loops

use cumulus_core::{Error, Result};
use rayon::ThreadPoolBuilder;

/// Degree of parallelism for the per-point loops.
///
/// `Auto` resolves to the number of physical cores; `Threads(n)` runs the
/// region on exactly `n` worker threads. The value is resolved once at the
/// start of each parallel region and never rebalanced mid-computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// One worker per physical core
    Auto,
    /// A fixed number of workers (clamped to at least one)
    Threads(usize),
}

impl Default for Parallelism {
    fn default() -> Self {
        Parallelism::Auto
    }
}

impl Parallelism {
    /// Number of worker threads this configuration resolves to.
    pub fn num_threads(&self) -> usize {
        match self {
            Parallelism::Auto => num_cpus::get_physical(),
            Parallelism::Threads(n) => (*n).max(1),
        }
    }
}

/// Run `op` on a pool sized by `parallelism`; rayon iterators inside the
/// closure use that pool.
pub(crate) fn install<R, F>(parallelism: Parallelism, op: F) -> Result<R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(parallelism.num_threads())
        .build()
        .map_err(|e| Error::Algorithm(format!("failed to build thread pool: {}", e)))?;
    Ok(pool.install(op))
}
