use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::fmt::{Debug, Formatter};

/// Execution resources for the data-parallel stages of the solver.
///
/// A context is created once and passed by reference to every operation that loops over grid
/// points or quadrature points. Each such loop blocks until it has completed.
pub struct ExecutionContext {
    pool: ThreadPool,
}

impl Debug for ExecutionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("num_threads", &self.num_threads())
            .finish()
    }
}

impl ExecutionContext {
    /// Creates a context with the given number of worker threads.
    ///
    /// Zero lets `rayon` pick the number of threads from the environment.
    pub fn with_threads(num_threads: usize) -> eyre::Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|idx| format!("polar-poisson-{idx}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Creates a context with a single worker thread.
    pub fn serial() -> eyre::Result<Self> {
        Self::with_threads(1)
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` inside the context's thread pool.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Writes `f(i)` into `output[i]` for every index, in parallel.
    pub fn fill_indexed<U, F>(&self, output: &mut [U], f: F)
    where
        U: Send,
        F: Fn(usize) -> U + Sync + Send,
    {
        self.install(|| {
            output
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, out)| *out = f(i));
        })
    }

    /// Computes `f(i)` for `i` in `0..n` in parallel and collects the results in order.
    pub fn map_collect<U, F>(&self, n: usize, f: F) -> Vec<U>
    where
        U: Send,
        F: Fn(usize) -> U + Sync + Send,
    {
        self.install(|| (0..n).into_par_iter().map(f).collect())
    }
}
