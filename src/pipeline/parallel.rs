//! Parallelism coordination.
//!
//! Decides which stages run in the worker pool, and runs batches of jobs
//! there. Jobs are independent: each owns its inputs, sends its result
//! back over a channel, and the caller blocks until every job has reported.

use crossbeam::channel;
use rayon::ThreadPool;

use crate::pipeline::stage::StageName;

/// How a stage executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// On the calling thread, in chain order.
    Inline,
    /// In the shared worker pool.
    Pooled,
}

/// CPU-heavy script work and optimization go to the pool, style stages stay inline.
pub const fn execution_for(stage: StageName) -> Execution {
    match stage {
        StageName::ScriptCompat
        | StageName::RuntimeTrim
        | StageName::MinifyScript
        | StageName::MinifyStyle
        | StageName::Lint => Execution::Pooled,
        StageName::StyleInject
        | StageName::StyleExtract
        | StageName::StyleNormalize
        | StageName::CssCompile
        | StageName::LessCompile
        | StageName::SassCompile
        | StageName::StylusCompile => Execution::Inline,
    }
}

/// Fixed-size worker pool.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Pool sized to the available parallelism.
    pub fn new() -> anyhow::Result<Self> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::with_threads(threads)
    }

    pub fn with_threads(threads: usize) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("routepack-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every job and return the results in submission order.
    ///
    /// A failing job never cancels its siblings; all of them run to
    /// completion before this returns.
    pub fn run_all<T, F>(&self, jobs: Vec<F>) -> Vec<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        let total = jobs.len();
        let (tx, rx) = channel::unbounded();

        self.pool.scope(|scope| {
            for (index, job) in jobs.into_iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    // Receiver outlives the scope, send cannot fail.
                    let _ = tx.send((index, job()));
                });
            }
        });
        drop(tx);

        // Join barrier: every job has finished once the scope returns.
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
        for (index, result) in rx {
            slots[index] = Some(result);
        }
        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_execution_policy() {
        assert_eq!(execution_for(StageName::ScriptCompat), Execution::Pooled);
        assert_eq!(execution_for(StageName::MinifyStyle), Execution::Pooled);
        assert_eq!(execution_for(StageName::Lint), Execution::Pooled);
        assert_eq!(execution_for(StageName::SassCompile), Execution::Inline);
        assert_eq!(execution_for(StageName::StyleInject), Execution::Inline);
    }

    #[test]
    fn test_results_in_submission_order() {
        let pool = WorkerPool::with_threads(4).unwrap();
        let jobs: Vec<_> = (0..16u64)
            .map(|i| {
                move || {
                    // Later jobs finish first
                    std::thread::sleep(Duration::from_millis(16 - i));
                    i * 10
                }
            })
            .collect();
        let results = pool.run_all(jobs);
        assert_eq!(results, (0..16u64).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_failure_does_not_cancel_siblings() {
        let pool = WorkerPool::with_threads(2).unwrap();
        let done = AtomicUsize::new(0);
        let jobs: Vec<_> = (0..8)
            .map(|i| {
                let done = &done;
                move || -> Result<usize, String> {
                    done.fetch_add(1, Ordering::SeqCst);
                    if i == 0 { Err("boom".into()) } else { Ok(i) }
                }
            })
            .collect();
        let results = pool.run_all(jobs);
        assert_eq!(done.load(Ordering::SeqCst), 8);
        assert!(results[0].is_err());
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 7);
    }

    #[test]
    fn test_empty_batch() {
        let pool = WorkerPool::with_threads(1).unwrap();
        let results: Vec<u8> = pool.run_all(Vec::<fn() -> u8>::new());
        assert!(results.is_empty());
        assert_eq!(pool.threads(), 1);
    }
}
