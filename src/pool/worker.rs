//! Bounded pool for executing partitions.
//!
//! Epistemic foundation:
//! - K_i: At most `concurrency` partitions run at once
//! - K_i: Results come back in submission order
//! - B_i: Each partition may fail → the whole run fails (all-or-nothing)
//! - I^B: A partition task may panic → ExecutionError

use crate::models::{PredictorError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default number of partitions executed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Worker pool running blocking partition jobs.
#[derive(Debug, Clone)]
pub struct PartitionPool {
    /// Max concurrent partitions
    concurrency: usize,
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
}

impl Default for PartitionPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl PartitionPool {
    /// Create a pool; a concurrency of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            concurrency,
            semaphore: Arc::new(Semaphore::new(concurrency)),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every job on the blocking thread pool, bounded by the semaphore.
    ///
    /// Returns results in job order, or the first failure in job order.
    pub async fn run<T, F>(&self, jobs: Vec<F>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let start = Instant::now();
        let total = jobs.len();
        let mut handles = Vec::with_capacity(total);

        for job in jobs {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| PredictorError::Internal("Semaphore closed".to_string()))?;
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            }));
        }

        let mut results = Vec::with_capacity(total);
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(e)) => {
                    warn!(partition = index, error = %e, "Partition failed");
                    return Err(e);
                }
                Err(e) => {
                    warn!(partition = index, error = %e, "Partition task panicked");
                    return Err(PredictorError::Execution(format!(
                        "partition {index} did not complete: {e}"
                    )));
                }
            }
        }

        debug!(
            partitions = total,
            concurrency = self.concurrency,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Partitions complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_job_order() {
        let pool = PartitionPool::new(3);
        let jobs: Vec<_> = (0..10usize)
            .map(|i| {
                move || {
                    std::thread::sleep(Duration::from_millis((10 - i as u64) * 2));
                    Ok(i)
                }
            })
            .collect();
        assert_eq!(pool.run(jobs).await.unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = PartitionPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..6)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .collect();
        pool.run(jobs).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failure_fails_whole_run() {
        let pool = PartitionPool::new(2);
        let jobs: Vec<Box<dyn FnOnce() -> Result<usize> + Send>> = vec![
            Box::new(|| -> Result<usize> { Ok(1) }),
            Box::new(|| -> Result<usize> { Err(PredictorError::prediction("bad partition")) }),
        ];
        let err = pool.run(jobs).await.unwrap_err();
        assert!(err.is_data_error());
    }

    #[tokio::test]
    async fn test_panic_is_execution_error() {
        let pool = PartitionPool::new(1);
        let jobs: Vec<Box<dyn FnOnce() -> Result<usize> + Send>> =
            vec![Box::new(|| -> Result<usize> { panic!("boom") })];
        let err = pool.run(jobs).await.unwrap_err();
        assert!(matches!(err, PredictorError::Execution(_)));
    }
}
