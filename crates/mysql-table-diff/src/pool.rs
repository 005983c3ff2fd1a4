//! Bounded worker pool for chunk comparisons.
//!
//! `apply` blocks the producer until a worker slot frees up, so the
//! splitter can never race arbitrarily far ahead of the comparators.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{DiffError, Result};

pub struct WorkerPool {
    limit: usize,
    name: String,
    slots: Arc<Semaphore>,
    tasks: Mutex<JoinSet<Result<()>>>,
}

impl WorkerPool {
    pub fn new(limit: usize, name: &str) -> Self {
        Self {
            limit,
            name: name.to_string(),
            slots: Arc::new(Semaphore::new(limit)),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether a worker slot is currently free.
    pub fn has_worker(&self) -> bool {
        self.slots.available_permits() > 0
    }

    /// Submit one unit of work, waiting for a free slot first.
    pub async fn apply<F>(&self, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DiffError::Task(format!("worker pool {} is closed", self.name)))?;

        self.tasks.lock().await.spawn(async move {
            let result = fut.await;
            drop(permit);
            result
        });
        Ok(())
    }

    /// Wait for every submitted task, collecting all failures.
    pub async fn wait_finished(&self) -> Vec<DiffError> {
        let mut errors = Vec::new();
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(DiffError::Task(format!(
                    "worker in pool {} failed: {}",
                    self.name, e
                ))),
            }
        }
        debug!(pool = %self.name, errors = errors.len(), "worker pool drained");
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_all_tasks() {
        let pool = WorkerPool::new(3, "test");
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let done = done.clone();
            pool.apply(async move {
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }
        assert!(pool.wait_finished().await.is_empty());
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_collects_task_errors() {
        let pool = WorkerPool::new(2, "test");
        for i in 0..4 {
            pool.apply(async move {
                if i % 2 == 0 {
                    Err(DiffError::Task(format!("task {i}")))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();
        }
        assert_eq!(pool.wait_finished().await.len(), 2);
    }

    #[tokio::test]
    async fn test_collects_panics() {
        let pool = WorkerPool::new(1, "test");
        pool.apply(async { panic!("boom") }).await.unwrap();
        let errors = pool.wait_finished().await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], DiffError::Task(_)));
    }

    #[tokio::test]
    async fn test_has_worker_tracks_occupancy() {
        let pool = WorkerPool::new(1, "test");
        assert!(pool.has_worker());
        pool.apply(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pool.has_worker());
        pool.wait_finished().await;
        assert!(pool.has_worker());
    }
}
