use rayon::prelude::*;

use crate::error::{Error, Result};

/// A data-parallel compute pool for query planning.
///
/// The closure passed to either primitive is called with each index
/// (pair) exactly once, in any order, possibly concurrently. The
/// returned statuses are positional; use [collect_statuses] to surface
/// the first error.
pub struct ThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| {
                Error::Internal(format!("Failed to build thread pool: {e}"))
            })?;
        Ok(ThreadPool { pool })
    }

    pub fn concurrency(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn parallel_for<T, F>(&self, lo: u64, hi: u64, f: F) -> Vec<Result<T>>
    where
        T: Send,
        F: Fn(u64) -> Result<T> + Send + Sync,
    {
        self.pool.install(|| {
            (lo..hi)
                .collect::<Vec<u64>>()
                .into_par_iter()
                .map(|i| f(i))
                .collect()
        })
    }

    pub fn parallel_for_2d<T, F>(
        &self,
        lo0: u64,
        hi0: u64,
        lo1: u64,
        hi1: u64,
        f: F,
    ) -> Vec<Vec<Result<T>>>
    where
        T: Send,
        F: Fn(u64, u64) -> Result<T> + Send + Sync,
    {
        self.pool.install(|| {
            (lo0..hi0)
                .collect::<Vec<u64>>()
                .into_par_iter()
                .map(|i| {
                    (lo1..hi1)
                        .collect::<Vec<u64>>()
                        .into_par_iter()
                        .map(|j| f(i, j))
                        .collect()
                })
                .collect()
        })
    }
}

/// Collects positional task statuses, surfacing the first error.
pub fn collect_statuses<T>(statuses: Vec<Result<T>>) -> Result<Vec<T>> {
    statuses.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[test]
    fn each_index_exactly_once() {
        let pool = ThreadPool::new(4).unwrap();
        let sum = AtomicU64::new(0);
        let statuses = pool.parallel_for(0, 100, |i| {
            sum.fetch_add(i, Ordering::Relaxed);
            Ok(i)
        });
        let values = collect_statuses(statuses).unwrap();
        assert_eq!((0..100).sum::<u64>(), sum.load(Ordering::Relaxed));
        // statuses are positional
        assert_eq!((0..100).collect::<Vec<u64>>(), values);
    }

    #[test]
    fn first_error_surfaced() {
        let pool = ThreadPool::new(2).unwrap();
        let statuses = pool.parallel_for(0, 10, |i| {
            if i >= 5 {
                Err(Error::Internal(format!("task {i}")))
            } else {
                Ok(i)
            }
        });
        let err = collect_statuses(statuses).unwrap_err();
        assert!(matches!(err, Error::Internal(msg) if msg == "task 5"));
    }

    #[test]
    fn two_dimensional_grid() {
        let pool = ThreadPool::new(4).unwrap();
        let statuses = pool.parallel_for_2d(0, 3, 0, 4, |i, j| Ok(i * 10 + j));
        assert_eq!(3, statuses.len());
        for (i, row) in statuses.into_iter().enumerate() {
            let row = collect_statuses(row).unwrap();
            assert_eq!(
                (0..4).map(|j| i as u64 * 10 + j).collect::<Vec<u64>>(),
                row
            );
        }
    }
}
