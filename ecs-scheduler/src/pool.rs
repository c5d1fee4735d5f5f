// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Worker pool
//!
//! Thin adapter over a dedicated Rayon thread pool. Work is submitted in
//! batches: [`WorkerPool::scope`] runs a closure that may submit any number of
//! units, including from inside units that are already running, and returns
//! only once every submitted unit has finished. Units may borrow from the
//! caller's stack for the lifetime of the batch.
//!
//! # Environment Configuration
//!
//! Set `ECS_SCHEDULER_THREADS` to override the number of worker threads:
//! ```bash
//! export ECS_SCHEDULER_THREADS=4
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Environment variable overriding [`PoolConfig::threads`]
pub const THREADS_ENV_VAR: &str = "ECS_SCHEDULER_THREADS";

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads; `None` lets Rayon pick one per logical CPU
    pub threads: Option<usize>,
    /// Prefix of worker thread names
    pub thread_name_prefix: String,
    /// Stack size of worker threads in bytes; `None` keeps the platform default
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            threads: None,
            thread_name_prefix: "ecs-worker".to_string(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with a fixed number of threads
    pub fn new(threads: usize) -> Self {
        PoolConfig {
            threads: Some(threads),
            ..Self::default()
        }
    }

    /// Default configuration with the `ECS_SCHEDULER_THREADS` override applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply the `ECS_SCHEDULER_THREADS` override, if set
    ///
    /// Values that are not a positive integer are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(THREADS_ENV_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(threads) if threads > 0 => self.threads = Some(threads),
                _ => warn!(
                    value = %raw,
                    "ignoring {}: expected a positive integer",
                    THREADS_ENV_VAR
                ),
            }
        }
        self
    }

    /// Set the number of worker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "Thread count must be positive");
        self.threads = Some(threads);
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

/// Counters for monitoring pool usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of batches opened with [`WorkerPool::scope`]
    pub batches: usize,
    /// Number of units submitted across all batches
    pub units: usize,
}

impl PoolStats {
    /// Average number of units per batch
    pub fn units_per_batch(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.units as f64 / self.batches as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicUsize,
    units: AtomicUsize,
}

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Create a pool with the default configuration and environment overrides
    pub fn new() -> Result<Self, rayon::ThreadPoolBuildError> {
        Self::with_config(PoolConfig::from_env())
    }

    /// Create a pool with a custom configuration
    pub fn with_config(config: PoolConfig) -> Result<Self, rayon::ThreadPoolBuildError> {
        let prefix = config.thread_name_prefix.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(move |index| format!("{}-{}", prefix, index));
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        if let Some(bytes) = config.stack_size {
            builder = builder.stack_size(bytes);
        }
        let pool = builder.build()?;
        info!(threads = pool.current_num_threads(), "worker pool started");

        Ok(WorkerPool {
            pool,
            counters: Arc::new(Counters::default()),
        })
    }

    /// Number of worker threads
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Open a batch, run `op` on the calling thread and wait for every unit
    /// submitted to the batch
    ///
    /// A panic in a unit is re-raised here once the batch has drained.
    pub fn scope<'scope, R>(&self, op: impl FnOnce(&Batch<'_, 'scope>) -> R) -> R {
        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        let counters = &self.counters;
        self.pool.in_place_scope(|scope| op(&Batch { scope, counters }))
    }

    /// Snapshot of the usage counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            batches: self.counters.batches.load(Ordering::Relaxed),
            units: self.counters.units.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.thread_count())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Handle for submitting units to an open batch
pub struct Batch<'a, 'scope> {
    scope: &'a rayon::Scope<'scope>,
    counters: &'a Arc<Counters>,
}

impl<'a, 'scope> Batch<'a, 'scope> {
    /// Run `unit` on the pool as part of this batch
    ///
    /// The unit receives the batch so it can submit follow-up work that the
    /// same wait covers.
    pub fn submit<F>(&self, unit: F)
    where
        F: FnOnce(&Batch<'_, 'scope>) + Send + 'scope,
    {
        self.counters.units.fetch_add(1, Ordering::Relaxed);
        let counters = Arc::clone(self.counters);
        self.scope.spawn(move |scope| {
            unit(&Batch {
                scope,
                counters: &counters,
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.threads, None);
        assert_eq!(config.thread_name_prefix, "ecs-worker");
        assert_eq!(config.stack_size, None);
    }

    #[test]
    fn test_pool_config_custom() {
        let config = PoolConfig::new(3)
            .with_thread_name_prefix("sim")
            .with_stack_size(1 << 20);
        assert_eq!(config.threads, Some(3));
        assert_eq!(config.thread_name_prefix, "sim");
        assert_eq!(config.stack_size, Some(1 << 20));
    }

    #[test]
    #[should_panic(expected = "Thread count must be positive")]
    fn test_zero_threads_rejected() {
        PoolConfig::default().with_threads(0);
    }

    #[test]
    fn test_pool_thread_count() {
        let pool = WorkerPool::with_config(PoolConfig::new(2)).unwrap();
        assert_eq!(pool.thread_count(), 2);
    }

    #[test]
    fn test_batch_waits_for_all_units() {
        let pool = WorkerPool::with_config(PoolConfig::new(4)).unwrap();
        let total = AtomicUsize::new(0);
        pool.scope(|batch| {
            for i in 1..=100 {
                let total = &total;
                batch.submit(move |_| {
                    total.fetch_add(i, Ordering::Relaxed);
                });
            }
        });
        assert_eq!(total.load(Ordering::Relaxed), 5050);
    }

    #[test]
    fn test_units_can_submit_follow_up_work() {
        let pool = WorkerPool::with_config(PoolConfig::new(2)).unwrap();
        let log = Mutex::new(Vec::new());
        pool.scope(|batch| {
            let log = &log;
            batch.submit(move |batch| {
                log.lock().unwrap().push("parent");
                batch.submit(move |_| log.lock().unwrap().push("child"));
            });
        });
        let log = log.into_inner().unwrap();
        assert_eq!(log, vec!["parent", "child"]);
    }

    #[test]
    fn test_nested_batches_from_worker() {
        let pool = WorkerPool::with_config(PoolConfig::new(2)).unwrap();
        let hits = AtomicUsize::new(0);
        pool.scope(|outer| {
            let pool = &pool;
            let hits = &hits;
            outer.submit(move |_| {
                pool.scope(|inner| {
                    for _ in 0..10 {
                        inner.submit(move |_| {
                            hits.fetch_add(1, Ordering::Relaxed);
                        });
                    }
                });
                // The inner batch has drained before scope returns.
                assert_eq!(hits.load(Ordering::Relaxed), 10);
            });
        });
        assert_eq!(pool.stats(), PoolStats { batches: 2, units: 11 });
    }

    #[test]
    fn test_stats_units_per_batch() {
        let stats = PoolStats { batches: 4, units: 10 };
        assert_eq!(stats.units_per_batch(), 2.5);
        assert_eq!(PoolStats::default().units_per_batch(), 0.0);
    }
}
