//! Parallel execution engine.
//!
//! One `Engine` is created per process run once the worker count is known,
//! and every parallel pass (scene preprocessing, accelerator build, tile
//! rendering) goes through it. Nothing here touches rayon's global pool.

use crossbeam_channel::unbounded;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::ConfigError;

/// Default edge length of a square render tile, in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 16;

/// Run configuration for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Tile edge length used when partitioning an image.
    pub tile_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the tile size.
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.workers));
        }
        if self.tile_size == 0 {
            return Err(ConfigError::InvalidTileSize(self.tile_size));
        }
        Ok(())
    }
}

/// Fixed-size worker pool.
///
/// Every call that launches work blocks until all of it has completed.
pub struct Engine {
    pool: ThreadPool,
    config: EngineConfig,
}

impl Engine {
    /// Start a pool with `workers` threads and the default tile size.
    pub fn new(workers: usize) -> Result<Self, ConfigError> {
        Self::with_config(EngineConfig::default().with_workers(workers))
    }

    /// Start a pool sized to the available hardware concurrency.
    pub fn with_available_parallelism() -> Result<Self, ConfigError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("lumen-worker-{i}"))
            .build()?;
        log::debug!(
            "Started engine with {} workers, tile size {}",
            config.workers,
            config.tile_size
        );
        Ok(Self { pool, config })
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    pub fn tile_size(&self) -> u32 {
        self.config.tile_size
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Apply `f` to every index in `0..count` in parallel.
    ///
    /// Each index is visited exactly once; returns after all calls finish.
    pub fn parallel_for<F>(&self, count: usize, f: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        self.pool
            .install(|| (0..count).into_par_iter().for_each(|i| f(i)));
    }

    /// Like `parallel_for`, collecting one result per index in index order.
    pub fn parallel_map<T, F>(&self, count: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        self.pool
            .install(|| (0..count).into_par_iter().map(|i| f(i)).collect())
    }

    /// Process work items from a shared queue.
    ///
    /// All items are enqueued up front, then each worker repeatedly takes
    /// one item and runs `f` on it to completion before taking the next.
    /// An item is never split across workers. Items are handed out in
    /// queue order; completion order depends on scheduling.
    pub fn drain_queue<T, I, F>(&self, items: I, f: F)
    where
        T: Send,
        I: IntoIterator<Item = T>,
        F: Fn(T) + Sync,
    {
        let (sender, receiver) = unbounded();
        for item in items {
            // The receiver is alive for the whole call.
            let _ = sender.send(item);
        }
        drop(sender);

        let workers = self.config.workers.min(receiver.len().max(1));
        let f = &f;
        self.pool.scope(|scope| {
            for _ in 0..workers {
                let receiver = receiver.clone();
                scope.spawn(move |_| {
                    for item in receiver.iter() {
                        f(item);
                    }
                });
            }
        });
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            Engine::new(0),
            Err(ConfigError::InvalidWorkerCount(0))
        ));
        let config = EngineConfig::default().with_workers(2).with_tile_size(0);
        assert!(matches!(
            Engine::with_config(config),
            Err(ConfigError::InvalidTileSize(0))
        ));
    }

    #[test]
    fn test_parallel_for_visits_each_index_once() {
        let engine = Engine::new(4).unwrap();
        let counts: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();

        engine.parallel_for(counts.len(), |i| {
            counts[i].fetch_add(1, Ordering::Relaxed);
        });

        assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_parallel_map_keeps_index_order() {
        let engine = Engine::new(3).unwrap();
        let squares = engine.parallel_map(100, |i| i * i);
        assert_eq!(squares.len(), 100);
        assert!(squares.iter().enumerate().all(|(i, &s)| s == i * i));
    }

    #[test]
    fn test_drain_queue_processes_every_item_once() {
        for workers in [1, 2, 7] {
            let engine = Engine::new(workers).unwrap();
            let seen = Mutex::new(Vec::new());

            engine.drain_queue(0..257usize, |item| {
                seen.lock().unwrap().push(item);
            });

            let mut seen = seen.into_inner().unwrap();
            seen.sort_unstable();
            assert_eq!(seen, (0..257).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_drain_queue_accepts_mutable_borrows() {
        let engine = Engine::new(4).unwrap();
        let mut data = vec![0u32; 64];

        engine.drain_queue(data.chunks_mut(8), |chunk| {
            for v in chunk.iter_mut() {
                *v += 1;
            }
        });

        assert!(data.iter().all(|&v| v == 1));
    }

    #[test]
    fn test_empty_queue_returns() {
        let engine = Engine::new(2).unwrap();
        engine.drain_queue(std::iter::empty::<usize>(), |_| unreachable!());
        engine.parallel_for(0, |_| unreachable!());
    }
}
