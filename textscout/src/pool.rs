use once_cell::sync::OnceCell;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use tracing::{debug, warn};

use crate::config::default_thread_count;
use crate::errors::{SearchError, SearchResult};

/// The process-wide worker pool shared by every scan
static WORKER_POOL: OnceCell<ThreadPool> = OnceCell::new();

fn build_pool(threads: NonZeroUsize) -> SearchResult<ThreadPool> {
    debug!("Creating worker pool with {} threads", threads);
    ThreadPoolBuilder::new()
        .num_threads(threads.get())
        .thread_name(|i| format!("textscout-worker-{}", i))
        .build()
        .map_err(|e| SearchError::worker_fault(format!("failed to build worker pool: {}", e)))
}

/// Sizes the worker pool explicitly. Must run before the first scan.
///
/// Returns `true` if this call created the pool. Once the pool exists its size is fixed, and
/// later calls only log a warning.
pub fn init_worker_pool(threads: NonZeroUsize) -> SearchResult<bool> {
    let mut created = false;
    WORKER_POOL.get_or_try_init(|| {
        created = true;
        build_pool(threads)
    })?;
    if !created {
        warn!(
            "Worker pool already running with {} threads, ignoring request for {}",
            worker_count(),
            threads
        );
    }
    Ok(created)
}

/// The shared pool, created with one thread per core on first use
pub fn worker_pool() -> SearchResult<&'static ThreadPool> {
    WORKER_POOL.get_or_try_init(|| build_pool(default_thread_count()))
}

/// Threads in the pool, or 0 before it exists
pub fn worker_count() -> usize {
    WORKER_POOL.get().map_or(0, ThreadPool::current_num_threads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_pool_is_shared() {
        let first = worker_pool().unwrap();
        let second = worker_pool().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(worker_count() >= 1);

        // Size is fixed after creation
        let created = init_worker_pool(NonZeroUsize::new(3).unwrap()).unwrap();
        assert!(!created);
        assert!(std::ptr::eq(first, worker_pool().unwrap()));
    }

    #[test]
    fn test_workers_are_named() {
        let (tx, rx) = mpsc::channel();
        worker_pool().unwrap().spawn(move || {
            let name = std::thread::current().name().map(str::to_string);
            let _ = tx.send(name);
        });
        let name = rx.recv().unwrap().unwrap();
        assert!(name.starts_with("textscout-worker-"));
    }
}
