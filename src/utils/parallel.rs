/// Shared worker pool for the ingestion pipeline
///
/// Backed by a rayon work-stealing pool, so a task may submit further tasks
/// into the same pool and wait on them (through `scope`/`install`) without
/// starving it: a waiting worker executes queued jobs instead of parking.
use crate::error::{ImportError, ImportResult};
use std::any::Any;
use std::sync::Arc;

#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Build a pool with `threads` workers (0 = hardware parallelism)
    pub fn new(threads: usize) -> ImportResult<Self> {
        let threads = if threads == 0 {
            num_cpus::get()
        } else {
            threads
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("seqimport-worker-{}", index))
            .panic_handler(log_task_panic)
            .build()
            .map_err(|e| ImportError::Configuration(format!("Failed to build worker pool: {}", e)))?;

        tracing::debug!("Worker pool started with {} threads", threads);
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn current_num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` inside the pool and wait for its result
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Fire-and-forget task. A panic is logged and does not affect the pool.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(task)
    }

    /// Fork-join scope: returns once every task spawned inside it finished
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&rayon::Scope<'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(op)
    }

    /// Run one queued job of this pool on the current thread, if the current
    /// thread belongs to the pool and work is available
    pub fn yield_now(&self) -> Option<rayon::Yield> {
        self.pool.yield_now()
    }

    /// Target line length for staged data: the shared cache budget split
    /// evenly across workers
    pub fn chunk_target(&self, shared_cache_bytes: usize) -> usize {
        chunk_target_for(shared_cache_bytes, self.current_num_threads())
    }
}

pub fn chunk_target_for(shared_cache_bytes: usize, threads: usize) -> usize {
    (shared_cache_bytes / threads.max(1)).max(1)
}

fn log_task_panic(payload: Box<dyn Any + Send>) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    let thread = std::thread::current();
    tracing::error!(
        thread_name = thread.name().unwrap_or("<unnamed>"),
        thread_id = ?thread.id(),
        worker_index = ?rayon::current_thread_index(),
        "Task in import pool failed: {}",
        message
    );
}
