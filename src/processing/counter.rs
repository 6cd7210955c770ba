//! Asynchronous per-symbol counting over canonical buffers

use crate::bio::nucleic::{Nucleic, NUCLEIC_COUNT};
use crate::bio::sequence::NucleicCounts;
use crate::error::{ImportError, ImportResult};
use crate::utils::parallel::WorkerPool;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Buffers shorter than this update the shared counters byte by byte
pub const DEFAULT_SMALL_BUFFER_THRESHOLD: usize = 200;

/// Builds a histogram over buffers submitted from a producer that must not block.
///
/// Each [`submit`](Self::submit) becomes one task on the worker pool.
/// [`drain`](Self::drain) waits for every task submitted before it.
/// Submitting while a drain is in progress is not supported.
pub struct NucleicCounter {
    shared: Arc<SharedCounts>,
    pool: WorkerPool,
    small_threshold: usize,
}

struct SharedCounts {
    counts: [AtomicU64; NUCLEIC_COUNT],
    pending: Mutex<usize>,
    all_done: Condvar,
    failed: AtomicUsize,
}

impl SharedCounts {
    fn add_small(&self, buffer: &[u8]) {
        for &b in buffer {
            self.counts[Nucleic::from_internal(b).index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn add_large(&self, buffer: &[u8]) {
        let mut local = [0u64; NUCLEIC_COUNT];
        for &b in buffer {
            local[Nucleic::from_internal(b).index()] += 1;
        }
        for (slot, count) in self.counts.iter().zip(local) {
            if count > 0 {
                slot.fetch_add(count, Ordering::Relaxed);
            }
        }
    }
}

/// Marks one task finished even when counting panics
struct TaskGuard(Arc<SharedCounts>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.failed.fetch_add(1, Ordering::SeqCst);
        }
        let mut pending = self.0.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.0.all_done.notify_all();
        }
    }
}

impl NucleicCounter {
    pub fn new(pool: WorkerPool) -> Self {
        Self::with_threshold(pool, DEFAULT_SMALL_BUFFER_THRESHOLD)
    }

    pub fn with_threshold(pool: WorkerPool, small_threshold: usize) -> Self {
        Self {
            shared: Arc::new(SharedCounts {
                counts: std::array::from_fn(|_| AtomicU64::new(0)),
                pending: Mutex::new(0),
                all_done: Condvar::new(),
                failed: AtomicUsize::new(0),
            }),
            pool,
            small_threshold,
        }
    }

    /// Queue one read-only buffer for counting and return immediately
    pub fn submit(&self, buffer: Arc<[u8]>) {
        *self.shared.pending.lock() += 1;

        let shared = Arc::clone(&self.shared);
        let small = buffer.len() < self.small_threshold;
        self.pool.spawn(move || {
            let guard = TaskGuard(shared);
            if small {
                guard.0.add_small(&buffer);
            } else {
                guard.0.add_large(&buffer);
            }
        });
    }

    /// Number of submitted tasks that have not finished yet
    pub fn pending(&self) -> usize {
        *self.shared.pending.lock()
    }

    /// Wait for all submitted tasks, then return the non-zero counts.
    ///
    /// When called from a worker of the same pool, queued jobs are executed on
    /// the calling thread while waiting.
    pub fn drain(&self) -> ImportResult<NucleicCounts> {
        loop {
            if *self.shared.pending.lock() == 0 {
                break;
            }
            if let Some(rayon::Yield::Executed) = self.pool.yield_now() {
                continue;
            }
            let mut pending = self.shared.pending.lock();
            if *pending > 0 {
                self.shared.all_done.wait(&mut pending);
            }
        }

        let failed = self.shared.failed.load(Ordering::SeqCst);
        if failed > 0 {
            return Err(ImportError::InterruptedWait(format!(
                "{} counting task(s) failed before the histogram was complete",
                failed
            )));
        }

        Ok(self.snapshot())
    }

    fn snapshot(&self) -> NucleicCounts {
        Nucleic::SYMBOLS
            .iter()
            .copied()
            .chain(std::iter::once(Nucleic::NONE))
            .filter_map(|symbol| {
                let count = self.shared.counts[symbol.index()].load(Ordering::Relaxed);
                (count > 0).then_some((symbol, count))
            })
            .collect()
    }
}
