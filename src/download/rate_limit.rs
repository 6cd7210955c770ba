//! Single-flight rate limiting for remote fetches.
//!
//! A [`RateLimiter`] owns the time of the last successful fetch and an
//! exclusive token. Callers hold a [`FetchPermit`] for the whole lifetime of a
//! fetch, including consumption of the response body.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

/// Clock that only moves when slept on or advanced by hand
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Every duration passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }
}

pub struct RateLimiter {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
    last_success: Mutex<Option<Instant>>,
    busy: Mutex<bool>,
    released: Condvar,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Arc<Self> {
        Self::with_clock(min_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(min_interval: Duration, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            min_interval,
            clock,
            last_success: Mutex::new(None),
            busy: Mutex::new(false),
            released: Condvar::new(),
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_success(&self) -> Option<Instant> {
        *self.last_success.lock()
    }

    /// Take the exclusive token, then wait out the rest of the minimum interval.
    ///
    /// Blocks while another permit is alive. The first fetch of a limiter
    /// never waits.
    pub fn acquire(self: &Arc<Self>) -> FetchPermit {
        {
            let mut busy = self.busy.lock();
            while *busy {
                self.released.wait(&mut busy);
            }
            *busy = true;
        }
        let permit = FetchPermit {
            limiter: Arc::clone(self),
            released: false,
        };

        if let Some(wait) = self.remaining_wait() {
            tracing::info!(
                "The time limit is applied, delay time is {} milliseconds.",
                wait.as_millis()
            );
            self.clock.sleep(wait);
        }
        permit
    }

    fn remaining_wait(&self) -> Option<Duration> {
        let last = (*self.last_success.lock())?;
        let elapsed = self.clock.now().saturating_duration_since(last);
        let remaining = self.min_interval.saturating_sub(elapsed);
        (!remaining.is_zero()).then_some(remaining)
    }

    fn stamp(&self) {
        *self.last_success.lock() = Some(self.clock.now());
    }

    fn release(&self) {
        let mut busy = self.busy.lock();
        *busy = false;
        self.released.notify_one();
    }
}

/// Exclusive right to run one fetch.
///
/// [`complete`](Self::complete) records a successful fetch and releases the
/// token. Dropping without completing releases the token and leaves the
/// last-success time untouched.
pub struct FetchPermit {
    limiter: Arc<RateLimiter>,
    released: bool,
}

impl FetchPermit {
    pub fn complete(mut self) {
        self.limiter.stamp();
        self.limiter.release();
        self.released = true;
    }
}

impl Drop for FetchPermit {
    fn drop(&mut self) {
        if !self.released {
            self.limiter.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_first_acquire_does_not_wait() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_millis(500), clock.clone());
        limiter.acquire().complete();
        assert!(clock.sleeps().is_empty());
        assert!(limiter.last_success().is_some());
    }

    #[test]
    fn test_waits_remaining_interval_once() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_millis(500), clock.clone());

        limiter.acquire().complete();
        let first = limiter.last_success().unwrap();
        clock.advance(Duration::from_millis(200));

        limiter.acquire().complete();
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(300)]);
        let second = limiter.last_success().unwrap();
        assert!(second.duration_since(first) >= Duration::from_millis(500));
    }

    #[test]
    fn test_no_wait_after_interval_elapsed() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_millis(100), clock.clone());
        limiter.acquire().complete();
        clock.advance(Duration::from_millis(150));
        limiter.acquire().complete();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_dropped_permit_keeps_timestamp() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_millis(100), clock);
        drop(limiter.acquire());
        assert!(limiter.last_success().is_none());
        // Token was released
        limiter.acquire().complete();
        assert!(limiter.last_success().is_some());
    }

    #[test]
    fn test_permits_never_overlap() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let permit = limiter.acquire();
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        std::thread::yield_now();
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        permit.complete();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
