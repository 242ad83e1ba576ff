use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A small, blocking counting semaphore.
///
/// Bounds how many chunks the engine evaluates at once. Permits are returned when the
/// [`Permit`] guard is dropped, so a panicking chunk cannot leak one.
pub(crate) struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

/// One held permit of a [`Semaphore`].
pub(crate) struct Permit<'a> {
    sem: &'a Semaphore,
}

impl Semaphore {
    /// `permits` must be non-zero; the engine validates this before building one.
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            cv: Condvar::new(),
        }
    }

    // The counter stays consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire one permit, blocking until available.
    ///
    /// Also returns the time spent waiting (zero if no wait was required).
    pub(crate) fn acquire(&self) -> (Permit<'_>, Duration) {
        let start = Instant::now();
        let mut waited = false;
        let mut g = self.lock();
        while *g == 0 {
            waited = true;
            g = self.cv.wait(g).unwrap_or_else(PoisonError::into_inner);
        }
        *g -= 1;
        let waited = if waited { start.elapsed() } else { Duration::ZERO };
        (Permit { sem: self }, waited)
    }

    fn release(&self) {
        let mut g = self.lock();
        *g += 1;
        self.cv.notify_one();
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        *self.lock()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}

#[cfg(test)]
mod tests {
    use super::Semaphore;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn permits_return_on_drop() {
        let sem = Semaphore::new(2);
        let (a, waited) = sem.acquire();
        assert_eq!(waited, Duration::ZERO);
        let (b, _) = sem.acquire();
        assert_eq!(sem.available(), 0);
        drop(a);
        assert_eq!(sem.available(), 1);
        drop(b);
        assert_eq!(sem.available(), 2);
    }

    #[test]
    fn blocked_acquire_reports_wait() {
        let sem = Arc::new(Semaphore::new(1));
        let (held, _) = sem.acquire();
        let sem2 = Arc::clone(&sem);
        let waiter = std::thread::spawn(move || {
            let (_permit, waited) = sem2.acquire();
            waited
        });
        std::thread::sleep(Duration::from_millis(20));
        drop(held);
        let waited = waiter.join().unwrap();
        assert!(waited > Duration::ZERO);
    }
}
