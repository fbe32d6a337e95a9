//! Periodic background jobs with cooperative cancellation.
//!
//! Each job runs on its own named thread: run once, then sleep for its
//! interval on the shared [`CancelToken`]. Cancelling wakes every sleeper, and
//! each loop exits at its next wake-up. A job that returns an error is logged
//! and runs again at the next interval.

use std::fmt::Display;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Shared stop flag that sleepers can wait on.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *lock(flag) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *lock(&self.inner.0)
    }

    /// Sleep for up to `timeout`. Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut cancelled = lock(flag);
        while !*cancelled {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            cancelled = cvar
                .wait_timeout(cancelled, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        *cancelled
    }
}

fn lock(m: &Mutex<bool>) -> MutexGuard<'_, bool> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Scheduler {
    token: CancelToken,
    jobs: Vec<(String, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            jobs: Vec::new(),
        }
    }

    /// A handle that stops every job when cancelled.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Start `job` on its own thread, running now and then every `interval`.
    pub fn spawn<F, E>(&mut self, name: &str, interval: Duration, mut job: F) -> io::Result<()>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
        E: Display,
    {
        let token = self.token.clone();
        let job_name = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("job-{name}"))
            .spawn(move || {
                let mut runs: u64 = 0;
                while !token.is_cancelled() {
                    runs += 1;
                    let started = Instant::now();
                    match job() {
                        Ok(()) => info!(
                            job = %job_name,
                            run = runs,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "job finished"
                        ),
                        Err(e) => warn!(job = %job_name, run = runs, cause = %e, "job failed"),
                    }
                    if token.wait_timeout(interval) {
                        break;
                    }
                }
                info!(job = %job_name, runs, "job stopped");
            })?;
        self.jobs.push((name.to_string(), handle));
        Ok(())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for every job thread to exit.
    pub fn join(self) {
        for (name, handle) in self.jobs {
            if handle.join().is_err() {
                error!(job = %name, "job thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn wait_returns_early_on_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(60)));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn wait_times_out_without_cancel() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_stops_long_sleeping_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        let counter = Arc::clone(&runs);
        scheduler
            .spawn("count", Duration::from_secs(3600), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let started = Instant::now();
        scheduler.cancel();
        scheduler.join();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn failing_job_keeps_running() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        let counter = Arc::clone(&runs);
        scheduler
            .spawn("flaky", Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("provider down")
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        scheduler.cancel();
        scheduler.join();
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }
}
