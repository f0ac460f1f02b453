//! Single re-armable countdown backed by a dedicated timer thread.
//!
//! Every `arm` and `disarm` bumps a generation counter. The expiry callback
//! receives the generation it was armed with, and the consumer checks
//! [`TimeoutHandler::is_current`] on its own executor before acting, so a
//! countdown that fired concurrently with a disarm is discarded.

use crate::settings::TimeoutDuration;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub type ExpiryCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct TimerState {
    deadline: Option<Instant>,
    generation: u64,
    shutdown: bool,
}

struct Inner {
    state: Mutex<TimerState>,
    condvar: Condvar,
    on_expired: Mutex<Option<ExpiryCallback>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct TimeoutHandler {
    inner: Arc<Inner>,
    timeout: TimeoutDuration,
    /// Wall-clock length of one configured second.
    unit: Duration,
    worker: Option<JoinHandle<()>>,
}

impl TimeoutHandler {
    pub fn new(timeout: TimeoutDuration) -> Self {
        Self::with_unit(timeout, Duration::from_secs(1))
    }

    /// Like [`TimeoutHandler::new`], but each configured second lasts `unit`.
    pub fn with_unit(timeout: TimeoutDuration, unit: Duration) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(TimerState::default()),
            condvar: Condvar::new(),
            on_expired: Mutex::new(None),
        });
        let thread_inner = inner.clone();
        let worker = thread::Builder::new()
            .name("reach-mode-timeout".to_string())
            .spawn(move || run(thread_inner));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(?err, "failed to spawn timeout thread");
                None
            }
        };
        Self {
            inner,
            timeout,
            unit,
            worker,
        }
    }

    /// Replace the expiry callback. Only one callback is kept.
    pub fn register_timeout_listener(&self, callback: ExpiryCallback) {
        *self
            .inner
            .on_expired
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn timeout(&self) -> TimeoutDuration {
        self.timeout
    }

    /// Countdown length for the configured timeout, `None` for never.
    pub fn configured_duration(&self) -> Option<Duration> {
        self.timeout.duration().map(|duration| {
            let secs = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
            self.unit.saturating_mul(secs)
        })
    }

    /// Store a new configured duration, restarting a pending countdown with it.
    pub fn set_timeout(&mut self, timeout: TimeoutDuration) {
        self.timeout = timeout;
        if self.is_armed() {
            self.reset_timer();
        }
    }

    /// Restart the countdown with the configured duration.
    ///
    /// With [`TimeoutDuration::Never`] this only cancels a pending countdown.
    pub fn reset_timer(&mut self) -> Option<u64> {
        match self.configured_duration() {
            Some(duration) => Some(self.arm(duration)),
            None => {
                self.disarm();
                None
            }
        }
    }

    /// Start a fresh countdown, cancelling any pending one.
    ///
    /// A duration too large to represent never expires.
    pub fn arm(&self, duration: Duration) -> u64 {
        let mut state = self.inner.lock();
        state.generation = state.generation.wrapping_add(1);
        state.deadline = Instant::now().checked_add(duration);
        if state.deadline.is_none() {
            tracing::warn!(?duration, "timeout too large; countdown will never expire");
        }
        self.inner.condvar.notify_one();
        tracing::trace!(generation = state.generation, ?duration, "timeout armed");
        state.generation
    }

    pub fn disarm(&self) {
        let mut state = self.inner.lock();
        state.generation = state.generation.wrapping_add(1);
        if state.deadline.take().is_some() {
            tracing::trace!(generation = state.generation, "timeout disarmed");
            self.inner.condvar.notify_one();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().deadline.is_some()
    }

    /// True when no arm or disarm happened since `generation` was issued.
    pub fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().generation == generation
    }
}

impl Drop for TimeoutHandler {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock();
            state.shutdown = true;
            state.deadline = None;
            self.inner.condvar.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run(inner: Arc<Inner>) {
    let mut state = inner.lock();
    loop {
        if state.shutdown {
            return;
        }
        match state.deadline {
            None => {
                state = inner
                    .condvar
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if deadline <= now {
                    state.deadline = None;
                    let generation = state.generation;
                    drop(state);
                    fire(&inner, generation);
                    state = inner.lock();
                } else {
                    let wait = deadline.saturating_duration_since(now);
                    state = inner
                        .condvar
                        .wait_timeout(state, wait)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}

fn fire(inner: &Inner, generation: u64) {
    let callback = inner
        .on_expired
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match callback {
        Some(callback) => {
            tracing::debug!(generation, "timeout expired");
            callback(generation);
        }
        None => tracing::debug!(generation, "timeout expired with no listener"),
    }
}
