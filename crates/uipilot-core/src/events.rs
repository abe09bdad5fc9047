//! Event timestamps and blocking waits.
//!
//! The host's event thread feeds [`EventHub::record`]; request handlers block
//! in the `wait_*` methods. Waiters re-check at least every 250 ms, so a missed
//! notification costs latency but never correctness.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const REWAKE: Duration = Duration::from_millis(250);

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEventKind {
    WindowStateChanged,
    WindowContentChanged,
    Other,
}

/// One accessibility event as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiEvent {
    pub kind: UiEventKind,
    pub package: Option<String>,
    pub at_ms: i64,
}

impl UiEvent {
    pub fn new(kind: UiEventKind, package: Option<&str>) -> Self {
        Self {
            kind,
            package: package.filter(|p| !p.is_empty()).map(String::from),
            at_ms: now_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct EventState {
    last_window_changed_at: i64,
    last_content_changed_at: i64,
    last_package: Option<String>,
    observed: HashMap<String, i64>,
}

/// Shared wait state between the event thread and request handlers.
#[derive(Debug, Default)]
pub struct EventHub {
    state: Mutex<EventState>,
    changed: Condvar,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, event: UiEvent) {
        let mut state = self.lock();
        let notify = match event.kind {
            UiEventKind::WindowStateChanged => {
                state.last_window_changed_at = event.at_ms;
                true
            }
            UiEventKind::WindowContentChanged => {
                state.last_content_changed_at = event.at_ms;
                true
            }
            UiEventKind::Other => false,
        };
        if let Some(pkg) = event.package {
            state.observed.insert(pkg.clone(), event.at_ms);
            state.last_package = Some(pkg);
        }
        drop(state);

        if notify {
            self.changed.notify_all();
        }
    }

    pub fn last_window_changed_at(&self) -> i64 {
        self.lock().last_window_changed_at
    }

    pub fn last_content_changed_at(&self) -> i64 {
        self.lock().last_content_changed_at
    }

    pub fn last_observed_package(&self) -> Option<String> {
        self.lock().last_package.clone()
    }

    /// Whether `package` produced any event within `window` of now.
    pub fn is_recently_observed(&self, package: &str, window: Duration) -> bool {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.lock()
            .observed
            .get(package)
            .is_some_and(|&at| now_ms().saturating_sub(at) <= window_ms)
    }

    pub fn wait_for_window_changed(&self, since_ms: i64, timeout: Duration) -> bool {
        self.wait_for_stamp(timeout, |s| s.last_window_changed_at > since_ms)
    }

    pub fn wait_for_content_changed(&self, since_ms: i64, timeout: Duration) -> bool {
        self.wait_for_stamp(timeout, |s| s.last_content_changed_at > since_ms)
    }

    fn wait_for_stamp(&self, timeout: Duration, ready: impl Fn(&EventState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !ready(&state) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, remaining.min(REWAKE))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Poll `check` once immediately and again after every wake until it
    /// passes or `timeout` elapses. The lock is not held while `check` runs.
    pub fn wait_until(&self, timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        if check() {
            return true;
        }
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let state = self.lock();
            let (state, _) = self
                .changed
                .wait_timeout(state, remaining.min(REWAKE))
                .unwrap_or_else(PoisonError::into_inner);
            drop(state);
            if check() {
                return true;
            }
        }
    }
}
