use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Outcome of a bounded fence wait.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WaitOutcome {
    /// The fence reached the requested value.
    Signaled,
    /// The timeout elapsed first.
    TimedOut,
}

#[derive(Debug, Default)]
struct FenceState {
    completed: u64,
    waiters: usize,
}

#[derive(Debug, Default)]
struct FenceShared {
    state: Mutex<FenceState>,
    cv: Condvar,
}

impl FenceShared {
    fn lock(&self) -> MutexGuard<'_, FenceState> {
        // A poisoned fence still holds a valid counter.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Monotonic GPU completion counter.
///
/// The GPU side advances the counter through a [`FenceSignal`] once a submission
/// finishes; the CPU side reads it or blocks on it. The completed value never
/// decreases.
#[derive(Debug, Clone, Default)]
pub struct Fence {
    shared: Arc<FenceShared>,
}

/// Sendable completion handle used by queue callbacks.
#[derive(Debug, Clone)]
pub struct FenceSignal {
    shared: Arc<FenceShared>,
}

impl FenceSignal {
    /// Marks all work through `value` as complete and wakes waiters.
    pub fn complete(&self, value: u64) {
        let mut state = self.shared.lock();
        if value > state.completed {
            state.completed = value;
        }
        drop(state);
        self.shared.cv.notify_all();
    }
}

/// Wait primitive registered for one target value.
///
/// Counts as a registered waiter until dropped.
#[derive(Debug)]
pub struct FenceEvent<'f> {
    fence: &'f Fence,
    target: u64,
}

impl FenceEvent<'_> {
    pub fn target(&self) -> u64 {
        self.target
    }

    /// Blocks until the fence reaches the target or `timeout` elapses.
    ///
    /// `None` waits without bound.
    pub fn wait(&self, timeout: Option<Duration>) -> WaitOutcome {
        let shared = &self.fence.shared;
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = shared.lock();

        while state.completed < self.target {
            match deadline {
                None => {
                    state = shared.cv.wait(state).unwrap_or_else(|e| e.into_inner());
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::TimedOut;
                    }
                    let (next, _) = shared
                        .cv
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(|e| e.into_inner());
                    state = next;
                }
            }
        }

        WaitOutcome::Signaled
    }
}

impl Drop for FenceEvent<'_> {
    fn drop(&mut self) {
        let mut state = self.fence.shared.lock();
        state.waiters = state.waiters.saturating_sub(1);
    }
}

impl Fence {
    /// Creates a fence whose completed value starts at `initial`.
    pub fn new(initial: u64) -> Self {
        let fence = Self::default();
        fence.shared.lock().completed = initial;
        fence
    }

    /// Latest value reported complete by the GPU.
    pub fn completed_value(&self) -> u64 {
        self.shared.lock().completed
    }

    /// Returns a handle that can complete the fence from another thread.
    pub fn signal_handle(&self) -> FenceSignal {
        FenceSignal {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Registers a wait primitive bound to `target`.
    pub fn event_on_completion(&self, target: u64) -> FenceEvent<'_> {
        self.shared.lock().waiters += 1;
        FenceEvent {
            fence: self,
            target,
        }
    }

    /// Number of wait primitives currently registered.
    pub fn pending_waiters(&self) -> usize {
        self.shared.lock().waiters
    }

    /// Waits for `target` through a temporary event.
    pub fn wait(&self, target: u64, timeout: Option<Duration>) -> WaitOutcome {
        if self.completed_value() >= target {
            return WaitOutcome::Signaled;
        }
        let event = self.event_on_completion(target);
        event.wait(timeout)
    }
}
