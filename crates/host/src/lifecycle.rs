//! Termination state machine shared by networks, hosts and partitions.
//!
//! Every component owns a [`Lifecycle`]: `functioning → terminating →
//! terminated`. Units of work started on behalf of a component are spawned
//! through its lifecycle, which tracks them; terminating the component waits
//! until the last of them has exited. Starting termination twice is a no-op;
//! a second caller waits for the termination already in progress.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tokio_util::task::TaskTracker;

const FUNCTIONING: u8 = 0;
const TERMINATING: u8 = 1;
const TERMINATED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Functioning,
    Terminating,
    Terminated,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    state: AtomicU8,
    token: CancellationToken,
    tracker: TaskTracker,
    finished: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    fn with_token(token: CancellationToken) -> Self {
        Self { inner: Arc::new(Inner {
                state: AtomicU8::new(FUNCTIONING),
                token,
                tracker: TaskTracker::new(),
                finished: CancellationToken::new(),
            }) }
    }

    /// A lifecycle whose cancellation follows this one.
    ///
    /// The child still has to be terminated explicitly for its own work to be
    /// awaited; the parent only propagates the cancellation signal.
    pub fn child(&self) -> Self {
        Self::with_token(self.inner.token.child_token())
    }

    pub fn state(&self) -> State {
        match self.inner.state.load(Ordering::Acquire) {
            FUNCTIONING => State::Functioning,
            TERMINATING => State::Terminating,
            _ => State::Terminated,
        }
    }

    pub fn is_functioning(&self) -> bool {
        self.state() == State::Functioning
    }

    /// Number of tracked units of work still running.
    pub fn active(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Spawns a tracked unit of work.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.tracker.spawn(task)
    }

    /// Resolves once termination of this lifecycle, or of an ancestor, starts.
    pub fn cancelled(&self) -> WaitForCancellationFutureOwned {
        self.inner.token.clone().cancelled_owned()
    }

    /// Moves to `terminating` and signals cancellation.
    ///
    /// Returns `false` when termination was already started, in which case
    /// the caller must not cascade again but may wait on [`Lifecycle::terminated`].
    pub fn start_termination(&self) -> bool {
        let started = self
            .inner
            .state
            .compare_exchange(FUNCTIONING, TERMINATING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if started {
            self.inner.token.cancel();
            self.inner.tracker.close();
        }
        started
    }

    /// Waits for the last tracked unit of work to exit, then moves to `terminated`.
    pub async fn finish_termination(&self) {
        self.inner.tracker.wait().await;
        self.inner.state.store(TERMINATED, Ordering::Release);
        self.inner.finished.cancel();
    }

    /// Resolves once the lifecycle has reached `terminated`.
    pub async fn terminated(&self) {
        self.inner.finished.cancelled().await;
    }

    /// Starts termination and waits for it.
    ///
    /// When termination was already started elsewhere, waits for that one to finish.
    pub async fn terminate(&self) {
        if self.start_termination() {
            self.finish_termination().await;
        } else {
            self.terminated().await;
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle").field("state", &self.state()).field("active", &self.active()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn idle_termination_completes_immediately() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.terminate().now_or_never().is_some());
        assert_eq!(lifecycle.state(), State::Terminated);
    }

    #[tokio::test]
    async fn termination_waits_for_tracked_work() {
        let lifecycle = Lifecycle::new();
        let (release, wait) = oneshot::channel::<()>();
        lifecycle.spawn(async move {
            let _ = wait.await;
        });
        assert_eq!(lifecycle.active(), 1);

        let terminating = lifecycle.clone();
        let done = tokio::spawn(async move { terminating.terminate().await });

        tokio::task::yield_now().await;
        assert_eq!(lifecycle.state(), State::Terminating);
        assert!(!done.is_finished());

        release.send(()).unwrap();
        done.await.unwrap();
        assert_eq!(lifecycle.state(), State::Terminated);
    }

    #[tokio::test]
    async fn second_termination_is_a_no_op() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.start_termination());
        assert!(!lifecycle.start_termination());
        lifecycle.finish_termination().await;
        lifecycle.terminate().await;
        assert_eq!(lifecycle.state(), State::Terminated);
    }

    #[tokio::test]
    async fn second_caller_waits_for_termination_in_progress() {
        let lifecycle = Lifecycle::new();
        let (release, wait) = oneshot::channel::<()>();
        lifecycle.spawn(async move {
            let _ = wait.await;
        });

        assert!(lifecycle.start_termination());
        let second = lifecycle.clone();
        let done = tokio::spawn(async move { second.terminate().await });

        tokio::task::yield_now().await;
        assert!(!done.is_finished());
        assert_eq!(lifecycle.state(), State::Terminating);

        release.send(()).unwrap();
        lifecycle.finish_termination().await;
        done.await.unwrap();
        assert_eq!(lifecycle.state(), State::Terminated);
    }

    #[tokio::test]
    async fn cancellation_reaches_children() {
        let parent = Lifecycle::new();
        let child = parent.child();
        let cancelled = child.cancelled();

        parent.start_termination();
        cancelled.await;
        assert!(child.is_functioning());
    }
}
