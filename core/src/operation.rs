//! Lifecycle controller for a single in-flight asynchronous action.
//!
//! # Design
//! `AsyncOperation` owns an `OperationState` behind a `tokio::sync::watch`
//! channel: views take snapshots with `state()` or `subscribe()` to re-render
//! on every transition. State only moves through `run`, `set_data`,
//! `set_error` and `reset`.
//!
//! `run` spawns the action. Its settlement is written back only while the
//! controller is alive; the liveness flag is flipped by `teardown` (or drop)
//! inside the channel's write lock, so a late settlement can never land on a
//! torn-down controller. Suppressed writes are silent.
//!
//! Settlement writes are ordered after the `Pending` write. On a
//! current-thread runtime the `Pending` state is always observable before any
//! terminal state.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::OperationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Pending,
    Resolved,
    Rejected,
}

/// Snapshot of an operation. The variant is the status tag, so data and
/// error can never be populated together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState<T, E> {
    Idle,
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T, E> Default for OperationState<T, E> {
    fn default() -> Self {
        OperationState::Idle
    }
}

impl<T, E> OperationState<T, E> {
    pub fn status(&self) -> Status {
        match self {
            OperationState::Idle => Status::Idle,
            OperationState::Pending => Status::Pending,
            OperationState::Resolved(_) => Status::Resolved,
            OperationState::Rejected(_) => Status::Rejected,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            OperationState::Resolved(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            OperationState::Rejected(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status() == Status::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn is_error(&self) -> bool {
        self.status() == Status::Rejected
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Resolved
    }
}

struct Shared<T, E> {
    alive: AtomicBool,
    state: watch::Sender<OperationState<T, E>>,
}

impl<T, E> Shared<T, E> {
    /// Write `next` if still alive. The check runs under the channel lock.
    fn apply(&self, next: OperationState<T, E>) -> bool {
        self.state.send_if_modified(|current| {
            if !self.alive.load(Ordering::Acquire) {
                return false;
            }
            *current = next;
            true
        })
    }

    fn shut_down(&self) {
        self.state.send_if_modified(|_| {
            self.alive.store(false, Ordering::Release);
            false
        });
    }
}

/// Tracks one asynchronous action at a time.
pub struct AsyncOperation<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> AsyncOperation<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_initial(OperationState::Idle)
    }

    /// Start from a caller-supplied state, e.g. `Resolved` with known data.
    pub fn with_initial(initial: OperationState<T, E>) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                alive: AtomicBool::new(true),
                state,
            }),
        }
    }

    pub fn state(&self) -> OperationState<T, E> {
        self.shared.state.borrow().clone()
    }

    pub fn status(&self) -> Status {
        self.shared.state.borrow().status()
    }

    /// Receiver notified on every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T, E>> {
        self.shared.state.subscribe()
    }

    /// Move to `Pending` now and track `future` to settlement.
    ///
    /// The returned handle resolves with the action's own outcome whether or
    /// not the controller is still alive.
    ///
    /// The settlement is always written after `Pending`. Only a current-thread
    /// runtime guarantees a caller sees `Pending` before the terminal state;
    /// on a multi-thread runtime a ready future may already have settled by
    /// the time `run` returns.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use `try_run` to get
    /// `OperationError::NoRuntime` instead.
    pub fn run<F>(&self, future: F) -> RunHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.spawn_on(&Handle::current(), future)
    }

    /// `run` for actions that may not have produced a future.
    ///
    /// Fails with `OperationError::NotAFuture` or `OperationError::NoRuntime`
    /// before touching state.
    pub fn try_run<F>(&self, future: Option<F>) -> Result<RunHandle<T, E>, OperationError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let future = future.ok_or(OperationError::NotAFuture)?;
        let handle = Handle::try_current().map_err(|_| OperationError::NoRuntime)?;
        Ok(self.spawn_on(&handle, future))
    }

    fn spawn_on<F>(&self, runtime: &Handle, future: F) -> RunHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.shared.apply(OperationState::Pending);

        let shared = Arc::clone(&self.shared);
        let task = runtime.spawn(async move {
            let outcome = future.await;
            // settle no earlier than the next scheduler tick
            tokio::task::yield_now().await;
            let next = match &outcome {
                Ok(data) => OperationState::Resolved(data.clone()),
                Err(error) => OperationState::Rejected(error.clone()),
            };
            shared.apply(next);
            outcome
        });

        RunHandle { task }
    }

    pub fn set_data(&self, data: T) {
        self.shared.apply(OperationState::Resolved(data));
    }

    pub fn set_error(&self, error: E) {
        self.shared.apply(OperationState::Rejected(error));
    }

    pub fn reset(&self) {
        self.shared.apply(OperationState::Idle);
    }

    /// Stop accepting mutations. Later settlements are discarded.
    pub fn teardown(&self) {
        self.shared.shut_down();
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }
}

impl<T, E> Default for AsyncOperation<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Drop for AsyncOperation<T, E> {
    fn drop(&mut self) {
        self.shared.shut_down();
    }
}

/// Awaitable outcome of `AsyncOperation::run`.
///
/// # Panics
///
/// Awaiting re-raises a panic from the tracked future. It also panics if the
/// runtime shut down before the task finished; tasks are never aborted
/// otherwise.
pub struct RunHandle<T, E> {
    task: JoinHandle<Result<T, E>>,
}

impl<T, E> RunHandle<T, E> {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T, E> Future for RunHandle<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) => match err.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(err) => panic!("operation task did not complete: {err}"),
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::oneshot;

    use super::*;

    type Sentinel = Arc<&'static str>;
    type Op = AsyncOperation<Sentinel, Sentinel>;

    fn sentinel(name: &'static str) -> Sentinel {
        Arc::new(name)
    }

    /// A future the test settles by hand.
    fn deferred() -> (
        oneshot::Sender<Result<Sentinel, Sentinel>>,
        impl Future<Output = Result<Sentinel, Sentinel>> + Send + 'static,
    ) {
        let (tx, rx) = oneshot::channel();
        (tx, async move { rx.await.expect("deferred dropped") })
    }

    fn assert_idle(state: &OperationState<Sentinel, Sentinel>) {
        assert_eq!(state.status(), Status::Idle);
        assert!(state.data().is_none());
        assert!(state.error().is_none());
        assert!(state.is_idle());
        assert!(!state.is_loading());
        assert!(!state.is_error());
        assert!(!state.is_success());
    }

    fn assert_pending(state: &OperationState<Sentinel, Sentinel>) {
        assert_eq!(state.status(), Status::Pending);
        assert!(state.data().is_none());
        assert!(state.error().is_none());
        assert!(!state.is_idle());
        assert!(state.is_loading());
        assert!(!state.is_error());
        assert!(!state.is_success());
    }

    fn assert_resolved_with(state: &OperationState<Sentinel, Sentinel>, expected: &Sentinel) {
        assert_eq!(state.status(), Status::Resolved);
        assert!(Arc::ptr_eq(state.data().unwrap(), expected));
        assert!(state.error().is_none());
        assert!(state.is_success());
        assert!(!state.is_idle() && !state.is_loading() && !state.is_error());
    }

    fn assert_rejected_with(state: &OperationState<Sentinel, Sentinel>, expected: &Sentinel) {
        assert_eq!(state.status(), Status::Rejected);
        assert!(state.data().is_none());
        assert!(Arc::ptr_eq(state.error().unwrap(), expected));
        assert!(state.is_error());
        assert!(!state.is_idle() && !state.is_loading() && !state.is_success());
    }

    #[test]
    fn starts_idle() {
        let op = Op::new();
        assert_idle(&op.state());
        assert!(op.is_alive());
    }

    #[tokio::test]
    async fn run_with_future_that_resolves() {
        let op = Op::new();
        let (tx, fut) = deferred();

        let handle = op.run(fut);
        assert_pending(&op.state());

        let value = sentinel("resolved value");
        tx.send(Ok(value.clone())).unwrap();
        let outcome = handle.await.unwrap();
        assert!(Arc::ptr_eq(&outcome, &value));
        assert_resolved_with(&op.state(), &value);

        op.reset();
        assert_idle(&op.state());
    }

    #[tokio::test]
    async fn run_with_future_that_rejects() {
        let op = Op::new();
        let (tx, fut) = deferred();

        let handle = op.run(fut);
        assert_pending(&op.state());

        let error = sentinel("rejected value");
        tx.send(Err(error.clone())).unwrap();
        let outcome = handle.await.unwrap_err();
        assert!(Arc::ptr_eq(&outcome, &error));
        assert_rejected_with(&op.state(), &error);
    }

    #[tokio::test]
    async fn pending_is_observable_even_for_ready_futures() {
        let op = Op::new();
        let value = sentinel("ready");
        let ready = value.clone();

        let handle = op.run(async move { Ok(ready) });
        assert_pending(&op.state());

        handle.await.unwrap();
        assert_resolved_with(&op.state(), &value);
    }

    #[tokio::test]
    async fn run_clears_previous_data() {
        let op = Op::with_initial(OperationState::Resolved(sentinel("old")));
        let (_tx, fut) = deferred();
        let _handle = op.run(fut);
        assert_pending(&op.state());
    }

    #[test]
    fn can_specify_an_initial_state() {
        let data = sentinel("resolved value");
        let op = Op::with_initial(OperationState::Resolved(data.clone()));
        assert_resolved_with(&op.state(), &data);
    }

    #[test]
    fn can_set_the_data() {
        let op = Op::with_initial(OperationState::Rejected(sentinel("err")));
        let data = sentinel("data");
        op.set_data(data.clone());
        assert_resolved_with(&op.state(), &data);
    }

    #[test]
    fn can_set_the_error() {
        let op = Op::with_initial(OperationState::Resolved(sentinel("data")));
        let error = sentinel("error");
        op.set_error(error.clone());
        assert_rejected_with(&op.state(), &error);
    }

    #[test]
    fn reset_from_any_state() {
        for initial in [
            OperationState::Idle,
            OperationState::Pending,
            OperationState::Resolved(sentinel("d")),
            OperationState::Rejected(sentinel("e")),
        ] {
            let op = Op::with_initial(initial);
            op.reset();
            assert_idle(&op.state());
        }
    }

    #[tokio::test]
    async fn no_state_updates_after_teardown() {
        let op = Op::new();
        let (tx, fut) = deferred();
        let handle = op.run(fut);
        let rx = op.subscribe();

        op.teardown();
        assert!(!op.is_alive());

        let value = sentinel("late");
        tx.send(Ok(value.clone())).unwrap();
        let outcome = handle.await.unwrap();
        assert!(Arc::ptr_eq(&outcome, &value));

        assert_pending(&op.state());
        assert!(!rx.has_changed().unwrap_or(false));

        op.set_data(sentinel("ignored"));
        op.reset();
        assert_pending(&op.state());
    }

    #[tokio::test]
    async fn dropping_the_controller_discards_settlement() {
        let op = Op::new();
        let (tx, fut) = deferred();
        let handle = op.run(fut);
        let rx = op.subscribe();

        drop(op);
        tx.send(Err(sentinel("late error"))).unwrap();
        assert!(handle.await.is_err());

        assert_pending(&rx.borrow());
    }

    #[test]
    fn try_run_without_a_future_fails_early() {
        let data = sentinel("kept");
        let op = Op::with_initial(OperationState::Resolved(data.clone()));

        let err = op
            .try_run(None::<std::future::Ready<Result<Sentinel, Sentinel>>>)
            .err()
            .unwrap();
        assert_eq!(err, OperationError::NotAFuture);
        assert_eq!(
            err.to_string(),
            "The argument passed to run must be a future. Maybe a function that's passed isn't returning anything?"
        );
        assert_resolved_with(&op.state(), &data);
    }

    #[test]
    fn try_run_outside_a_runtime_fails_early() {
        let op = Op::new();
        let value = sentinel("never polled");

        let err = op.try_run(Some(async move { Ok(value) })).err().unwrap();
        assert_eq!(err, OperationError::NoRuntime);
        assert_idle(&op.state());
    }

    #[tokio::test]
    async fn handle_reports_completion() {
        let op = Op::new();
        let (tx, fut) = deferred();
        let mut handle = op.run(fut);

        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        tx.send(Ok(sentinel("done"))).unwrap();
        (&mut handle).await.unwrap();
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn try_run_with_a_future_runs_it() {
        let op = Op::new();
        let value = sentinel("v");
        let ready = value.clone();
        let handle = op.try_run(Some(async move { Ok(ready) })).unwrap();
        assert_pending(&op.state());
        handle.await.unwrap();
        assert_resolved_with(&op.state(), &value);
    }

    #[tokio::test]
    async fn in_flight_run_overwrites_manual_data() {
        let op = Op::new();
        let (tx, fut) = deferred();
        let handle = op.run(fut);

        op.set_data(sentinel("manual"));
        assert!(op.state().is_success());

        let value = sentinel("from run");
        tx.send(Ok(value.clone())).unwrap();
        handle.await.unwrap();
        assert_resolved_with(&op.state(), &value);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let op = Op::new();
        let mut rx = op.subscribe();
        let (tx, fut) = deferred();

        let handle = op.run(fut);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_loading());

        tx.send(Ok(sentinel("done"))).unwrap();
        handle.await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_success());
    }
}
