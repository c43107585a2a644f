//! Single-flight token refresh coordination.
//!
//! The coordinator is a two-state machine (`Idle` / `Refreshing`) plus a FIFO
//! of parked callers. The first caller to observe an authentication failure
//! while `Idle` becomes the leader and performs the refresh; everyone who
//! fails while `Refreshing` is parked until the leader settles, at which
//! point every parked caller receives the same outcome in arrival order.
//!
//! The guard owns an `Arc` of its coordinator so the refresh can be driven
//! on a task of its own, outliving the request that started it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::error::AutoPartError;

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Why a refresh cycle failed; fanned out to every parked caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl RefreshFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<RefreshFailure> for AutoPartError {
    fn from(failure: RefreshFailure) -> Self {
        AutoPartError::RefreshFailed {
            status: failure.status,
            message: failure.message,
        }
    }
}

/// Outcome delivered to parked callers.
pub type RefreshOutcome = Result<(), RefreshFailure>;

/// What a caller must do after reporting an authentication failure.
pub enum Ticket {
    /// No refresh was running; the caller owns this cycle and must settle it.
    Leader(RefreshGuard),
    /// A refresh is running; await the outcome.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Debug)]
struct Inner {
    state: RefreshState,
    pending: VecDeque<oneshot::Sender<RefreshOutcome>>,
    cycles: u64,
}

/// Owns the refresh-in-progress flag and the pending request queue.
///
/// One coordinator per transport; nothing here is process-global.
#[derive(Debug)]
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                pending: VecDeque::new(),
                cycles: 0,
            }),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.lock().state
    }

    /// Number of callers currently parked behind the running refresh.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of refresh cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.lock().cycles
    }

    /// Report an authentication failure and learn whether to lead or wait.
    pub fn begin(self: &Arc<Self>) -> Ticket {
        let mut inner = self.lock();
        match inner.state {
            RefreshState::Refreshing => {
                let (tx, rx) = oneshot::channel();
                inner.pending.push_back(tx);
                tracing::debug!(queued = inner.pending.len(), "request parked behind token refresh");
                Ticket::Follower(rx)
            }
            RefreshState::Idle => {
                inner.state = RefreshState::Refreshing;
                inner.cycles += 1;
                tracing::debug!(cycle = inner.cycles, "token refresh cycle started");
                Ticket::Leader(RefreshGuard {
                    coordinator: Arc::clone(self),
                    settled: false,
                })
            }
        }
    }

    fn settle(&self, outcome: RefreshOutcome) {
        let pending = {
            let mut inner = self.lock();
            inner.state = RefreshState::Idle;
            std::mem::take(&mut inner.pending)
        };
        tracing::debug!(
            released = pending.len(),
            success = outcome.is_ok(),
            "token refresh cycle settled"
        );
        for waiter in pending {
            // A dropped receiver means that caller went away; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Leader's handle on a refresh cycle.
///
/// Settling returns the coordinator to `Idle` and drains the queue. Dropping
/// an unsettled guard settles with a failure so parked callers never hang.
pub struct RefreshGuard {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl RefreshGuard {
    /// Park the leader itself ahead of every follower.
    ///
    /// Lets the leader hand the guard to another task and wait for the
    /// outcome like everyone else.
    pub fn outcome(&self) -> oneshot::Receiver<RefreshOutcome> {
        let (tx, rx) = oneshot::channel();
        self.coordinator.lock().pending.push_front(tx);
        rx
    }

    pub fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(Err(RefreshFailure::new(None, "token refresh was abandoned")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_leader(ticket: Ticket) -> RefreshGuard {
        match ticket {
            Ticket::Leader(guard) => guard,
            Ticket::Follower(_) => panic!("expected to lead the refresh"),
        }
    }

    fn expect_follower(ticket: Ticket) -> oneshot::Receiver<RefreshOutcome> {
        match ticket {
            Ticket::Follower(rx) => rx,
            Ticket::Leader(_) => panic!("expected to be parked"),
        }
    }

    #[tokio::test]
    async fn first_caller_leads_and_others_queue() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = expect_leader(coordinator.begin());
        assert_eq!(coordinator.state(), RefreshState::Refreshing);

        let a = expect_follower(coordinator.begin());
        let b = expect_follower(coordinator.begin());
        assert_eq!(coordinator.pending(), 2);
        assert_eq!(coordinator.cycles(), 1);

        guard.settle(Ok(()));
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.pending(), 0);
        assert_eq!(a.await.unwrap(), Ok(()));
        assert_eq!(b.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn failure_is_delivered_to_every_waiter() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = expect_leader(coordinator.begin());
        let waiters: Vec<_> = (0..3).map(|_| expect_follower(coordinator.begin())).collect();

        let failure = RefreshFailure::new(Some(401), "refresh token revoked");
        guard.settle(Err(failure.clone()));

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Err(failure.clone()));
        }
    }

    #[tokio::test]
    async fn settle_releases_every_waiter_at_once() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = expect_leader(coordinator.begin());
        let mut waiters: Vec<_> = (0..4).map(|_| expect_follower(coordinator.begin())).collect();

        guard.settle(Ok(()));

        // Every sender fired during settle; receivers are ready immediately.
        for waiter in waiters.iter_mut() {
            assert!(waiter.try_recv().is_ok());
        }
    }

    #[tokio::test]
    async fn dropped_guard_releases_waiters_with_failure() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = expect_leader(coordinator.begin());
        let waiter = expect_follower(coordinator.begin());

        drop(guard);

        assert_eq!(coordinator.state(), RefreshState::Idle);
        let outcome = waiter.await.unwrap();
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn waiters_are_released_in_arrival_order() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = expect_leader(coordinator.begin());
        let released = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for position in 0..5 {
            let waiter = expect_follower(coordinator.begin());
            let released = released.clone();
            tasks.push(tokio::spawn(async move {
                waiter.await.unwrap().unwrap();
                released.lock().unwrap().push(position);
            }));
        }
        // Every task is parked on its receiver before the cycle settles.
        tokio::task::yield_now().await;
        guard.settle(Ok(()));
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*released.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn guard_moved_to_another_task_still_releases_the_leader() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let guard = expect_leader(coordinator.begin());
        let follower = expect_follower(coordinator.begin());
        let leader = guard.outcome();
        assert_eq!(coordinator.pending(), 2);

        tokio::spawn(async move { guard.settle(Ok(())) }).await.unwrap();

        assert_eq!(leader.await.unwrap(), Ok(()));
        assert_eq!(follower.await.unwrap(), Ok(()));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[test]
    fn new_cycle_after_settle() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        expect_leader(coordinator.begin()).settle(Ok(()));
        expect_leader(coordinator.begin()).settle(Ok(()));
        assert_eq!(coordinator.cycles(), 2);
    }
}
