use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::ApiError;

/// Outcome of asking the coordinator to handle an expired token.
pub(crate) enum Entry {
    /// The caller claimed the cycle and must perform the refresh call itself,
    /// then settle the queue with `finish_ok` or `finish_err`.
    Owner,
    /// A refresh is already in flight; await the cell for its outcome.
    Waiter(oneshot::Receiver<Result<(), ApiError>>),
}

#[derive(Default)]
struct State {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<Result<(), ApiError>>>,
}

/// Guarantees at most one token refresh is in flight per client.
///
/// The state lock is only ever held for the claim and drain steps, never
/// across an await, so concurrent callers cannot both observe the idle state
/// and both start a refresh.
pub(crate) struct RefreshCoordinator {
    state: Mutex<State>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Claim the refresh cycle, or join the queue behind the current one.
    pub fn begin(&self) -> Entry {
        let mut state = self.locked();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            Entry::Waiter(rx)
        } else {
            state.refreshing = true;
            Entry::Owner
        }
    }

    /// End the cycle successfully, releasing every queued waiter in FIFO
    /// order. Each released caller re-issues its original request.
    pub fn finish_ok(&self) {
        for waiter in self.take_waiters() {
            let _ = waiter.send(Ok(()));
        }
    }

    /// End the cycle with a session-expired rejection for every queued waiter.
    pub fn finish_err(&self, message: &str) {
        for waiter in self.take_waiters() {
            let _ = waiter.send(Err(ApiError::SessionExpired(message.to_string())));
        }
    }

    /// Swap the queue out and return to idle in one atomic step. Waiters
    /// enqueued from here on belong to the next cycle.
    fn take_waiters(&self) -> Vec<oneshot::Sender<Result<(), ApiError>>> {
        let mut state = self.locked();
        state.refreshing = false;
        std::mem::take(&mut state.waiters)
    }

    fn locked(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
