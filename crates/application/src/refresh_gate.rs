//! Refresh gate.
//!
//! Serializes concurrent refresh demand into a single refresh call. The
//! first caller to find the gate idle becomes the leader and performs the
//! refresh; everyone arriving while it is in flight is queued as a waiter
//! and receives the leader's outcome, in registration order.
//!
//! All state transitions happen under a short, non-async lock, so the
//! idle check and the switch to refreshing cannot interleave with another
//! caller. Resolving takes the whole waiter batch and returns the gate to
//! idle in one step: a caller arriving after that starts a new batch.

use std::collections::VecDeque;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::SessionError;

/// Result of a refresh: the new access token, or why it could not be obtained.
pub type RefreshOutcome = Result<String, SessionError>;

const ABANDONED: &str = "refresh abandoned before completion";

#[derive(Default)]
enum GateState {
    #[default]
    Idle,
    Refreshing {
        pending: VecDeque<PendingWaiter>,
    },
}

struct PendingWaiter {
    ticket: u64,
    sender: oneshot::Sender<RefreshOutcome>,
}

#[derive(Default)]
struct Inner {
    state: GateState,
    next_ticket: u64,
}

/// Ensures at most one refresh is in flight.
#[derive(Default)]
pub struct RefreshGate {
    inner: Mutex<Inner>,
}

/// What a caller must do after calling [`RefreshGate::acquire_or_wait`].
pub enum GateTicket<'a> {
    /// Perform the refresh, then resolve the gate with its outcome.
    Leader(LeaderGuard<'a>),
    /// Wait for the leader's outcome.
    Waiter(Waiter),
}

impl RefreshGate {
    /// Creates an idle gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Becomes the leader if the gate is idle, otherwise joins the queue.
    pub fn acquire_or_wait(&self) -> GateTicket<'_> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let ticket = inner.next_ticket;
        inner.next_ticket += 1;

        if let GateState::Refreshing { pending } = &mut inner.state {
            let (sender, receiver) = oneshot::channel();
            pending.push_back(PendingWaiter { ticket, sender });
            tracing::debug!(ticket, waiters = pending.len(), "queued behind refresh");
            return GateTicket::Waiter(Waiter { ticket, receiver });
        }

        inner.state = GateState::Refreshing {
            pending: VecDeque::new(),
        };
        tracing::debug!(ticket, "refresh gate acquired");
        GateTicket::Leader(LeaderGuard {
            gate: self,
            resolved: false,
        })
    }

    /// Runs `refresh` if this caller leads, otherwise waits for the leader.
    ///
    /// The closure is only invoked by the leader, so at most one refresh
    /// future exists per batch.
    pub async fn run<F, Fut>(&self, refresh: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        match self.acquire_or_wait() {
            GateTicket::Leader(guard) => {
                let outcome = refresh().await;
                guard.resolve(&outcome);
                outcome
            }
            GateTicket::Waiter(waiter) => waiter.wait().await,
        }
    }

    /// Returns true while a refresh is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(self.inner.lock().state, GateState::Refreshing { .. })
    }

    /// Returns the number of queued waiters.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        match &self.inner.lock().state {
            GateState::Idle => 0,
            GateState::Refreshing { pending } => pending.len(),
        }
    }

    fn resolve(&self, outcome: &RefreshOutcome) -> Vec<u64> {
        let pending = match std::mem::take(&mut self.inner.lock().state) {
            GateState::Idle => VecDeque::new(),
            GateState::Refreshing { pending } => pending,
        };

        tracing::debug!(
            waiters = pending.len(),
            success = outcome.is_ok(),
            "refresh gate released"
        );

        pending
            .into_iter()
            .map(|waiter| {
                // A waiter whose caller went away simply misses the outcome.
                let _ = waiter.sender.send(outcome.clone());
                waiter.ticket
            })
            .collect()
    }
}

/// Proof of leadership. Resolving it releases every waiter; dropping it
/// unresolved rejects them.
pub struct LeaderGuard<'a> {
    gate: &'a RefreshGate,
    resolved: bool,
}

impl LeaderGuard<'_> {
    /// Returns the gate to idle and delivers `outcome` to every waiter.
    ///
    /// Returns the waiters' tickets in delivery order.
    pub fn resolve(mut self, outcome: &RefreshOutcome) -> Vec<u64> {
        self.resolved = true;
        self.gate.resolve(outcome)
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!("refresh leader dropped without resolving; rejecting waiters");
            self.gate.resolve(&Err(SessionError::RefreshFailed {
                message: ABANDONED.to_string(),
            }));
        }
    }
}

/// A queued caller.
pub struct Waiter {
    ticket: u64,
    receiver: oneshot::Receiver<RefreshOutcome>,
}

impl Waiter {
    /// Registration order of this waiter.
    #[must_use]
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Suspends until the leader resolves the gate.
    pub async fn wait(self) -> RefreshOutcome {
        self.receiver.await.unwrap_or_else(|_| {
            Err(SessionError::RefreshFailed {
                message: ABANDONED.to_string(),
            })
        })
    }
}
